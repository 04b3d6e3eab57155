// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Built-in stage variants.
//!
//! [`StageKind`] names a variant as written in a pipeline definition;
//! [`Transform`] is the same variant with its parameters decoded and
//! validated, built when the stage connects.

mod cast;
mod clear_channel;
mod crop;
mod merge;
mod source;
mod split;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use cast::CastConfig;
pub use clear_channel::ClearChannelConfig;
pub use crop::CropConfig;
pub use merge::MergeConfig;
pub use source::{FrameSource, IterFrameSource, SourceConfig, SourcePattern};
pub use split::SplitConfig;

pub(crate) use source::SourceFeed;

use crate::core::error::{PipelineError, Result};
use crate::core::frames::Frame;
use crate::core::parameters::Parameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Source,
    Crop,
    Cast,
    Split,
    Merge,
    ClearChannel,
}

impl StageKind {
    pub const ALL: [StageKind; 6] = [
        StageKind::Source,
        StageKind::Crop,
        StageKind::Cast,
        StageKind::Split,
        StageKind::Merge,
        StageKind::ClearChannel,
    ];

    /// Parse a definition `type`. Both `Crop` and `CropStage` spellings are accepted.
    pub fn from_type_name(name: &str) -> Result<Self> {
        let base = name.strip_suffix("Stage").unwrap_or(name);
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_name() == base)
            .ok_or_else(|| PipelineError::UnknownStageType(name.to_string()))
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Source => "Source",
            Self::Crop => "Crop",
            Self::Cast => "Cast",
            Self::Split => "Split",
            Self::Merge => "Merge",
            Self::ClearChannel => "ClearChannel",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Source => "Entry point for frames (fed, attached, or generated from a pattern)",
            Self::Crop => "Extracts a rectangular sub-region",
            Self::Cast => "Converts the element type with saturating rounding",
            Self::Split => "Decomposes the channel axis into single-channel outputs",
            Self::Merge => "Concatenates inputs along the channel axis in input order",
            Self::ClearChannel => "Zeroes one channel",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Self::Source => Arity::Exactly(0),
            Self::Crop | Self::Cast | Self::Split | Self::ClearChannel => Arity::Exactly(1),
            Self::Merge => Arity::AtLeast(1),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Number of inputs a variant accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exactly(n) => count == n,
            Self::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "{}", n),
            Self::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// A stage variant with validated parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Source(SourceConfig),
    Crop(CropConfig),
    Cast(CastConfig),
    Split(SplitConfig),
    Merge(MergeConfig),
    ClearChannel(ClearChannelConfig),
}

impl Transform {
    pub fn configure(kind: StageKind, stage: &str, parameters: &Parameters) -> Result<Self> {
        Ok(match kind {
            StageKind::Source => Self::Source(SourceConfig::from_parameters(stage, parameters)?),
            StageKind::Crop => Self::Crop(CropConfig::from_parameters(stage, parameters)?),
            StageKind::Cast => Self::Cast(CastConfig::from_parameters(stage, parameters)?),
            StageKind::Split => Self::Split(SplitConfig::from_parameters(stage, parameters)?),
            StageKind::Merge => Self::Merge(MergeConfig::from_parameters(stage, parameters)?),
            StageKind::ClearChannel => {
                Self::ClearChannel(ClearChannelConfig::from_parameters(stage, parameters)?)
            }
        })
    }

    pub fn kind(&self) -> StageKind {
        match self {
            Self::Source(_) => StageKind::Source,
            Self::Crop(_) => StageKind::Crop,
            Self::Cast(_) => StageKind::Cast,
            Self::Split(_) => StageKind::Split,
            Self::Merge(_) => StageKind::Merge,
            Self::ClearChannel(_) => StageKind::ClearChannel,
        }
    }

    /// Compute the outputs for one processing step.
    ///
    /// Never mutates its inputs. A source forwards whatever it is handed.
    pub fn apply(&self, stage: &str, inputs: &[Frame]) -> Result<Vec<Frame>> {
        match self {
            Self::Source(_) => Ok(inputs.to_vec()),
            Self::Crop(config) => Ok(vec![config.apply(stage, single(stage, inputs)?)?]),
            Self::Cast(config) => Ok(vec![config.apply(stage, single(stage, inputs)?)?]),
            Self::Split(config) => config.apply(stage, single(stage, inputs)?),
            Self::Merge(config) => Ok(vec![config.apply(stage, inputs)?]),
            Self::ClearChannel(config) => Ok(vec![config.apply(stage, single(stage, inputs)?)?]),
        }
    }
}

fn single<'a>(stage: &str, inputs: &'a [Frame]) -> Result<&'a Frame> {
    match inputs {
        [frame] => Ok(frame),
        _ => Err(PipelineError::ArityMismatch {
            stage: stage.to_string(),
            expected: "1".to_string(),
            found: inputs.len(),
        }),
    }
}
