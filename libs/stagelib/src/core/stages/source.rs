// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};
use crate::core::frames::{ElementType, Frame, FrameShape};
use crate::core::parameters::Parameters;

fn default_channels() -> u32 {
    1
}

fn default_dtype() -> ElementType {
    ElementType::U8
}

/// Constant-fill frame generator for a source with nothing fed or attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcePattern {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
    #[serde(default = "default_dtype")]
    pub dtype: ElementType,
    #[serde(default)]
    pub fill: f64,
}

impl SourcePattern {
    pub fn shape(&self) -> FrameShape {
        FrameShape::new(self.width, self.height, self.channels)
    }

    pub fn generate(&self, frame_number: u64) -> Result<Frame> {
        Ok(Frame::filled(self.shape(), self.dtype, self.fill)?.with_metadata(frame_number, 0))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceConfig {
    pub pattern: Option<SourcePattern>,
}

impl SourceConfig {
    /// No parameters means "emit only what is fed or attached".
    pub fn from_parameters(stage: &str, parameters: &Parameters) -> Result<Self> {
        if parameters.is_empty() {
            return Ok(Self::default());
        }
        let pattern: SourcePattern = parameters.decode(stage)?;
        pattern
            .shape()
            .validate()
            .map_err(|e| PipelineError::InvalidParameter {
                stage: stage.to_string(),
                parameter: "width/height/channels".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }
}

/// External producer of frames driving a source stage.
pub trait FrameSource: Send {
    /// Next frame, or `None` when nothing is available this cycle.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// [`FrameSource`] over any iterator of frames.
pub struct IterFrameSource<I> {
    iter: I,
}

impl<I> IterFrameSource<I>
where
    I: Iterator<Item = Frame> + Send,
{
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }
}

impl<I> FrameSource for IterFrameSource<I>
where
    I: Iterator<Item = Frame> + Send,
{
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.iter.next())
    }
}

/// Per-source ingress state: queued frames first, then the attached
/// producer, then the configured pattern.
#[derive(Default)]
pub(crate) struct SourceFeed {
    queue: VecDeque<Frame>,
    external: Option<Box<dyn FrameSource>>,
    emitted: u64,
}

impl SourceFeed {
    pub(crate) fn enqueue(&mut self, frame: Frame) {
        self.queue.push_back(frame);
    }

    pub(crate) fn attach(&mut self, source: Box<dyn FrameSource>) {
        self.external = Some(source);
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn emitted(&self) -> u64 {
        self.emitted
    }

    /// True when a later call could still yield a frame.
    pub(crate) fn is_live(&self, pattern: Option<&SourcePattern>) -> bool {
        !self.queue.is_empty() || self.external.is_some() || pattern.is_some()
    }

    pub(crate) fn next(
        &mut self,
        stage: &str,
        pattern: Option<&SourcePattern>,
    ) -> Result<Option<Frame>> {
        let frame = if let Some(frame) = self.queue.pop_front() {
            Some(frame)
        } else if let Some(external) = self.external.as_mut() {
            match external.next_frame() {
                Ok(Some(frame)) => Some(frame),
                Ok(None) => {
                    tracing::debug!("[{}] Attached source exhausted", stage);
                    self.external = None;
                    None
                }
                Err(e) => {
                    return Err(PipelineError::SourceFailed {
                        stage: stage.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        } else {
            None
        };

        let frame = match (frame, pattern) {
            (Some(frame), _) => Some(frame),
            (None, Some(pattern)) => Some(pattern.generate(self.emitted)?),
            (None, None) => None,
        };
        if frame.is_some() {
            self.emitted += 1;
        }
        Ok(frame)
    }
}

impl fmt::Debug for SourceFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFeed")
            .field("queued", &self.queue.len())
            .field("attached", &self.external.is_some())
            .field("emitted", &self.emitted)
            .finish()
    }
}
