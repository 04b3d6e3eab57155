// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

use serde::Serialize;

use crate::core::error::{PipelineError, Result};
use crate::core::registry::{validate_label, LabelRegistry};

/// Lifecycle state of an entity.
///
/// An entity that isn't in a registry yet (or was removed from one) has no
/// state of its own; these are the states it passes through while its label
/// is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityState {
    /// Label reserved, inputs not resolved.
    Registered,
    /// Inputs resolved, ready to process.
    Connected,
    /// Resolved inputs dropped. The label stays reserved.
    Disconnected,
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Registered => "Registered",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
        };
        f.write_str(name)
    }
}

/// Identity and connection contract shared by stages and pipelines.
pub trait Entity {
    fn label(&self) -> &str;

    /// Upstream references, in input-slot order.
    fn inputs(&self) -> &[InputRef];

    fn state(&self) -> EntityState;

    /// Resolve every input through `registry`.
    ///
    /// All or nothing: on failure no resolved input is kept and the state is
    /// unchanged.
    fn connect(&mut self, registry: &LabelRegistry) -> Result<()>;

    /// Drop resolved inputs. Never touches upstream entities. Calling it on an
    /// already disconnected entity is a no-op.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool {
        self.state() == EntityState::Connected
    }
}

/// Label-based reference to one output of an upstream entity.
///
/// Written `label` (output 0) or `label.N`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputRef {
    label: String,
    output: usize,
    explicit_output: bool,
}

impl InputRef {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            output: 0,
            explicit_output: false,
        }
    }

    pub fn with_output(label: impl Into<String>, output: usize) -> Self {
        Self {
            label: label.into(),
            output,
            explicit_output: true,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let parsed = match text.rsplit_once('.') {
            Some((label, index)) => {
                let output = index.parse::<usize>().map_err(|_| PipelineError::InvalidLabel {
                    label: text.to_string(),
                    reason: format!("'{}' is not an output index", index),
                })?;
                Self::with_output(label, output)
            }
            None => Self::new(text),
        };
        validate_label(&parsed.label).map_err(|_| PipelineError::InvalidLabel {
            label: text.to_string(),
            reason: "expected 'label' or 'label.N'".to_string(),
        })?;
        Ok(parsed)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn output(&self) -> usize {
        self.output
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.explicit_output {
            write!(f, "{}.{}", self.label, self.output)
        } else {
            f.write_str(&self.label)
        }
    }
}
