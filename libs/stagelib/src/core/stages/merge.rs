// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};
use crate::core::frames::Frame;
use crate::core::parameters::Parameters;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {}

impl MergeConfig {
    pub fn from_parameters(stage: &str, parameters: &Parameters) -> Result<Self> {
        parameters.decode(stage)
    }

    /// Concatenate along the channel axis in input order.
    ///
    /// Every input must share the first input's width, height, and element
    /// type. The output takes its metadata from the first input.
    pub fn apply(&self, stage: &str, inputs: &[Frame]) -> Result<Frame> {
        let Some(first) = inputs.first() else {
            return Err(PipelineError::ArityMismatch {
                stage: stage.to_string(),
                expected: "at least 1".to_string(),
                found: 0,
            });
        };

        for (index, frame) in inputs.iter().enumerate().skip(1) {
            if !frame.shape().same_extent(&first.shape()) {
                return Err(PipelineError::ShapeMismatch {
                    stage: stage.to_string(),
                    reason: format!(
                        "input {} is {}x{}, input 0 is {}x{}",
                        index,
                        frame.width(),
                        frame.height(),
                        first.width(),
                        first.height()
                    ),
                });
            }
            if frame.dtype() != first.dtype() {
                return Err(PipelineError::TypeMismatch {
                    stage: stage.to_string(),
                    expected: first.dtype(),
                    found: frame.dtype(),
                });
            }
        }

        let channels: u32 = inputs.iter().map(Frame::channels).sum();
        let out_shape = first.shape().with_channels(channels);
        let mut data = Vec::with_capacity(out_shape.byte_len(first.dtype()));
        for pixel in 0..first.shape().pixel_count() {
            for frame in inputs {
                let stride = frame.pixel_stride();
                data.extend_from_slice(&frame.as_bytes()[pixel * stride..(pixel + 1) * stride]);
            }
        }
        first.derive(out_shape, first.dtype(), data)
    }
}
