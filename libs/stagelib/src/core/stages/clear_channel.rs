// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};
use crate::core::frames::Frame;
use crate::core::parameters::Parameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClearChannelConfig {
    pub channel: u32,
}

impl ClearChannelConfig {
    pub fn from_parameters(stage: &str, parameters: &Parameters) -> Result<Self> {
        parameters.decode(stage)
    }

    pub fn apply(&self, stage: &str, input: &Frame) -> Result<Frame> {
        if self.channel >= input.channels() {
            return Err(PipelineError::OutOfBounds {
                stage: stage.to_string(),
                reason: format!(
                    "channel {} does not exist in a {}-channel frame",
                    self.channel,
                    input.channels()
                ),
            });
        }

        // Zero bits are 0 for every element type, including float32.
        let size = input.dtype().size_bytes();
        let offset = self.channel as usize * size;
        let mut data = input.as_bytes().to_vec();
        for pixel in data.chunks_exact_mut(input.pixel_stride()) {
            pixel[offset..offset + size].fill(0);
        }
        input.derive(input.shape(), input.dtype(), data)
    }
}
