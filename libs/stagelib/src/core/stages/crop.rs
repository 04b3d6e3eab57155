// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};
use crate::core::frames::{Frame, FrameShape};
use crate::core::parameters::Parameters;

/// Rectangle to extract. `(x, y)` is the top-left corner in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CropConfig {
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropConfig {
    pub fn from_parameters(stage: &str, parameters: &Parameters) -> Result<Self> {
        let config: CropConfig = parameters.decode(stage)?;
        for (name, value) in [("width", config.width), ("height", config.height)] {
            if value == 0 {
                return Err(PipelineError::InvalidParameter {
                    stage: stage.to_string(),
                    parameter: name.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(config)
    }

    pub fn apply(&self, stage: &str, input: &Frame) -> Result<Frame> {
        let right = u64::from(self.x) + u64::from(self.width);
        let bottom = u64::from(self.y) + u64::from(self.height);
        if right > u64::from(input.width()) || bottom > u64::from(input.height()) {
            return Err(PipelineError::OutOfBounds {
                stage: stage.to_string(),
                reason: format!(
                    "rectangle {}x{} at ({}, {}) exceeds {}x{} input",
                    self.width,
                    self.height,
                    self.x,
                    self.y,
                    input.width(),
                    input.height()
                ),
            });
        }

        let stride = input.pixel_stride();
        let row_bytes = input.width() as usize * stride;
        let copy_bytes = self.width as usize * stride;
        let src = input.as_bytes();

        let mut data = Vec::with_capacity(copy_bytes * self.height as usize);
        for row in self.y as usize..self.y as usize + self.height as usize {
            let start = row * row_bytes + self.x as usize * stride;
            data.extend_from_slice(&src[start..start + copy_bytes]);
        }

        let out_shape = FrameShape::new(self.width, self.height, input.channels());
        input.derive(out_shape, input.dtype(), data)
    }
}
