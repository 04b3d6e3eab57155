// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::frames::{ElementType, Frame};
use crate::core::parameters::Parameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastConfig {
    pub target_type: ElementType,
}

impl CastConfig {
    pub fn from_parameters(stage: &str, parameters: &Parameters) -> Result<Self> {
        parameters.decode(stage)
    }

    pub fn apply(&self, _stage: &str, input: &Frame) -> Result<Frame> {
        if input.dtype() == self.target_type {
            return Ok(input.clone());
        }
        let source = input.dtype();
        let mut data = Vec::with_capacity(input.shape().byte_len(self.target_type));
        for chunk in input.as_bytes().chunks_exact(source.size_bytes()) {
            self.target_type.encode_into(source.decode(chunk), &mut data);
        }
        input.derive(input.shape(), self.target_type, data)
    }
}
