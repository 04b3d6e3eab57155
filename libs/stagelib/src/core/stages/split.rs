// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};
use crate::core::frames::Frame;
use crate::core::parameters::Parameters;

/// `channels`, when set, pins the channel count the input must carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
    #[serde(default)]
    pub channels: Option<u32>,
}

impl SplitConfig {
    pub fn from_parameters(stage: &str, parameters: &Parameters) -> Result<Self> {
        let config: SplitConfig = parameters.decode(stage)?;
        if config.channels == Some(0) {
            return Err(PipelineError::InvalidParameter {
                stage: stage.to_string(),
                parameter: "channels".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    /// One single-channel output per input channel, in channel order.
    pub fn apply(&self, stage: &str, input: &Frame) -> Result<Vec<Frame>> {
        let channels = input.channels();
        if let Some(expected) = self.channels {
            if expected != channels {
                return Err(PipelineError::ShapeMismatch {
                    stage: stage.to_string(),
                    reason: format!("expected {} channels, got {}", expected, channels),
                });
            }
        }

        let size = input.dtype().size_bytes();
        let stride = input.pixel_stride();
        let pixels = input.shape().pixel_count();
        let src = input.as_bytes();
        let out_shape = input.shape().with_channels(1);

        (0..channels as usize)
            .map(|c| {
                let mut data = Vec::with_capacity(pixels * size);
                for pixel in src.chunks_exact(stride) {
                    data.extend_from_slice(&pixel[c * size..(c + 1) * size]);
                }
                input.derive(out_shape, input.dtype(), data)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::{ElementType, FrameShape};

    #[test]
    fn test_split_rgb() {
        let shape = FrameShape::new(2, 1, 3);
        let frame = Frame::from_u8(shape, vec![1, 2, 3, 4, 5, 6])
            .unwrap()
            .with_metadata(9, 42);
        let outs = SplitConfig::default().apply("s", &frame).unwrap();

        assert_eq!(outs.len(), 3);
        assert_eq!(outs[0].as_bytes(), &[1, 4]);
        assert_eq!(outs[1].as_bytes(), &[2, 5]);
        assert_eq!(outs[2].as_bytes(), &[3, 6]);
        for out in &outs {
            assert_eq!(out.shape(), FrameShape::new(2, 1, 1));
            assert_eq!(out.frame_number(), 9);
            assert_eq!(out.timestamp_ns(), 42);
        }
    }

    #[test]
    fn test_split_multibyte_elements() {
        let frame = Frame::from_u16(FrameShape::new(1, 2, 2), &[10, 20, 30, 40]).unwrap();
        let outs = SplitConfig::default().apply("s", &frame).unwrap();
        assert_eq!(outs[0].to_f64_vec(), vec![10.0, 30.0]);
        assert_eq!(outs[1].to_f64_vec(), vec![20.0, 40.0]);
        assert_eq!(outs[1].dtype(), ElementType::U16);
    }

    #[test]
    fn test_single_channel_split_is_identity() {
        let frame = Frame::from_u8(FrameShape::new(2, 2, 1), vec![1, 2, 3, 4]).unwrap();
        let outs = SplitConfig::default().apply("s", &frame).unwrap();
        assert_eq!(outs, vec![frame]);
    }

    #[test]
    fn test_expected_channel_count() {
        let frame = Frame::zeroed(FrameShape::new(2, 2, 4), ElementType::U8).unwrap();
        let config = SplitConfig { channels: Some(3) };
        let err = config.apply("s", &frame).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));
    }
}
