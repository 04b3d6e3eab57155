// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::ElementType;
use crate::core::error::{PipelineError, Result};

/// Frame extents: (width, height, channel-count).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl FrameShape {
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidFrame(format!(
                "width and height must be positive, got {}",
                self
            )));
        }
        if self.channels == 0 {
            return Err(PipelineError::InvalidFrame(format!(
                "channel count must be at least 1, got {}",
                self
            )));
        }
        if self.checked_byte_len(ElementType::U8).is_none() {
            return Err(PipelineError::InvalidFrame(format!(
                "{} elements do not fit in memory",
                self
            )));
        }
        Ok(())
    }

    /// Payload size in bytes, or `None` if it overflows `usize`.
    pub fn checked_byte_len(&self, dtype: ElementType) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.channels as usize)?
            .checked_mul(dtype.size_bytes())
    }

    // The unchecked sizes below are exact for any shape a live frame has.

    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    pub fn element_count(&self) -> usize {
        self.pixel_count().saturating_mul(self.channels as usize)
    }

    pub fn byte_len(&self, dtype: ElementType) -> usize {
        self.element_count().saturating_mul(dtype.size_bytes())
    }

    /// True when both shapes share width and height (channels may differ).
    pub fn same_extent(&self, other: &FrameShape) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn with_channels(&self, channels: u32) -> Self {
        Self {
            channels,
            ..*self
        }
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Immutable unit of image data flowing between stages.
///
/// Elements are interleaved per pixel, rows top to bottom: the element at
/// `(x, y, c)` lives at `((y * width + x) * channels + c) * dtype.size_bytes()`.
/// The payload is a shared [`Bytes`] buffer, so cloning a frame for fan-out
/// never copies pixel data and no holder can mutate it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    shape: FrameShape,
    dtype: ElementType,
    data: Bytes,
    frame_number: u64,
    timestamp_ns: i64,
}

impl Frame {
    /// Create a frame from a raw payload of `width * height * channels * sizeof(dtype)` bytes.
    pub fn new(shape: FrameShape, dtype: ElementType, data: impl Into<Bytes>) -> Result<Self> {
        let expected = payload_len(shape, dtype)?;
        let data = data.into();
        if data.len() != expected {
            return Err(PipelineError::InvalidFrame(format!(
                "{} {} frame needs {} bytes, got {}",
                shape,
                dtype,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            shape,
            dtype,
            data,
            frame_number: 0,
            timestamp_ns: 0,
        })
    }

    pub fn zeroed(shape: FrameShape, dtype: ElementType) -> Result<Self> {
        let len = payload_len(shape, dtype)?;
        Self::new(shape, dtype, vec![0u8; len])
    }

    /// Frame with every element set to `value` (saturating cast policy applies).
    pub fn filled(shape: FrameShape, dtype: ElementType, value: f64) -> Result<Self> {
        payload_len(shape, dtype)?;
        let mut element = Vec::with_capacity(dtype.size_bytes());
        dtype.encode_into(value, &mut element);
        Self::new(shape, dtype, element.repeat(shape.element_count()))
    }

    pub fn from_u8(shape: FrameShape, values: Vec<u8>) -> Result<Self> {
        Self::new(shape, ElementType::U8, values)
    }

    pub fn from_u16(shape: FrameShape, values: &[u16]) -> Result<Self> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(shape, ElementType::U16, data)
    }

    pub fn from_f32(shape: FrameShape, values: &[f32]) -> Result<Self> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(shape, ElementType::F32, data)
    }

    /// Encode one number per element into `dtype` with the saturating cast
    /// policy.
    pub fn from_f64(shape: FrameShape, dtype: ElementType, values: &[f64]) -> Result<Self> {
        let len = payload_len(shape, dtype)?;
        if values.len() != shape.element_count() {
            return Err(PipelineError::InvalidFrame(format!(
                "{} frame needs {} elements, got {}",
                shape,
                shape.element_count(),
                values.len()
            )));
        }
        let mut data = Vec::with_capacity(len);
        for value in values {
            dtype.encode_into(*value, &mut data);
        }
        Self::new(shape, dtype, data)
    }

    /// Copy of this frame carrying different sequencing metadata. The payload is shared.
    pub fn with_metadata(&self, frame_number: u64, timestamp_ns: i64) -> Self {
        Self {
            frame_number,
            timestamp_ns,
            ..self.clone()
        }
    }

    /// Build a transformed frame that keeps this frame's metadata.
    pub(crate) fn derive(
        &self,
        shape: FrameShape,
        dtype: ElementType,
        data: Vec<u8>,
    ) -> Result<Self> {
        Ok(Self::new(shape, dtype, data)?.with_metadata(self.frame_number, self.timestamp_ns))
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn width(&self) -> u32 {
        self.shape.width
    }

    pub fn height(&self) -> u32 {
        self.shape.height
    }

    pub fn channels(&self) -> u32 {
        self.shape.channels
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the payload for egress.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Byte size of one pixel (all channels).
    pub fn pixel_stride(&self) -> usize {
        self.shape.channels as usize * self.dtype.size_bytes()
    }

    /// Element value at `(x, y, c)` widened to f64.
    pub fn element(&self, x: u32, y: u32, c: u32) -> Option<f64> {
        if x >= self.shape.width || y >= self.shape.height || c >= self.shape.channels {
            return None;
        }
        let size = self.dtype.size_bytes();
        let index = (y as usize * self.shape.width as usize + x as usize)
            * self.shape.channels as usize
            + c as usize;
        let offset = index * size;
        Some(self.dtype.decode(&self.data[offset..offset + size]))
    }

    /// All elements widened to f64, in storage order.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data
            .chunks_exact(self.dtype.size_bytes())
            .map(|chunk| self.dtype.decode(chunk))
            .collect()
    }
}

fn payload_len(shape: FrameShape, dtype: ElementType) -> Result<usize> {
    shape.validate()?;
    shape.checked_byte_len(dtype).ok_or_else(|| {
        PipelineError::InvalidFrame(format!("{} {} frame does not fit in memory", shape, dtype))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_validation() {
        assert!(FrameShape::new(4, 4, 3).validate().is_ok());
        assert!(FrameShape::new(0, 4, 3).validate().is_err());
        assert!(FrameShape::new(4, 0, 3).validate().is_err());
        assert!(FrameShape::new(4, 4, 0).validate().is_err());
    }

    #[test]
    fn test_oversized_shape_is_rejected() {
        let huge = FrameShape::new(1 << 22, 1 << 22, 1 << 20);
        assert_eq!(huge.checked_byte_len(ElementType::U8), None);
        assert!(matches!(huge.validate(), Err(PipelineError::InvalidFrame(_))));

        let err = Frame::new(huge, ElementType::U8, Vec::new()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFrame(_)));
        assert!(Frame::zeroed(huge, ElementType::F32).is_err());
        assert!(Frame::filled(huge, ElementType::U16, 1.0).is_err());
    }

    #[test]
    fn test_from_f64_applies_cast_policy() {
        let shape = FrameShape::new(3, 1, 1);
        let bytes = Frame::from_f64(shape, ElementType::U8, &[300.0, -4.6, 2.5]).unwrap();
        assert_eq!(bytes.as_bytes(), &[255, 0, 3]);

        let floats = Frame::from_f64(shape, ElementType::F32, &[0.5, 1.0, -2.0]).unwrap();
        assert_eq!(floats.to_f64_vec(), vec![0.5, 1.0, -2.0]);

        let err = Frame::from_f64(shape, ElementType::U16, &[1.0]).unwrap_err();
        assert!(err.to_string().contains("needs 3 elements"));
    }

    #[test]
    fn test_payload_size_must_match_shape() {
        let shape = FrameShape::new(2, 2, 3);
        assert!(Frame::from_u8(shape, vec![0; 12]).is_ok());
        let err = Frame::from_u8(shape, vec![0; 11]).unwrap_err();
        assert!(err.to_string().contains("needs 12 bytes"));

        let floats = Frame::from_f32(shape, &[0.0; 12]).unwrap();
        assert_eq!(floats.as_bytes().len(), 48);
    }

    #[test]
    fn test_element_addressing_is_interleaved() {
        let shape = FrameShape::new(2, 1, 3);
        let frame = Frame::from_u8(shape, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(frame.element(0, 0, 0), Some(1.0));
        assert_eq!(frame.element(1, 0, 0), Some(4.0));
        assert_eq!(frame.element(1, 0, 2), Some(6.0));
        assert_eq!(frame.element(2, 0, 0), None);
    }

    #[test]
    fn test_filled_and_zeroed() {
        let shape = FrameShape::new(3, 2, 1);
        let zero = Frame::zeroed(shape, ElementType::F32).unwrap();
        assert!(zero.to_f64_vec().iter().all(|v| *v == 0.0));

        let filled = Frame::filled(shape, ElementType::U16, 700.0).unwrap();
        assert!(filled.to_f64_vec().iter().all(|v| *v == 700.0));
    }

    #[test]
    fn test_clone_shares_payload() {
        let frame = Frame::zeroed(FrameShape::new(8, 8, 1), ElementType::U8).unwrap();
        let copy = frame.with_metadata(7, 1_000);
        assert_eq!(copy.frame_number(), 7);
        assert_eq!(copy.as_bytes().as_ptr(), frame.as_bytes().as_ptr());
    }
}
