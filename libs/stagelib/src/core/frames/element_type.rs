// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type tag of a frame.
///
/// Multi-byte elements are stored little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    #[serde(rename = "uint8", alias = "u8")]
    U8,
    #[serde(rename = "uint16", alias = "u16")]
    U16,
    #[serde(rename = "float32", alias = "f32")]
    F32,
}

impl ElementType {
    pub const ALL: [ElementType; 3] = [ElementType::U8, ElementType::U16, ElementType::F32];

    pub fn size_bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::F32 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::F32 => "float32",
        }
    }

    /// Parse a type name; accepts both `uint8` and the short `u8` form.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "uint8" | "u8" => Some(Self::U8),
            "uint16" | "u16" => Some(Self::U16),
            "float32" | "f32" => Some(Self::F32),
            _ => None,
        }
    }

    /// Read one element. `bytes` must be exactly `size_bytes()` long.
    pub(crate) fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            Self::U8 => f64::from(bytes[0]),
            Self::U16 => f64::from(u16::from_le_bytes([bytes[0], bytes[1]])),
            Self::F32 => f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        }
    }

    /// Append one element converted with the saturating cast policy.
    ///
    /// Integer targets map NaN to 0, round half away from zero, then clamp
    /// to the target range. Float targets take the value unchanged.
    pub(crate) fn encode_into(self, value: f64, out: &mut Vec<u8>) {
        match self {
            Self::U8 => out.push(saturate(value, f64::from(u8::MAX)) as u8),
            Self::U16 => {
                let v = saturate(value, f64::from(u16::MAX)) as u16;
                out.extend_from_slice(&v.to_le_bytes());
            }
            Self::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
        }
    }
}

fn saturate(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.round().clamp(0.0, max)
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(ty: ElementType, value: f64) -> Vec<u8> {
        let mut out = Vec::new();
        ty.encode_into(value, &mut out);
        out
    }

    #[test]
    fn test_names_round_trip() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(ElementType::from_name("f32"), Some(ElementType::F32));
        assert_eq!(ElementType::from_name("int64"), None);
    }

    #[test]
    fn test_u8_saturation_policy() {
        assert_eq!(encode(ElementType::U8, 300.0), vec![255]);
        assert_eq!(encode(ElementType::U8, -4.0), vec![0]);
        assert_eq!(encode(ElementType::U8, 2.5), vec![3]);
        assert_eq!(encode(ElementType::U8, 2.49), vec![2]);
        assert_eq!(encode(ElementType::U8, f64::NAN), vec![0]);
        assert_eq!(encode(ElementType::U8, f64::INFINITY), vec![255]);
    }

    #[test]
    fn test_multibyte_elements_are_little_endian() {
        assert_eq!(encode(ElementType::U16, 258.0), vec![2, 1]);
        let bytes = encode(ElementType::F32, 1.5);
        assert_eq!(bytes, 1.5f32.to_le_bytes().to_vec());
        assert_eq!(ElementType::F32.decode(&bytes), 1.5);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ElementType::F32).unwrap();
        assert_eq!(json, "\"float32\"");
        let parsed: ElementType = serde_json::from_str("\"u8\"").unwrap();
        assert_eq!(parsed, ElementType::U8);
    }
}
