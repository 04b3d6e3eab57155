// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Algebraic laws of the built-in stages over arbitrary frames.

use proptest::prelude::*;

use stagelib::core::{Parameters, StageKind, Transform};
use stagelib::prelude::*;

fn arb_dtype() -> impl Strategy<Value = ElementType> {
    prop::sample::select(ElementType::ALL.to_vec())
}

/// Frame with arbitrary extent, channel count, element type and payload.
fn arb_frame() -> impl Strategy<Value = Frame> {
    (1u32..12, 1u32..12, 1u32..6, arb_dtype()).prop_flat_map(|(w, h, c, dtype)| {
        let shape = FrameShape::new(w, h, c);
        prop::collection::vec(any::<u8>(), shape.byte_len(dtype))
            .prop_map(move |data| Frame::new(shape, dtype, data).unwrap())
    })
}

fn transform(kind: StageKind, parameters: Parameters) -> Transform {
    Transform::configure(kind, "law", &parameters).unwrap()
}

proptest! {
    #[test]
    fn test_merge_inverts_split(frame in arb_frame()) {
        let split = transform(StageKind::Split, Parameters::new());
        let merge = transform(StageKind::Merge, Parameters::new());

        let planes = split.apply("law", std::slice::from_ref(&frame)).unwrap();
        prop_assert_eq!(planes.len(), frame.channels() as usize);
        for plane in &planes {
            prop_assert_eq!(plane.channels(), 1);
            prop_assert_eq!(plane.dtype(), frame.dtype());
        }

        let merged = merge.apply("law", &planes).unwrap();
        prop_assert_eq!(merged, vec![frame]);
    }

    #[test]
    fn test_uint8_survives_float32_round_trip(
        (w, h, c, data) in (1u32..10, 1u32..10, 1u32..5).prop_flat_map(|(w, h, c)| {
            let len = (w * h * c) as usize;
            (Just(w), Just(h), Just(c), prop::collection::vec(any::<u8>(), len))
        })
    ) {
        let frame = Frame::from_u8(FrameShape::new(w, h, c), data).unwrap();
        let to_float = transform(
            StageKind::Cast,
            Parameters::new().with("target_type", "float32"),
        );
        let to_byte = transform(StageKind::Cast, Parameters::new().with("target_type", "uint8"));

        let float = to_float.apply("law", std::slice::from_ref(&frame)).unwrap();
        prop_assert_eq!(float[0].dtype(), ElementType::F32);
        let back = to_byte.apply("law", &float).unwrap();
        prop_assert_eq!(&back[0], &frame);
    }

    #[test]
    fn test_crop_of_full_extent_is_identity(frame in arb_frame()) {
        let crop = transform(
            StageKind::Crop,
            Parameters::new()
                .with("width", i64::from(frame.width()))
                .with("height", i64::from(frame.height())),
        );
        let out = crop.apply("law", std::slice::from_ref(&frame)).unwrap();
        prop_assert_eq!(&out[0], &frame);
    }

    #[test]
    fn test_clear_channel_touches_only_its_channel(
        frame in arb_frame().prop_filter("needs two channels", |f| f.channels() >= 2),
    ) {
        let clear = transform(StageKind::ClearChannel, Parameters::new().with("channel", 1i64));
        let out = clear.apply("law", std::slice::from_ref(&frame)).unwrap();
        let out = &out[0];

        let size = frame.dtype().size_bytes();
        let stride = frame.pixel_stride();
        for (before, after) in frame.as_bytes().chunks(stride).zip(out.as_bytes().chunks(stride)) {
            prop_assert_eq!(&before[..size], &after[..size]);
            prop_assert!(after[size..2 * size].iter().all(|b| *b == 0));
            prop_assert_eq!(&before[2 * size..], &after[2 * size..]);
        }
    }
}
