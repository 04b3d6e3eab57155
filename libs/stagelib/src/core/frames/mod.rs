// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod element_type;
pub mod frame;

pub use element_type::ElementType;
pub use frame::{Frame, FrameShape};
