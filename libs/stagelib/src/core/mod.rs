// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod config;
pub mod entity;
pub mod error;
pub mod frames;
pub mod parameters;
pub mod pipeline;
pub mod prelude;
pub mod registry;
pub mod stage;
pub mod stages;

pub use config::*;
pub use entity::{Entity, EntityState, InputRef};
pub use error::{ErrorCategory, PipelineError, Result};
pub use frames::{ElementType, Frame, FrameShape};
pub use parameters::{ParamValue, Parameters};
pub use pipeline::*;
pub use registry::{validate_label, LabelRegistry, StageHandle};
pub use stage::{PushOutcome, Stage};
pub use stages::{
    Arity, CastConfig, ClearChannelConfig, CropConfig, FrameSource, IterFrameSource, MergeConfig,
    SourceConfig, SourcePattern, SplitConfig, StageKind, Transform,
};
