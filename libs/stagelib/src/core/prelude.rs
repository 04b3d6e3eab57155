// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Commonly used types for `use stagelib::prelude::*`.

pub use crate::core::{
    // Configuration
    config::{DriveMode, PipelineDefinition, RunConfig, RunMode, StageSpec},

    // Lifecycle
    entity::{Entity, EntityState},

    // Errors
    error::{PipelineError, Result},

    // Frames
    frames::{ElementType, Frame, FrameShape},

    // Pipeline
    pipeline::{Pipeline, PipelineState, RunReport, StopReason},

    // Stages
    stages::{FrameSource, IterFrameSource},
};
