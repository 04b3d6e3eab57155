// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod definition;
mod run_config;

pub use definition::{PipelineDefinition, StageSpec};
pub use run_config::{
    CancellationPolicy, DataErrorPolicy, DriveMode, PullCachePolicy, RunConfig, RunMode,
};
