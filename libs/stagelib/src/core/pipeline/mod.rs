// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod builder;
mod graph;
#[allow(clippy::module_inception)]
mod pipeline;
mod run;
mod state;

pub use builder::PipelineBuilder;
pub use pipeline::Pipeline;
pub use run::{RunReport, StopReason};
pub use state::{PipelineState, StopHandle};
