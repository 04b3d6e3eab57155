// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Label-wired stage graphs for streaming video frames.
//!
//! A [`Pipeline`] is built from an ordered list of stage specs, connected
//! into a validated directed graph, and driven either by push (a producer
//! forces propagation downstream) or by pull (a consumer asks for its
//! latest output and recomputes lazily).
//!
//! ```
//! use stagelib::prelude::*;
//!
//! let mut pipeline = Pipeline::new(
//!     "split-merge",
//!     vec![
//!         StageSpec::new("Source", "src"),
//!         StageSpec::new("Split", "s").with_inputs(["src"]),
//!         StageSpec::new("Merge", "m").with_inputs(["s.0", "s.1", "s.2"]),
//!     ],
//! )?;
//! pipeline.connect()?;
//!
//! let frame = Frame::zeroed(FrameShape::new(4, 4, 3), ElementType::U8)?;
//! pipeline.feed("src", frame.clone())?;
//! pipeline.start()?;
//!
//! assert_eq!(pipeline.stage("m")?.last_frame(), Some(&frame));
//! # Ok::<(), stagelib::PipelineError>(())
//! ```

pub mod core;

pub use crate::core::{
    CancellationPolicy, DataErrorPolicy, DriveMode, ElementType, Entity, EntityState,
    ErrorCategory, Frame, FrameShape, FrameSource, InputRef, IterFrameSource, LabelRegistry,
    ParamValue, Parameters, Pipeline, PipelineBuilder, PipelineDefinition, PipelineError,
    PipelineState, PullCachePolicy, PushOutcome, Result, RunConfig, RunMode, RunReport, Stage,
    StageHandle, StageKind, StageSpec, StopHandle, StopReason,
};

pub use crate::core::prelude;
