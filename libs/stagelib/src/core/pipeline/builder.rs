// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Builder pattern for Pipeline construction.

use super::pipeline::Pipeline;
use crate::core::config::{RunConfig, StageSpec};
use crate::core::error::Result;
use crate::core::stages::FrameSource;

/// Builder for assembling a [`Pipeline`] in code.
pub struct PipelineBuilder {
    label: String,
    stages: Vec<StageSpec>,
    config: RunConfig,
    sources: Vec<(String, Box<dyn FrameSource>)>,
}

impl PipelineBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stages: Vec::new(),
            config: RunConfig::default(),
            sources: Vec::new(),
        }
    }

    /// Append a stage spec.
    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    /// Append several stage specs, keeping their order.
    pub fn stages(mut self, specs: impl IntoIterator<Item = StageSpec>) -> Self {
        self.stages.extend(specs);
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Drive the source stage `label` from `source` once built.
    pub fn with_source(
        mut self,
        label: impl Into<String>,
        source: impl FrameSource + 'static,
    ) -> Self {
        self.sources.push((label.into(), Box::new(source)));
        self
    }

    /// Assemble the pipeline without connecting it.
    pub fn build(self) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new(self.label, self.stages)?.with_config(self.config);
        for (label, source) in self.sources {
            pipeline.attach_boxed_source(&label, source)?;
        }
        Ok(pipeline)
    }

    /// Assemble and connect.
    pub fn build_connected(self) -> Result<Pipeline> {
        let mut pipeline = self.build()?;
        pipeline.connect()?;
        Ok(pipeline)
    }
}
