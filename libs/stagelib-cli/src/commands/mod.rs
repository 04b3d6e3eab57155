// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::Path;

use anyhow::{Context, Result};
use stagelib::PipelineDefinition;

pub mod dot;
pub mod list;
pub mod run;
pub mod validate;

/// Load a definition file, attaching the path to any error.
pub(crate) fn load_definition(path: &Path) -> Result<PipelineDefinition> {
    PipelineDefinition::from_path(path)
        .with_context(|| format!("Failed to load definition '{}'", path.display()))
}
