// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::Path;

use anyhow::{Context, Result};
use stagelib::Pipeline;

use super::load_definition;

pub fn run(path: &Path) -> Result<()> {
    let pipeline = Pipeline::from_definition(load_definition(path)?)?;
    let dot = pipeline.to_dot().context("Failed to build stage graph")?;
    print!("{}", dot);
    Ok(())
}
