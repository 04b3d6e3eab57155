// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::Path;

use anyhow::{Context, Result};
use stagelib::Pipeline;

use super::load_definition;

/// Check a definition by connecting it, then report its shape.
pub fn run(path: &Path) -> Result<()> {
    let definition = load_definition(path)?;
    definition.validate().context("Invalid stage wiring")?;

    let name = definition.display_name().to_string();
    let mut pipeline = Pipeline::from_definition(definition).context("Failed to assemble")?;
    pipeline.connect().context("Failed to connect")?;

    println!("{}: OK", name);
    println!("  Stages:    {}", pipeline.len());
    println!("  Order:     {}", pipeline.topological_order()?.join(" -> "));
    println!("  Sources:   {}", pipeline.source_labels().join(", "));
    println!("  Terminals: {}", pipeline.terminal_labels().join(", "));

    pipeline.stop();
    Ok(())
}
