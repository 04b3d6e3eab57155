// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use anyhow::Result;
use stagelib::StageKind;

/// List every built-in stage type.
pub fn stages() -> Result<()> {
    println!("Available stage types ({}):\n", StageKind::ALL.len());

    for kind in StageKind::ALL {
        println!("  {}", kind.type_name());
        println!("    {}", kind.description());
        println!("    Inputs: {}", kind.arity());
        println!();
    }

    Ok(())
}
