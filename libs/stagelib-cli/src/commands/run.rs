// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use stagelib::{DataErrorPolicy, DriveMode, ElementType, Frame, FrameShape, Pipeline, RunMode};

use super::load_definition;

/// Command-line overrides of a definition's run settings.
#[derive(Debug, Default)]
pub struct Overrides {
    pub cycles: Option<u64>,
    pub drive: Option<DriveMode>,
    pub skip_errors: bool,
}

/// Frame exchange record: `{width, height, channels, dtype, data}` with one
/// number per element.
#[derive(Debug, Deserialize)]
struct FrameFile {
    width: u32,
    height: u32,
    #[serde(default = "default_channels")]
    channels: u32,
    dtype: ElementType,
    data: Vec<f64>,
}

fn default_channels() -> u32 {
    1
}

impl FrameFile {
    fn load(path: &Path) -> Result<Frame> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read frame file '{}'", path.display()))?;
        let file: FrameFile = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse frame file '{}'", path.display()))?;
        file.into_frame()
            .with_context(|| format!("Invalid frame in '{}'", path.display()))
    }

    fn into_frame(self) -> stagelib::Result<Frame> {
        let shape = FrameShape::new(self.width, self.height, self.channels);
        Frame::from_f64(shape, self.dtype, &self.data)
    }
}

/// Split a `LABEL=FILE` argument.
fn parse_feed(arg: &str) -> Result<(&str, &Path)> {
    match arg.split_once('=') {
        Some((label, file)) if !label.is_empty() && !file.is_empty() => {
            Ok((label, Path::new(file)))
        }
        _ => bail!("Expected LABEL=FILE, got '{}'", arg),
    }
}

/// Run a definition file and print its terminal outputs.
pub fn run(path: &Path, overrides: Overrides, feeds: &[String], json: bool) -> Result<()> {
    let definition = load_definition(path)?;
    let name = definition.display_name().to_string();
    let mut pipeline = Pipeline::from_definition(definition)
        .with_context(|| format!("Failed to assemble pipeline '{}'", name))?;

    let mut config = pipeline.run_config().clone();
    if let Some(cycles) = overrides.cycles {
        config = config.with_mode(RunMode::Bounded { cycles });
    }
    if let Some(drive) = overrides.drive {
        config = config.with_drive(drive);
    }
    if overrides.skip_errors {
        config = config.with_data_errors(DataErrorPolicy::SkipAndLog);
    }
    pipeline.set_run_config(config);

    for arg in feeds {
        let (label, file) = parse_feed(arg)?;
        let frame = FrameFile::load(file)?;
        tracing::info!(
            "Feeding {} {} frame from '{}' to '{}'",
            frame.shape(),
            frame.dtype(),
            file.display(),
            label
        );
        pipeline
            .feed(label, frame)
            .with_context(|| format!("Failed to feed '{}'", label))?;
    }

    pipeline
        .connect()
        .with_context(|| format!("Failed to connect pipeline '{}'", name))?;
    let report = pipeline
        .start()
        .with_context(|| format!("Pipeline '{}' failed", name))?;
    let outputs = pipeline.outputs();
    pipeline.stop();

    if json {
        let outputs: serde_json::Map<String, serde_json::Value> = outputs
            .iter()
            .map(|(label, frame)| {
                let value = frame.as_ref().map_or(serde_json::Value::Null, describe);
                (label.clone(), value)
            })
            .collect();
        let value = serde_json::json!({
            "pipeline": name,
            "report": report,
            "outputs": outputs,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{}: {} cycles ({:?} drive), {}",
        name, report.cycles, report.drive, report.stop_reason
    );
    if report.frames_dropped > 0 {
        println!("  Dropped frames: {}", report.frames_dropped);
    }
    println!("  Outputs:");
    for (label, frame) in &outputs {
        match frame {
            Some(frame) => println!(
                "    {}: {} {} (frame {})",
                label,
                frame.shape(),
                frame.dtype(),
                frame.frame_number()
            ),
            None => println!("    {}: <none>", label),
        }
    }

    Ok(())
}

fn describe(frame: &Frame) -> serde_json::Value {
    serde_json::json!({
        "width": frame.width(),
        "height": frame.height(),
        "channels": frame.channels(),
        "dtype": frame.dtype().name(),
        "frame_number": frame.frame_number(),
        "timestamp_ns": frame.timestamp_ns(),
    })
}
