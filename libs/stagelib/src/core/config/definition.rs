// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Declarative pipeline definitions loaded from JSON, YAML or TOML.
//!
//! # Example definition
//!
//! ```json
//! {
//!   "name": "split-merge",
//!   "stages": [
//!     { "type": "Source", "label": "src" },
//!     { "type": "Split", "label": "s", "inputs": ["src"] },
//!     { "type": "Merge", "label": "m", "inputs": ["s.0", "s.1", "s.2"] }
//!   ]
//! }
//! ```
//!
//! Stages are listed in any order; wiring is by label. `label.N` selects
//! output `N` of a multi-output stage.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::RunConfig;
use crate::core::entity::InputRef;
use crate::core::error::{PipelineError, Result};
use crate::core::parameters::{ParamValue, Parameters};
use crate::core::pipeline::Pipeline;
use crate::core::registry::validate_label;

/// One stage record: `{type, label, parameters, inputs}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Variant name, e.g. `"Crop"` (or `"CropStage"`).
    #[serde(rename = "type")]
    pub stage_type: String,

    pub label: String,

    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,

    /// Upstream references in input-slot order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
}

impl StageSpec {
    pub fn new(stage_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            stage_type: stage_type.into(),
            label: label.into(),
            parameters: Parameters::new(),
            inputs: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }
}

/// A named, ordered list of stage specs plus optional run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub name: Option<String>,

    pub stages: Vec<StageSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunConfig>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, stages: Vec<StageSpec>) -> Self {
        Self {
            name: Some(name.into()),
            stages,
            run: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            PipelineError::Definition(format!("Failed to parse pipeline JSON: {}", e))
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            PipelineError::Definition(format!("Failed to parse pipeline YAML: {}", e))
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            PipelineError::Definition(format!("Failed to parse pipeline TOML: {}", e))
        })
    }

    /// Load from a file, picking the format from its extension.
    /// Anything other than `.yaml`, `.yml` or `.toml` is read as JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Definition(format!(
                "Failed to read pipeline file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let definition = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            _ => Self::from_json_str(&text),
        };
        definition.map_err(|e| match e {
            PipelineError::Definition(reason) => {
                PipelineError::Definition(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    /// Display name, falling back to `"pipeline"`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("pipeline")
    }

    /// Check labels and references without building any stage.
    ///
    /// Checks:
    /// - Every label is well formed and unique
    /// - Every input parses as `label` or `label.N` and names a listed stage
    pub fn validate(&self) -> Result<()> {
        let mut labels: HashSet<&str> = HashSet::new();
        for spec in &self.stages {
            validate_label(&spec.label)?;
            if !labels.insert(spec.label.as_str()) {
                return Err(PipelineError::DuplicateLabel(spec.label.clone()));
            }
        }

        for spec in &self.stages {
            for text in &spec.inputs {
                let input = InputRef::parse(text)?;
                if !labels.contains(input.label()) {
                    return Err(PipelineError::UnknownLabel(input.label().to_string()));
                }
            }
        }
        Ok(())
    }

    pub fn into_pipeline(self) -> Result<Pipeline> {
        Pipeline::from_definition(self)
    }
}
