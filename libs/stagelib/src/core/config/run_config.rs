// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Run-time configuration of a pipeline's `start()` driver.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};

/// Data-flow discipline used by `start()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Sources emit, then every produced frame is forwarded in topological order.
    #[default]
    Push,
    /// Sources emit, then terminal stages pull their inputs recursively.
    Pull,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// One cycle.
    #[default]
    SinglePass,
    /// At most `cycles` cycles.
    Bounded { cycles: u64 },
    /// Until stopped or every source runs dry.
    Continuous,
}

/// What a data error (shape, type, arity, bounds) does to a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataErrorPolicy {
    /// Stop the pipeline and return the error.
    #[default]
    Fatal,
    /// Drop the offending frame, log it, and continue.
    SkipAndLog,
}

/// How a stop request interacts with an in-flight cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    /// Finish propagating the current frame, admit no more.
    #[default]
    Drain,
    /// Abandon the cycle between stages.
    Abandon,
}

/// Whether a pull recomputes a stage whose inputs have newer outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullCachePolicy {
    #[default]
    RecomputeIfStale,
    /// Return the cached output whenever one exists.
    ReturnCached,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub drive: DriveMode,
    pub mode: RunMode,
    pub data_errors: DataErrorPolicy,
    pub cancellation: CancellationPolicy,
    pub pull_cache: PullCachePolicy,
    /// Pause between cycles of a bounded or continuous run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_interval_ms: Option<u64>,
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| PipelineError::Definition(format!("Failed to parse run config: {}", e)))
    }

    pub fn with_drive(mut self, drive: DriveMode) -> Self {
        self.drive = drive;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_data_errors(mut self, policy: DataErrorPolicy) -> Self {
        self.data_errors = policy;
        self
    }

    pub fn with_cancellation(mut self, policy: CancellationPolicy) -> Self {
        self.cancellation = policy;
        self
    }

    pub fn with_pull_cache(mut self, policy: PullCachePolicy) -> Self {
        self.pull_cache = policy;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Cycle limit, or `None` for a continuous run.
    pub fn cycle_limit(&self) -> Option<u64> {
        match self.mode {
            RunMode::SinglePass => Some(1),
            RunMode::Bounded { cycles } => Some(cycles),
            RunMode::Continuous => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.drive, DriveMode::Push);
        assert_eq!(config.mode, RunMode::SinglePass);
        assert_eq!(config.data_errors, DataErrorPolicy::Fatal);
        assert_eq!(config.cancellation, CancellationPolicy::Drain);
        assert_eq!(config.pull_cache, PullCachePolicy::RecomputeIfStale);
        assert_eq!(config.cycle_limit(), Some(1));
        assert!(config.frame_interval().is_none());
    }

    #[test]
    fn test_parse_toml() {
        let config = RunConfig::from_toml_str(
            r#"
            drive = "pull"
            data_errors = "skip_and_log"
            frame_interval_ms = 5

            [mode.bounded]
            cycles = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.drive, DriveMode::Pull);
        assert_eq!(config.mode, RunMode::Bounded { cycles: 3 });
        assert_eq!(config.data_errors, DataErrorPolicy::SkipAndLog);
        assert_eq!(config.frame_interval(), Some(Duration::from_millis(5)));
        assert_eq!(config.cancellation, CancellationPolicy::Drain);
    }

    #[test]
    fn test_parse_json_unit_variant() {
        let config: RunConfig =
            serde_json::from_str(r#"{"mode": "continuous", "cancellation": "abandon"}"#).unwrap();
        assert_eq!(config.mode, RunMode::Continuous);
        assert_eq!(config.cycle_limit(), None);
        assert_eq!(config.cancellation, CancellationPolicy::Abandon);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(RunConfig::from_toml_str(r#"data_errors = "retry""#).is_err());
    }
}
