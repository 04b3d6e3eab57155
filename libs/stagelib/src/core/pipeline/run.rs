// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frame propagation and the `start()` driver.
//!
//! Push: a stage that produced hands each consumer the output it reads,
//! sweeping forward in topological order so every consumer runs after all
//! of its producers in the same step. Pull: a stage recursively pulls its
//! inputs and recomputes when it is stale under the configured
//! [`PullCachePolicy`].

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use super::pipeline::Pipeline;
use super::state::PipelineState;
use crate::core::config::{CancellationPolicy, DataErrorPolicy, DriveMode, PullCachePolicy};
use crate::core::entity::Entity;
use crate::core::error::{PipelineError, Result};
use crate::core::frames::Frame;
use crate::core::registry::StageHandle;
use crate::core::stage::{PushOutcome, ResolvedInput};

/// Why a `start()` run returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured number of cycles ran.
    Completed,
    /// A cycle found no source with a frame to emit.
    SourcesExhausted,
    /// A stop handle asked the run to end.
    StopRequested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::SourcesExhausted => "sources exhausted",
            Self::StopRequested => "stop requested",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Cycles in which at least one source emitted and propagation finished.
    pub cycles: u64,
    /// Frames dropped by skip-and-log during this run.
    pub frames_dropped: u64,
    pub drive: DriveMode,
    pub stop_reason: StopReason,
}

enum CycleOutcome {
    Completed,
    Idle,
    Abandoned,
}

/// How propagation reacts to a data error.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ErrorRouting {
    /// Hand every error back to the caller.
    Return,
    /// Apply the run's [`DataErrorPolicy`].
    Policy,
}

impl Pipeline {
    /// Deliver `frame` to input slot `input_index` of `label` and forward the
    /// result downstream.
    ///
    /// Errors are returned to the caller as-is; the data error policy only
    /// governs `start()` runs.
    pub fn push_frame(
        &mut self,
        label: &str,
        frame: Frame,
        input_index: usize,
    ) -> Result<PushOutcome> {
        if self.state != PipelineState::Connected {
            return Err(self.state_error("push a frame into"));
        }
        let handle = self.registry.resolve(label)?;
        let outcome = self.entry_mut(handle)?.push_frame(frame, input_index)?;
        if outcome == PushOutcome::Produced {
            self.record_seen(handle)?;
            self.sweep(HashSet::from([handle]), ErrorRouting::Return)?;
        }
        Ok(outcome)
    }

    /// Latest output 0 of `label`.
    ///
    /// On a connected pipeline this pulls: upstream stages are pulled first
    /// and the stage recomputes if its cached output is stale (or missing).
    /// Otherwise the cached frame, if any, is returned as-is.
    pub fn get_last_frame(&mut self, label: &str) -> Result<Option<Frame>> {
        let handle = self.registry.resolve(label)?;
        if self.state == PipelineState::Connected {
            self.pull(handle)?;
        }
        Ok(self.entry(handle)?.last_frame().cloned())
    }

    /// Run the pipeline according to its [`RunConfig`](crate::core::RunConfig).
    ///
    /// Requires `Connected`. Each cycle admits one frame per source, then
    /// propagates it by the configured [`DriveMode`]. A fatal error stops the
    /// pipeline before it is returned. A run ended by a stop request leaves
    /// the pipeline `Stopped`; any other run leaves it `Connected`.
    pub fn start(&mut self) -> Result<RunReport> {
        if self.state != PipelineState::Connected {
            return Err(self.state_error("start"));
        }
        self.state = PipelineState::Running;
        let config = self.config.clone();
        let dropped_before = self.frames_dropped;
        tracing::info!(
            "[{}] Starting ({:?} drive, {:?})",
            self.label,
            config.drive,
            config.mode
        );

        let mut cycles: u64 = 0;
        let stop_reason = loop {
            if config.cycle_limit().is_some_and(|limit| cycles >= limit) {
                break StopReason::Completed;
            }
            if self.stop.is_stop_requested() {
                break StopReason::StopRequested;
            }
            if cycles > 0 {
                if let Some(interval) = config.frame_interval() {
                    std::thread::sleep(interval);
                }
            }

            match self.run_cycle() {
                Ok(CycleOutcome::Completed) => cycles += 1,
                Ok(CycleOutcome::Idle) => break StopReason::SourcesExhausted,
                Ok(CycleOutcome::Abandoned) => break StopReason::StopRequested,
                Err(e) => {
                    tracing::error!(
                        "[{}] Run failed after {} cycles: {}",
                        self.label,
                        cycles,
                        e
                    );
                    self.clear_slots();
                    self.stop();
                    return Err(e);
                }
            }
        };

        let report = RunReport {
            cycles,
            frames_dropped: self.frames_dropped - dropped_before,
            drive: config.drive,
            stop_reason,
        };
        if stop_reason == StopReason::StopRequested {
            self.clear_slots();
            self.stop();
        } else {
            self.state = PipelineState::Connected;
        }
        tracing::info!(
            "[{}] Run finished: {} cycles, {} dropped, {}",
            self.label,
            report.cycles,
            report.frames_dropped,
            report.stop_reason
        );
        Ok(report)
    }

    /// One frame per source, propagated to completion (or abandoned).
    fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let sources: Vec<StageHandle> = self
            .topo
            .iter()
            .copied()
            .filter(|h| {
                self.stages
                    .get(h)
                    .is_some_and(|s| s.is_source() && s.has_pending_frames())
            })
            .collect();

        let mut produced = HashSet::new();
        let mut attempted = false;
        for handle in sources {
            let emitted = self.entry_mut(handle)?.emit_next();
            match emitted {
                Ok(true) => {
                    produced.insert(handle);
                    attempted = true;
                }
                Ok(false) => {}
                Err(e) => {
                    attempted = true;
                    self.absorb(e)?;
                }
            }
        }
        if !attempted {
            return Ok(CycleOutcome::Idle);
        }

        let finished = match self.config.drive {
            DriveMode::Push => self.sweep(produced, ErrorRouting::Policy)?,
            DriveMode::Pull => self.pull_terminals()?,
        };
        self.clear_slots();
        Ok(if finished {
            CycleOutcome::Completed
        } else {
            CycleOutcome::Abandoned
        })
    }

    /// Forward outputs of `produced` stages downstream in topological order.
    ///
    /// Returns `false` when the sweep was abandoned on a stop request.
    fn sweep(
        &mut self,
        mut produced: HashSet<StageHandle>,
        routing: ErrorRouting,
    ) -> Result<bool> {
        let order = self.topo.clone();
        for handle in order {
            if routing == ErrorRouting::Policy && self.should_abandon() {
                tracing::debug!("[{}] Abandoning cycle at stage {}", self.label, handle);
                return Ok(false);
            }
            if !produced.contains(&handle) {
                continue;
            }

            let consumers = self.consumers.get(&handle).cloned().unwrap_or_default();
            for consumer in consumers {
                let output = self
                    .entry(handle)?
                    .output(consumer.output)
                    .map(|frame| frame.cloned());
                let frame = match output {
                    Ok(Some(frame)) => frame,
                    Ok(None) => continue,
                    Err(e) => {
                        self.route(e, routing)?;
                        continue;
                    }
                };
                let pushed = self.entry_mut(consumer.stage)?.push_frame(frame, consumer.slot);
                match pushed {
                    Ok(PushOutcome::Produced) => {
                        self.record_seen(consumer.stage)?;
                        produced.insert(consumer.stage);
                    }
                    Ok(PushOutcome::Pending) => {}
                    Err(e) => self.route(e, routing)?,
                }
            }
        }
        Ok(true)
    }

    fn pull_terminals(&mut self) -> Result<bool> {
        let terminals: Vec<StageHandle> = self
            .topo
            .iter()
            .copied()
            .filter(|h| !self.consumers.contains_key(h))
            .collect();
        for handle in terminals {
            if self.should_abandon() {
                return Ok(false);
            }
            if let Err(e) = self.pull(handle) {
                self.absorb(e)?;
            }
        }
        Ok(true)
    }

    /// Bring `handle`'s outputs up to date with its inputs.
    fn pull(&mut self, handle: StageHandle) -> Result<()> {
        let stage = self.entry(handle)?;
        if stage.is_source() || !stage.is_connected() {
            return Ok(());
        }
        if self.config.pull_cache == PullCachePolicy::ReturnCached && stage.last_frame().is_some() {
            return Ok(());
        }

        let resolved: Vec<ResolvedInput> = stage.resolved().to_vec();
        for input in &resolved {
            self.pull(input.handle)?;
        }

        let mut frames = Vec::with_capacity(resolved.len());
        let mut versions = Vec::with_capacity(resolved.len());
        for input in &resolved {
            let upstream = self.entry(input.handle)?;
            match upstream.output(input.output)? {
                Some(frame) => frames.push(frame.clone()),
                // An input has nothing yet; keep whatever is cached.
                None => return Ok(()),
            }
            versions.push(upstream.version());
        }

        let label = self.label.clone();
        let stage = self.entry_mut(handle)?;
        if !stage.is_stale(&versions) {
            return Ok(());
        }
        tracing::debug!("[{}] Pull recomputing '{}'", label, stage.label());
        stage.compute(&frames, versions)
    }

    fn record_seen(&mut self, handle: StageHandle) -> Result<()> {
        let versions = self
            .entry(handle)?
            .resolved()
            .iter()
            .map(|input| Ok(self.entry(input.handle)?.version()))
            .collect::<Result<Vec<_>>>()?;
        self.entry_mut(handle)?.mark_seen(versions);
        Ok(())
    }

    fn route(&mut self, error: PipelineError, routing: ErrorRouting) -> Result<()> {
        match routing {
            ErrorRouting::Return => Err(error),
            ErrorRouting::Policy => self.absorb(error),
        }
    }

    /// Apply the data error policy. Non-data errors are always fatal.
    fn absorb(&mut self, error: PipelineError) -> Result<()> {
        if error.is_data_error() && self.config.data_errors == DataErrorPolicy::SkipAndLog {
            self.frames_dropped += 1;
            tracing::warn!("[{}] Dropped frame: {}", self.label, error);
            return Ok(());
        }
        Err(error)
    }

    fn should_abandon(&self) -> bool {
        self.config.cancellation == CancellationPolicy::Abandon && self.stop.is_stop_requested()
    }

    fn clear_slots(&mut self) {
        for stage in self.stages.values_mut() {
            stage.clear_slots();
        }
    }
}
