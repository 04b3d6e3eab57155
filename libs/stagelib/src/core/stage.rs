// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! A single processing node.
//!
//! A stage holds label references to its upstream stages, never the stages
//! themselves. It buffers at most one pending frame per input slot and one
//! set of outputs (its `last_frame`); producing new outputs overwrites the
//! previous ones.

use crate::core::config::StageSpec;
use crate::core::entity::{Entity, EntityState, InputRef};
use crate::core::error::{PipelineError, Result};
use crate::core::frames::Frame;
use crate::core::parameters::Parameters;
use crate::core::registry::{validate_label, LabelRegistry, StageHandle};
use crate::core::stages::{FrameSource, SourceFeed, StageKind, Transform};

/// Upstream reference resolved to a registry handle. Dropped on disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedInput {
    pub(crate) handle: StageHandle,
    pub(crate) output: usize,
}

/// Result of delivering a frame to one input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Other input slots are still waiting for this step's frames.
    Pending,
    /// Every slot was filled and the stage produced new outputs.
    Produced,
}

#[derive(Debug)]
pub struct Stage {
    label: String,
    kind: StageKind,
    parameters: Parameters,
    inputs: Vec<InputRef>,
    state: EntityState,
    transform: Option<Transform>,
    resolved: Vec<ResolvedInput>,
    slots: Vec<Option<Frame>>,
    outputs: Option<Vec<Frame>>,
    /// Bumped every time `outputs` is replaced.
    version: u64,
    /// Upstream output versions the current `outputs` were computed from.
    seen: Vec<u64>,
    feed: Option<SourceFeed>,
}

impl Stage {
    pub fn new(
        label: impl Into<String>,
        kind: StageKind,
        parameters: Parameters,
        inputs: Vec<InputRef>,
    ) -> Result<Self> {
        let label = label.into();
        validate_label(&label)?;
        let feed = (kind == StageKind::Source).then(SourceFeed::default);
        Ok(Self {
            label,
            kind,
            parameters,
            inputs,
            state: EntityState::Registered,
            transform: None,
            resolved: Vec::new(),
            slots: Vec::new(),
            outputs: None,
            version: 0,
            seen: Vec::new(),
            feed,
        })
    }

    pub fn from_spec(spec: &StageSpec) -> Result<Self> {
        let kind = StageKind::from_type_name(&spec.stage_type)?;
        let inputs = spec
            .inputs
            .iter()
            .map(|text| InputRef::parse(text))
            .collect::<Result<Vec<_>>>()?;
        Self::new(spec.label.clone(), kind, spec.parameters.clone(), inputs)
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn is_source(&self) -> bool {
        self.kind == StageKind::Source
    }

    /// Most recent output 0, or `None` if the stage never produced anything.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.outputs.as_ref().and_then(|outputs| outputs.first())
    }

    /// Most recent output `index`.
    ///
    /// `Ok(None)` before the first production. Fails with `ArityMismatch`
    /// when the stage produced fewer than `index + 1` outputs.
    pub fn output(&self, index: usize) -> Result<Option<&Frame>> {
        match &self.outputs {
            None => Ok(None),
            Some(outputs) => outputs.get(index).map(Some).ok_or_else(|| {
                PipelineError::ArityMismatch {
                    stage: self.label.clone(),
                    expected: format!("output index < {}", outputs.len()),
                    found: index,
                }
            }),
        }
    }

    pub fn outputs(&self) -> Option<&[Frame]> {
        self.outputs.as_deref()
    }

    /// Number of outputs the stage will produce, when it is fixed by
    /// configuration alone. A Split without `channels` follows its input.
    pub fn declared_output_count(&self) -> Option<usize> {
        match self.kind {
            StageKind::Split => self
                .parameters
                .get("channels")
                .and_then(|v| v.as_i64())
                .and_then(|n| usize::try_from(n).ok()),
            _ => Some(1),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Deliver `frame` to input slot `input_index`.
    ///
    /// A source treats slot 0 as its ingress and emits the frame directly.
    /// Any other stage computes once every slot holds a frame for the
    /// current step. Forwarding to consumers is the pipeline's job.
    pub fn push_frame(&mut self, frame: Frame, input_index: usize) -> Result<PushOutcome> {
        self.require_connected("push a frame into")?;

        if self.is_source() {
            if input_index != 0 {
                return Err(self.slot_error(input_index, 1));
            }
            self.emit(vec![frame], Vec::new());
            return Ok(PushOutcome::Produced);
        }

        if input_index >= self.slots.len() {
            return Err(self.slot_error(input_index, self.slots.len()));
        }
        self.slots[input_index] = Some(frame);

        if self.slots.iter().any(Option::is_none) {
            return Ok(PushOutcome::Pending);
        }
        let inputs: Vec<Frame> = self.slots.iter_mut().filter_map(Option::take).collect();
        self.compute(&inputs, Vec::new())?;
        Ok(PushOutcome::Produced)
    }

    /// Run the transform on a complete set of inputs.
    ///
    /// On failure the previous outputs stay in place.
    pub(crate) fn compute(&mut self, inputs: &[Frame], seen: Vec<u64>) -> Result<()> {
        let transform = self.transform.as_ref().ok_or_else(|| PipelineError::InvalidState {
            entity: self.label.clone(),
            operation: "compute",
            state: self.state.to_string(),
        })?;
        let outputs = transform.apply(&self.label, inputs)?;
        tracing::debug!(
            "[{}] Produced {} output(s) from {} input(s)",
            self.label,
            outputs.len(),
            inputs.len()
        );
        self.emit(outputs, seen);
        Ok(())
    }

    fn emit(&mut self, outputs: Vec<Frame>, seen: Vec<u64>) {
        self.outputs = Some(outputs);
        self.version += 1;
        self.seen = seen;
    }

    /// Record which upstream versions the current outputs reflect.
    pub(crate) fn mark_seen(&mut self, seen: Vec<u64>) {
        self.seen = seen;
    }

    /// True when the cached outputs were not computed from `versions`.
    pub(crate) fn is_stale(&self, versions: &[u64]) -> bool {
        self.outputs.is_none() || self.seen != versions
    }

    pub(crate) fn resolved(&self) -> &[ResolvedInput] {
        &self.resolved
    }

    pub(crate) fn clear_slots(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    pub(crate) fn enqueue(&mut self, frame: Frame) -> Result<()> {
        let label = self.label.clone();
        self.feed
            .as_mut()
            .ok_or(PipelineError::NotASource(label))?
            .enqueue(frame);
        Ok(())
    }

    pub(crate) fn attach_source(&mut self, source: Box<dyn FrameSource>) -> Result<()> {
        let label = self.label.clone();
        self.feed
            .as_mut()
            .ok_or(PipelineError::NotASource(label))?
            .attach(source);
        Ok(())
    }

    /// Pull the next frame from this source's feed and emit it.
    pub(crate) fn emit_next(&mut self) -> Result<bool> {
        self.require_connected("emit from")?;
        let pattern = match &self.transform {
            Some(Transform::Source(config)) => config.pattern.as_ref(),
            _ => None,
        };
        let feed = self
            .feed
            .as_mut()
            .ok_or_else(|| PipelineError::NotASource(self.label.clone()))?;
        match feed.next(&self.label, pattern)? {
            Some(frame) => {
                self.emit(vec![frame], Vec::new());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// True when a source could still emit on a later cycle.
    pub(crate) fn has_pending_frames(&self) -> bool {
        let pattern = match &self.transform {
            Some(Transform::Source(config)) => config.pattern.as_ref(),
            _ => None,
        };
        self.feed.as_ref().is_some_and(|feed| feed.is_live(pattern))
    }

    /// Frames fed to this source and not yet emitted. Always 0 for non-sources.
    pub fn queued_frames(&self) -> usize {
        self.feed.as_ref().map_or(0, SourceFeed::queued)
    }

    /// Frames this source has emitted through `start()` cycles.
    pub fn frames_emitted(&self) -> u64 {
        self.feed.as_ref().map_or(0, SourceFeed::emitted)
    }

    fn require_connected(&self, operation: &'static str) -> Result<()> {
        if self.state == EntityState::Connected {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                entity: self.label.clone(),
                operation,
                state: self.state.to_string(),
            })
        }
    }

    fn slot_error(&self, index: usize, slots: usize) -> PipelineError {
        PipelineError::ArityMismatch {
            stage: self.label.clone(),
            expected: format!("input index < {}", slots),
            found: index,
        }
    }
}

impl Entity for Stage {
    fn label(&self) -> &str {
        &self.label
    }

    fn inputs(&self) -> &[InputRef] {
        &self.inputs
    }

    fn state(&self) -> EntityState {
        self.state
    }

    fn connect(&mut self, registry: &LabelRegistry) -> Result<()> {
        if self.state == EntityState::Connected {
            return Ok(());
        }

        let arity = self.kind.arity();
        if !arity.accepts(self.inputs.len()) {
            return Err(PipelineError::ArityMismatch {
                stage: self.label.clone(),
                expected: arity.to_string(),
                found: self.inputs.len(),
            });
        }

        let transform = Transform::configure(self.kind, &self.label, &self.parameters)?;
        let resolved = self
            .inputs
            .iter()
            .map(|input| {
                Ok(ResolvedInput {
                    handle: registry.resolve(input.label())?,
                    output: input.output(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.slots = vec![None; resolved.len()];
        self.resolved = resolved;
        self.transform = Some(transform);
        self.state = EntityState::Connected;
        tracing::debug!("[{}] Connected ({} inputs)", self.label, self.resolved.len());
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.state != EntityState::Connected {
            return;
        }
        self.resolved.clear();
        self.slots.clear();
        self.transform = None;
        self.state = EntityState::Disconnected;
        tracing::debug!("[{}] Disconnected", self.label);
    }
}
