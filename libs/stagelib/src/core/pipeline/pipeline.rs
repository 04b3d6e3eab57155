// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pipeline construction, connection, and teardown.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::builder::PipelineBuilder;
use super::graph::StageGraph;
use super::state::{PipelineState, StopHandle};
use crate::core::config::{PipelineDefinition, RunConfig, StageSpec};
use crate::core::entity::{Entity, EntityState, InputRef};
use crate::core::error::{PipelineError, Result};
use crate::core::frames::Frame;
use crate::core::registry::{LabelRegistry, StageHandle};
use crate::core::stage::Stage;
use crate::core::stages::FrameSource;

/// Downstream edge used for push propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Consumer {
    pub(super) stage: StageHandle,
    pub(super) slot: usize,
    pub(super) output: usize,
}

/// Owns a set of stages, the registry scoped to them, and the run driver.
#[derive(Debug)]
pub struct Pipeline {
    pub(super) label: String,
    pub(super) registry: LabelRegistry,
    pub(super) stages: HashMap<StageHandle, Stage>,
    /// Handles in the order the stages were added.
    pub(super) insertion: Vec<StageHandle>,
    /// Topological order computed by the last successful connect.
    pub(super) topo: Vec<StageHandle>,
    pub(super) consumers: HashMap<StageHandle, Vec<Consumer>>,
    pub(super) state: PipelineState,
    pub(super) config: RunConfig,
    pub(super) stop: StopHandle,
    pub(super) frames_dropped: u64,
}

impl Pipeline {
    /// Build one stage per spec and register the whole batch.
    ///
    /// Nothing is registered if any spec fails: an unknown `type`, a
    /// malformed label or input, or a label used twice.
    pub fn new(label: impl Into<String>, specs: Vec<StageSpec>) -> Result<Self> {
        let label = label.into();
        let stages = specs
            .iter()
            .map(Stage::from_spec)
            .collect::<Result<Vec<_>>>()?;

        let registry = LabelRegistry::new();
        let batch: Vec<(String, Vec<String>)> = stages
            .iter()
            .map(|stage| (stage.label().to_string(), upstream_labels(stage.inputs())))
            .collect();
        let handles = registry.register_batch(&batch)?;

        tracing::info!("[{}] Assembled {} stages", label, handles.len());
        Ok(Self {
            label,
            registry,
            insertion: handles.clone(),
            stages: handles.into_iter().zip(stages).collect(),
            topo: Vec::new(),
            consumers: HashMap::new(),
            state: PipelineState::Assembled,
            config: RunConfig::default(),
            stop: StopHandle::default(),
            frames_dropped: 0,
        })
    }

    pub fn from_definition(definition: PipelineDefinition) -> Result<Self> {
        let label = definition.display_name().to_string();
        let config = definition.run.unwrap_or_default();
        Ok(Self::new(label, definition.stages)?.with_config(config))
    }

    pub fn builder(label: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(label)
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_run_config(&mut self, config: RunConfig) {
        self.config = config;
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn registry(&self) -> &LabelRegistry {
        &self.registry
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Frames dropped by skip-and-log since the pipeline was built.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage(&self, label: &str) -> Result<&Stage> {
        let handle = self.registry.resolve(label)?;
        self.entry(handle)
    }

    /// Stages in the order they were added.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.insertion.iter().filter_map(|h| self.stages.get(h))
    }

    /// Validate the graph and connect every stage, producers first.
    ///
    /// All or nothing: if any stage fails to connect, the ones already
    /// connected are disconnected again and the pipeline goes back to
    /// `Assembled`. Calling it on a connected pipeline is a no-op.
    pub fn connect(&mut self) -> Result<()> {
        match self.state {
            PipelineState::Connected => return Ok(()),
            PipelineState::Running => return Err(self.state_error("connect")),
            PipelineState::Assembled | PipelineState::Stopped => {}
        }

        tracing::info!("[{}] Connecting {} stages", self.label, self.stages.len());
        let order = self.graph()?.topological_order()?;
        self.check_output_indices(&order)?;

        let mut connected: Vec<StageHandle> = Vec::with_capacity(order.len());
        for &handle in &order {
            let stage = self
                .stages
                .get_mut(&handle)
                .ok_or_else(|| dead_handle(handle))?;
            if let Err(e) = stage.connect(&self.registry) {
                let failed = stage.label().to_string();
                self.rollback(&connected);
                tracing::info!(
                    "[{}] Stage '{}' failed to connect, rolled back {} stages: {}",
                    self.label,
                    failed,
                    connected.len(),
                    e
                );
                return Err(e);
            }
            connected.push(handle);
        }

        self.consumers = self.consumer_map(&order)?;
        self.topo = order;
        self.state = PipelineState::Connected;
        self.stop.reset();
        tracing::info!(
            "[{}] Connected: {}",
            self.label,
            self.topological_order()?.join(" -> ")
        );
        Ok(())
    }

    /// Disconnect every stage, consumers before producers. Idempotent.
    pub fn stop(&mut self) {
        match self.state {
            PipelineState::Assembled | PipelineState::Stopped => return,
            PipelineState::Connected | PipelineState::Running => {}
        }

        let mut order = self.teardown_order();
        order.reverse();
        for handle in order {
            if let Some(stage) = self.stages.get_mut(&handle) {
                stage.disconnect();
            }
        }
        self.state = PipelineState::Stopped;
        tracing::info!("[{}] Stopped", self.label);
    }

    /// Add a stage while the pipeline is assembled or stopped.
    pub fn add_stage(&mut self, spec: StageSpec) -> Result<()> {
        self.require_editable("add a stage to")?;
        let stage = Stage::from_spec(&spec)?;
        let handle = self
            .registry
            .register(stage.label(), &upstream_labels(stage.inputs()))?;
        tracing::info!("[{}] Added stage '{}' ({})", self.label, stage.label(), stage.kind());
        self.stages.insert(handle, stage);
        self.insertion.push(handle);
        self.invalidate_graph();
        Ok(())
    }

    /// Remove a stage while the pipeline is assembled or stopped.
    ///
    /// Fails with `DanglingReference` while another stage lists `label` in
    /// its inputs.
    pub fn remove_stage(&mut self, label: &str) -> Result<Stage> {
        self.require_editable("remove a stage from")?;
        let handle = self.registry.unregister(label)?;
        let mut stage = self.stages.remove(&handle).ok_or_else(|| dead_handle(handle))?;
        stage.disconnect();
        self.insertion.retain(|h| *h != handle);
        self.invalidate_graph();
        tracing::info!("[{}] Removed stage '{}'", self.label, label);
        Ok(stage)
    }

    /// Queue a frame on a source stage for the next `start()` cycle.
    pub fn feed(&mut self, label: &str, frame: Frame) -> Result<()> {
        let handle = self.registry.resolve(label)?;
        self.entry_mut(handle)?.enqueue(frame)
    }

    /// Drive a source stage from an external producer.
    pub fn attach_source(
        &mut self,
        label: &str,
        source: impl FrameSource + 'static,
    ) -> Result<()> {
        self.attach_boxed_source(label, Box::new(source))
    }

    pub fn attach_boxed_source(&mut self, label: &str, source: Box<dyn FrameSource>) -> Result<()> {
        let handle = self.registry.resolve(label)?;
        self.entry_mut(handle)?.attach_source(source)?;
        tracing::info!("[{}] Attached external source to '{}'", self.label, label);
        Ok(())
    }

    /// Stage labels, producers before consumers.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        if self.state == PipelineState::Connected && !self.topo.is_empty() {
            return self.labels_of(&self.topo);
        }
        let order = self.graph()?.topological_order()?;
        self.labels_of(&order)
    }

    /// Labels of stages with no inputs, in insertion order.
    pub fn source_labels(&self) -> Vec<String> {
        self.stages()
            .filter(|stage| stage.inputs().is_empty())
            .map(|stage| stage.label().to_string())
            .collect()
    }

    /// Labels of stages no other stage reads from, in insertion order.
    pub fn terminal_labels(&self) -> Vec<String> {
        let referenced: HashSet<&str> = self
            .stages()
            .flat_map(|stage| stage.inputs().iter().map(InputRef::label))
            .collect();
        self.stages()
            .filter(|stage| !referenced.contains(stage.label()))
            .map(|stage| stage.label().to_string())
            .collect()
    }

    /// Latest output of every terminal stage.
    pub fn outputs(&self) -> BTreeMap<String, Option<Frame>> {
        self.terminal_labels()
            .into_iter()
            .map(|label| {
                let frame = self
                    .stage(&label)
                    .ok()
                    .and_then(|stage| stage.last_frame().cloned());
                (label, frame)
            })
            .collect()
    }

    /// Graphviz rendering of the label graph. Edge labels are input slots.
    pub fn to_dot(&self) -> Result<String> {
        Ok(self.graph()?.to_dot())
    }

    pub(super) fn entry(&self, handle: StageHandle) -> Result<&Stage> {
        self.stages.get(&handle).ok_or_else(|| dead_handle(handle))
    }

    pub(super) fn entry_mut(&mut self, handle: StageHandle) -> Result<&mut Stage> {
        self.stages.get_mut(&handle).ok_or_else(|| dead_handle(handle))
    }

    pub(super) fn state_error(&self, operation: &'static str) -> PipelineError {
        PipelineError::InvalidState {
            entity: self.label.clone(),
            operation,
            state: self.state.to_string(),
        }
    }

    fn graph(&self) -> Result<StageGraph> {
        StageGraph::build(
            self.insertion
                .iter()
                .filter_map(|h| self.stages.get(h).map(|stage| (*h, stage))),
        )
    }

    /// Reject `label.N` when the producer's output count is fixed and too small.
    fn check_output_indices(&self, order: &[StageHandle]) -> Result<()> {
        for &handle in order {
            for input in self.entry(handle)?.inputs() {
                let upstream = self.stage(input.label())?;
                if let Some(count) = upstream.declared_output_count() {
                    if input.output() >= count {
                        return Err(PipelineError::ArityMismatch {
                            stage: upstream.label().to_string(),
                            expected: format!("output index < {}", count),
                            found: input.output(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn consumer_map(&self, order: &[StageHandle]) -> Result<HashMap<StageHandle, Vec<Consumer>>> {
        let mut consumers: HashMap<StageHandle, Vec<Consumer>> = HashMap::new();
        for &handle in order {
            for (slot, input) in self.entry(handle)?.resolved().iter().enumerate() {
                consumers.entry(input.handle).or_default().push(Consumer {
                    stage: handle,
                    slot,
                    output: input.output,
                });
            }
        }
        Ok(consumers)
    }

    fn rollback(&mut self, connected: &[StageHandle]) {
        for handle in connected.iter().rev() {
            if let Some(stage) = self.stages.get_mut(handle) {
                stage.disconnect();
            }
        }
        self.topo.clear();
        self.consumers.clear();
        self.state = PipelineState::Assembled;
    }

    /// Topological order when known, else insertion order.
    fn teardown_order(&self) -> Vec<StageHandle> {
        let mut order: Vec<StageHandle> = self
            .topo
            .iter()
            .copied()
            .filter(|h| self.stages.contains_key(h))
            .collect();
        for handle in &self.insertion {
            if !order.contains(handle) {
                order.push(*handle);
            }
        }
        order
    }

    fn require_editable(&self, operation: &'static str) -> Result<()> {
        match self.state {
            PipelineState::Assembled | PipelineState::Stopped => Ok(()),
            PipelineState::Connected | PipelineState::Running => Err(self.state_error(operation)),
        }
    }

    fn invalidate_graph(&mut self) {
        self.topo.clear();
        self.consumers.clear();
        self.state = PipelineState::Assembled;
    }

    fn labels_of(&self, handles: &[StageHandle]) -> Result<Vec<String>> {
        handles
            .iter()
            .map(|h| Ok(self.entry(*h)?.label().to_string()))
            .collect()
    }
}

impl Entity for Pipeline {
    fn label(&self) -> &str {
        &self.label
    }

    /// A pipeline has no upstream of its own.
    fn inputs(&self) -> &[InputRef] {
        &[]
    }

    fn state(&self) -> EntityState {
        match self.state {
            PipelineState::Assembled => EntityState::Registered,
            PipelineState::Connected | PipelineState::Running => EntityState::Connected,
            PipelineState::Stopped => EntityState::Disconnected,
        }
    }

    /// Stages resolve through the pipeline's own registry; `registry` is unused.
    fn connect(&mut self, _registry: &LabelRegistry) -> Result<()> {
        Pipeline::connect(self)
    }

    fn disconnect(&mut self) {
        self.stop();
    }
}

fn upstream_labels(inputs: &[InputRef]) -> Vec<String> {
    inputs.iter().map(|input| input.label().to_string()).collect()
}

fn dead_handle(handle: StageHandle) -> PipelineError {
    PipelineError::Resource(format!("{} is not live", handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::{ElementType, FrameShape};

    fn split_merge() -> Vec<StageSpec> {
        vec![
            StageSpec::new("Source", "src"),
            StageSpec::new("Split", "s").with_inputs(["src"]),
            StageSpec::new("Merge", "m").with_inputs(["s.0", "s.1", "s.2"]),
        ]
    }

    #[test]
    fn test_new_registers_every_stage() {
        let pipeline = Pipeline::new("p", split_merge()).unwrap();
        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.state(), PipelineState::Assembled);
        assert_eq!(pipeline.registry().labels(), vec!["m", "s", "src"]);
        assert_eq!(pipeline.source_labels(), vec!["src"]);
        assert_eq!(pipeline.terminal_labels(), vec!["m"]);
    }

    #[test]
    fn test_duplicate_label_rejects_batch() {
        let specs = vec![StageSpec::new("Source", "a"), StageSpec::new("Source", "a")];
        let err = Pipeline::new("p", specs).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateLabel(ref l) if l == "a"));
    }

    #[test]
    fn test_unknown_type_rejected_at_construction() {
        let specs = vec![StageSpec::new("Blur", "b")];
        let err = Pipeline::new("p", specs).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStageType(_)));
    }

    #[test]
    fn test_connect_orders_and_connects() {
        let mut pipeline = Pipeline::new("p", split_merge()).unwrap();
        pipeline.connect().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Connected);
        assert_eq!(pipeline.topological_order().unwrap(), vec!["src", "s", "m"]);
        assert!(pipeline.stages().all(|s| s.is_connected()));

        // Second connect is a no-op.
        pipeline.connect().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Connected);
    }

    #[test]
    fn test_unknown_input_label_fails_connect() {
        let specs = vec![StageSpec::new("Crop", "c").with_inputs(["nowhere"])];
        let mut pipeline = Pipeline::new("p", specs).unwrap();
        let err = pipeline.connect().unwrap_err();
        assert!(matches!(err, PipelineError::UnknownLabel(ref l) if l == "nowhere"));
        assert_eq!(pipeline.state(), PipelineState::Assembled);
    }

    #[test]
    fn test_failed_stage_rolls_back() {
        let specs = vec![
            StageSpec::new("Source", "src"),
            StageSpec::new("Cast", "bad")
                .with_parameter("target_type", "int128")
                .with_inputs(["src"]),
        ];
        let mut pipeline = Pipeline::new("p", specs).unwrap();
        let err = pipeline.connect().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { .. }));
        assert_eq!(pipeline.state(), PipelineState::Assembled);
        assert!(pipeline.stages().all(|s| !s.is_connected()));
        assert_eq!(pipeline.stage("src").unwrap().state(), EntityState::Disconnected);
        assert_eq!(pipeline.stage("bad").unwrap().state(), EntityState::Registered);
    }

    #[test]
    fn test_output_index_past_declared_split_width() {
        let specs = vec![
            StageSpec::new("Source", "src"),
            StageSpec::new("Split", "s")
                .with_parameter("channels", 2i64)
                .with_inputs(["src"]),
            StageSpec::new("Crop", "c")
                .with_parameter("width", 1i64)
                .with_parameter("height", 1i64)
                .with_inputs(["s.2"]),
        ];
        let mut pipeline = Pipeline::new("p", specs).unwrap();
        let err = pipeline.connect().unwrap_err();
        assert!(matches!(err, PipelineError::ArityMismatch { found: 2, .. }));
        assert!(pipeline.stages().all(|s| s.state() == EntityState::Registered));
    }

    #[test]
    fn test_stop_disconnects_and_is_idempotent() {
        let mut pipeline = Pipeline::new("p", split_merge()).unwrap();
        pipeline.connect().unwrap();
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(pipeline
            .stages()
            .all(|s| s.state() == EntityState::Disconnected));

        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);

        pipeline.connect().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Connected);
    }

    #[test]
    fn test_edits_require_assembled_or_stopped() {
        let mut pipeline = Pipeline::new("p", split_merge()).unwrap();
        pipeline.connect().unwrap();
        let err = pipeline
            .add_stage(StageSpec::new("Source", "extra"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState { .. }));

        pipeline.stop();
        let clear = StageSpec::new("ClearChannel", "c")
            .with_parameter("channel", 0i64)
            .with_inputs(["m"]);
        pipeline.add_stage(clear).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Assembled);
        assert_eq!(pipeline.terminal_labels(), vec!["c"]);

        let err = pipeline.remove_stage("m").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DanglingReference { ref referenced_by, .. } if referenced_by == "c"
        ));
        let removed = pipeline.remove_stage("c").unwrap();
        assert_eq!(removed.label(), "c");
        assert!(!pipeline.registry().contains("c"));
    }

    #[test]
    fn test_feed_requires_a_source() {
        let mut pipeline = Pipeline::new("p", split_merge()).unwrap();
        let frame = Frame::zeroed(FrameShape::new(1, 1, 1), ElementType::U8).unwrap();
        pipeline.feed("src", frame.clone()).unwrap();
        let err = pipeline.feed("s", frame).unwrap_err();
        assert!(matches!(err, PipelineError::NotASource(_)));
    }

    #[test]
    fn test_pipeline_entity_state() {
        let mut pipeline = Pipeline::new("p", split_merge()).unwrap();
        assert_eq!(Entity::state(&pipeline), EntityState::Registered);
        Entity::connect(&mut pipeline, &LabelRegistry::new()).unwrap();
        assert!(pipeline.is_connected());
        Entity::disconnect(&mut pipeline);
        assert_eq!(Entity::state(&pipeline), EntityState::Disconnected);
        assert!(pipeline.inputs().is_empty());
    }

    #[test]
    fn test_dot_export() {
        let pipeline = Pipeline::new("p", split_merge()).unwrap();
        let dot = pipeline.to_dot().unwrap();
        assert!(dot.contains("digraph"));
        assert!(dot.contains("\"m\""));
    }
}
