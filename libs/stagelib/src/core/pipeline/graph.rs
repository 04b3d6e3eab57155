// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Label graph over a pipeline's stages.
//!
//! Nodes are stages, edges run producer → consumer and carry the consumer's
//! input slot. Rebuilt from the stages' `inputs` whenever it is needed, so
//! it never goes stale across add/remove edits.

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::core::entity::Entity;
use crate::core::error::{PipelineError, Result};
use crate::core::registry::StageHandle;
use crate::core::stage::Stage;

#[derive(Debug, Clone)]
pub(crate) struct StageNode {
    pub(crate) handle: StageHandle,
    pub(crate) label: String,
}

impl fmt::Display for StageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

pub(crate) struct StageGraph {
    graph: DiGraph<StageNode, usize>,
}

impl StageGraph {
    /// Build from stages in insertion order. Fails with `UnknownLabel` when
    /// an input names a label that isn't one of `stages`.
    pub(crate) fn build<'a>(
        stages: impl IntoIterator<Item = (StageHandle, &'a Stage)>,
    ) -> Result<Self> {
        let stages: Vec<(StageHandle, &Stage)> = stages.into_iter().collect();
        let mut graph = DiGraph::with_capacity(stages.len(), stages.len());
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();

        for (handle, stage) in &stages {
            let node = graph.add_node(StageNode {
                handle: *handle,
                label: stage.label().to_string(),
            });
            index.insert(stage.label(), node);
        }

        for (_, stage) in &stages {
            let consumer = index[stage.label()];
            for (slot, input) in stage.inputs().iter().enumerate() {
                let producer = *index
                    .get(input.label())
                    .ok_or_else(|| PipelineError::UnknownLabel(input.label().to_string()))?;
                graph.add_edge(producer, consumer, slot);
            }
        }

        Ok(Self { graph })
    }

    /// Producers before consumers. Fails with `CycleDetected` naming a stage on the cycle.
    pub(crate) fn topological_order(&self) -> Result<Vec<StageHandle>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            PipelineError::CycleDetected(self.graph[cycle.node_id()].label.clone())
        })?;
        Ok(sorted.into_iter().map(|idx| self.graph[idx].handle).collect())
    }

    pub(crate) fn to_dot(&self) -> String {
        use petgraph::dot::Dot;
        format!("{}", Dot::new(&self.graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StageSpec;

    fn stages(specs: &[StageSpec]) -> Vec<(StageHandle, Stage)> {
        let registry = crate::core::registry::LabelRegistry::new();
        specs
            .iter()
            .map(|spec| {
                let handle = registry.register(&spec.label, &spec.inputs).unwrap();
                (handle, Stage::from_spec(spec).unwrap())
            })
            .collect()
    }

    fn graph(stages: &[(StageHandle, Stage)]) -> Result<StageGraph> {
        StageGraph::build(stages.iter().map(|(h, s)| (*h, s)))
    }

    #[test]
    fn test_order_puts_producers_first() {
        let stages = stages(&[
            StageSpec::new("Merge", "m").with_inputs(["s.0", "s.1"]),
            StageSpec::new("Split", "s").with_inputs(["src"]),
            StageSpec::new("Source", "src"),
        ]);
        let order = graph(&stages).unwrap().topological_order().unwrap();
        assert_eq!(order.len(), 3);
        let position = |label: &str| {
            let handle = stages.iter().find(|(_, s)| s.label() == label).unwrap().0;
            order.iter().position(|h| *h == handle).unwrap()
        };
        assert!(position("src") < position("s"));
        assert!(position("s") < position("m"));
    }

    #[test]
    fn test_cycle_is_detected() {
        let stages = stages(&[
            StageSpec::new("Crop", "a").with_inputs(["b"]),
            StageSpec::new("Crop", "b").with_inputs(["a"]),
        ]);
        let err = graph(&stages).unwrap().topological_order().unwrap_err();
        assert!(matches!(err, PipelineError::CycleDetected(ref l) if l == "a" || l == "b"));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let stages = stages(&[StageSpec::new("Crop", "a").with_inputs(["a"])]);
        let err = graph(&stages).unwrap().topological_order().unwrap_err();
        assert!(matches!(err, PipelineError::CycleDetected(ref l) if l == "a"));
    }

    #[test]
    fn test_unknown_input_label() {
        let stages = stages(&[StageSpec::new("Crop", "a").with_inputs(["ghost"])]);
        let err = graph(&stages).err().unwrap();
        assert!(matches!(err, PipelineError::UnknownLabel(ref l) if l == "ghost"));
    }

    #[test]
    fn test_dot_export_names_stages() {
        let stages = stages(&[
            StageSpec::new("Source", "src"),
            StageSpec::new("Cast", "c").with_inputs(["src"]),
        ]);
        let dot = graph(&stages).unwrap().to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("src"));
        assert!(dot.contains("->"));
    }
}
