// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Build, connect, stop and re-edit cycles of a pipeline.

use stagelib::prelude::*;
use stagelib::{PipelineState, StageKind};

fn source(label: &str) -> StageSpec {
    StageSpec::new("Source", label)
}

fn crop(label: &str, input: &str, width: i64, height: i64) -> StageSpec {
    StageSpec::new("Crop", label)
        .with_parameter("width", width)
        .with_parameter("height", height)
        .with_inputs([input])
}

fn zeros(width: u32, height: u32, channels: u32) -> Frame {
    Frame::zeroed(FrameShape::new(width, height, channels), ElementType::U8).unwrap()
}

#[test]
fn test_split_merge_round_trip_scenario() {
    let mut pipeline = Pipeline::new(
        "scenario",
        vec![
            source("src"),
            StageSpec::new("Split", "s").with_inputs(["src"]),
            StageSpec::new("Merge", "m").with_inputs(["s.0", "s.1", "s.2"]),
        ],
    )
    .unwrap();
    pipeline.connect().unwrap();

    let input = zeros(4, 4, 3);
    pipeline.feed("src", input.clone()).unwrap();
    let report = pipeline.start().unwrap();

    assert_eq!(report.cycles, 1);
    assert_eq!(report.stop_reason, StopReason::Completed);
    let output = pipeline.outputs().remove("m").flatten().unwrap();
    assert_eq!(output.shape(), FrameShape::new(4, 4, 3));
    assert_eq!(output, input);
}

#[test]
fn test_duplicate_labels_rejected_before_connect() {
    let err = Pipeline::new("dup", vec![source("a"), crop("a", "a", 1, 1)]).unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateLabel(ref l) if l == "a"));
}

#[test]
fn test_merge_shape_mismatch_leaves_output_absent() {
    let mut pipeline = Pipeline::new(
        "merge",
        vec![
            source("a"),
            source("b"),
            StageSpec::new("Merge", "m").with_inputs(["a", "b"]),
        ],
    )
    .unwrap();
    pipeline.connect().unwrap();

    pipeline.push_frame("a", zeros(4, 4, 1), 0).unwrap();
    let err = pipeline.push_frame("b", zeros(4, 5, 1), 0).unwrap_err();
    assert!(matches!(err, PipelineError::ShapeMismatch { ref stage, .. } if stage == "m"));
    assert!(pipeline.stage("m").unwrap().last_frame().is_none());
    assert_eq!(pipeline.state(), PipelineState::Connected);
}

#[test]
fn test_merge_shape_mismatch_during_run_is_fatal() {
    let mut pipeline = Pipeline::new(
        "merge",
        vec![
            source("a"),
            source("b"),
            StageSpec::new("Merge", "m").with_inputs(["a", "b"]),
        ],
    )
    .unwrap();
    pipeline.connect().unwrap();
    pipeline.feed("a", zeros(4, 4, 1)).unwrap();
    pipeline.feed("b", zeros(4, 5, 1)).unwrap();

    let err = pipeline.start().unwrap_err();
    assert_eq!(err.category(), stagelib::ErrorCategory::Data);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(pipeline.stage("m").unwrap().last_frame().is_none());
}

#[test]
fn test_out_of_bounds_crop_leaves_source_unchanged() {
    let mut pipeline =
        Pipeline::new("crop", vec![source("src"), crop("c", "src", 5, 5)]).unwrap();
    pipeline.connect().unwrap();

    let input = zeros(4, 4, 1).with_metadata(11, 0);
    let err = pipeline.push_frame("src", input.clone(), 0).unwrap_err();
    assert!(matches!(err, PipelineError::OutOfBounds { .. }));
    assert_eq!(pipeline.stage("src").unwrap().last_frame(), Some(&input));
    assert!(pipeline.stage("c").unwrap().last_frame().is_none());
}

#[test]
fn test_cycle_keeps_every_stage_registered() {
    let mut pipeline = Pipeline::new(
        "cycle",
        vec![
            source("src"),
            StageSpec::new("Merge", "a").with_inputs(["src", "b"]),
            crop("b", "a", 1, 1),
        ],
    )
    .unwrap();

    let err = pipeline.connect().unwrap_err();
    assert!(matches!(err, PipelineError::CycleDetected(_)));
    assert_eq!(pipeline.state(), PipelineState::Assembled);
    assert!(pipeline
        .stages()
        .all(|stage| stage.state() == EntityState::Registered));
}

#[test]
fn test_connect_failure_rolls_back_to_assembled() {
    let mut pipeline = Pipeline::new(
        "rollback",
        vec![
            source("src"),
            crop("ok", "src", 1, 1),
            StageSpec::new("ClearChannel", "bad")
                .with_parameter("chanel", 0i64)
                .with_inputs(["ok"]),
        ],
    )
    .unwrap();

    let err = pipeline.connect().unwrap_err();
    assert!(matches!(err, PipelineError::InvalidParameter { .. }));
    assert_eq!(pipeline.state(), PipelineState::Assembled);
    assert!(pipeline.stages().all(|stage| !stage.is_connected()));

    let err = pipeline.start().unwrap_err();
    assert!(matches!(err, PipelineError::InvalidState { .. }));
}

#[test]
fn test_arity_checked_at_connect() {
    let mut pipeline = Pipeline::new(
        "arity",
        vec![
            source("a"),
            source("b"),
            StageSpec::new("Crop", "c")
                .with_parameter("width", 1i64)
                .with_parameter("height", 1i64)
                .with_inputs(["a", "b"]),
        ],
    )
    .unwrap();
    let err = pipeline.connect().unwrap_err();
    assert!(matches!(err, PipelineError::ArityMismatch { found: 2, .. }));
}

#[test]
fn test_disconnect_twice_matches_once() {
    let mut pipeline = Pipeline::new("idem", vec![source("src"), crop("c", "src", 1, 1)]).unwrap();
    pipeline.connect().unwrap();
    pipeline.push_frame("src", zeros(2, 2, 1), 0).unwrap();

    pipeline.stop();
    let once: Vec<(String, EntityState, Option<Frame>)> = pipeline
        .stages()
        .map(|s| (s.label().to_string(), s.state(), s.last_frame().cloned()))
        .collect();
    pipeline.stop();
    let twice: Vec<(String, EntityState, Option<Frame>)> = pipeline
        .stages()
        .map(|s| (s.label().to_string(), s.state(), s.last_frame().cloned()))
        .collect();

    assert_eq!(once, twice);
    assert!(once.iter().all(|(_, state, _)| *state == EntityState::Disconnected));
    // Cached outputs survive disconnect.
    assert!(once.iter().all(|(_, _, frame)| frame.is_some()));
}

#[test]
fn test_re_edit_cycle() {
    let mut pipeline = Pipeline::new("edit", vec![source("src"), crop("c", "src", 2, 2)]).unwrap();
    pipeline.connect().unwrap();
    pipeline.stop();

    let err = pipeline.remove_stage("src").unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DanglingReference { ref label, ref referenced_by }
            if label == "src" && referenced_by == "c"
    ));

    pipeline
        .add_stage(
            StageSpec::new("Cast", "f")
                .with_parameter("target_type", "float32")
                .with_inputs(["c"]),
        )
        .unwrap();
    assert_eq!(pipeline.state(), PipelineState::Assembled);
    pipeline.connect().unwrap();
    assert_eq!(pipeline.topological_order().unwrap(), vec!["src", "c", "f"]);

    pipeline.push_frame("src", zeros(3, 3, 1), 0).unwrap();
    let out = pipeline.stage("f").unwrap().last_frame().unwrap();
    assert_eq!(out.dtype(), ElementType::F32);
    assert_eq!(out.shape(), FrameShape::new(2, 2, 1));

    pipeline.stop();
    let removed = pipeline.remove_stage("f").unwrap();
    assert_eq!(removed.kind(), StageKind::Cast);
    assert_eq!(pipeline.terminal_labels(), vec!["c"]);
}

#[test]
fn test_pipeline_is_an_entity() {
    fn connect_entity(entity: &mut dyn Entity) -> EntityState {
        entity.connect(&stagelib::LabelRegistry::new()).unwrap();
        entity.state()
    }

    let mut pipeline = Pipeline::new("entity", vec![source("src")]).unwrap();
    assert_eq!(connect_entity(&mut pipeline), EntityState::Connected);
    assert_eq!(Entity::label(&pipeline), "entity");
}
