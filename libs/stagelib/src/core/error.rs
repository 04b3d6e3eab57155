// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

use crate::core::frames::ElementType;

/// Broad class of a [`PipelineError`].
///
/// Configuration errors are fatal to the build/connect attempt that raised
/// them. Data errors are raised per frame and go through the configured
/// [`DataErrorPolicy`](crate::core::DataErrorPolicy). Resource errors are
/// defects and are reported, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Data,
    Resource,
    /// Operation invoked in a lifecycle state that does not allow it.
    Lifecycle,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Duplicate label: '{0}'")]
    DuplicateLabel(String),

    #[error("Unknown label: '{0}'")]
    UnknownLabel(String),

    #[error("Invalid label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("Unknown stage type: '{0}'")]
    UnknownStageType(String),

    #[error("Cycle detected involving stage '{0}'")]
    CycleDetected(String),

    #[error("Label '{label}' is still referenced by '{referenced_by}'")]
    DanglingReference {
        label: String,
        referenced_by: String,
    },

    #[error("Shape mismatch in '{stage}': {reason}")]
    ShapeMismatch { stage: String, reason: String },

    #[error("Type mismatch in '{stage}': expected {expected}, found {found}")]
    TypeMismatch {
        stage: String,
        expected: ElementType,
        found: ElementType,
    },

    #[error("Arity mismatch in '{stage}': expected {expected}, found {found}")]
    ArityMismatch {
        stage: String,
        expected: String,
        found: usize,
    },

    #[error("Out of bounds in '{stage}': {reason}")]
    OutOfBounds { stage: String, reason: String },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid parameter '{parameter}' for '{stage}': {reason}")]
    InvalidParameter {
        stage: String,
        parameter: String,
        reason: String,
    },

    #[error("Cannot {operation} '{entity}' in state {state}")]
    InvalidState {
        entity: String,
        operation: &'static str,
        state: String,
    },

    #[error("Stage '{0}' is not a source")]
    NotASource(String),

    #[error("Invalid pipeline definition: {0}")]
    Definition(String),

    #[error("Source '{stage}' failed: {reason}")]
    SourceFailed { stage: String, reason: String },

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateLabel(_)
            | Self::UnknownLabel(_)
            | Self::InvalidLabel { .. }
            | Self::UnknownStageType(_)
            | Self::CycleDetected(_)
            | Self::DanglingReference { .. }
            | Self::InvalidParameter { .. }
            | Self::NotASource(_)
            | Self::Definition(_)
            | Self::Io(_) => ErrorCategory::Configuration,
            Self::ShapeMismatch { .. }
            | Self::TypeMismatch { .. }
            | Self::ArityMismatch { .. }
            | Self::OutOfBounds { .. }
            | Self::InvalidFrame(_)
            | Self::SourceFailed { .. } => ErrorCategory::Data,
            Self::Resource(_) | Self::Other(_) => ErrorCategory::Resource,
            Self::InvalidState { .. } => ErrorCategory::Lifecycle,
        }
    }

    pub fn is_data_error(&self) -> bool {
        self.category() == ErrorCategory::Data
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
