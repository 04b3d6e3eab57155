// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Label registry.
//!
//! Maps each label to the handle of the entity that owns it and remembers
//! which labels that entity reads from, so a label can't be freed while
//! something still points at it. All access goes through one lock, so a
//! connect running next to an unregister never sees a half-applied change.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::core::error::{PipelineError, Result};

/// Opaque identity of a registered entity.
///
/// Ids are never reused within a registry, so a handle that outlives its
/// entity fails [`LabelRegistry::is_live`] instead of aliasing a newcomer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageHandle(u64);

impl StageHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage#{}", self.0)
    }
}

/// Reject labels that can't be used as wiring addresses.
///
/// `.` is reserved for output selection (`split.2`).
pub fn validate_label(label: &str) -> Result<()> {
    let reason = if label.is_empty() {
        "label must not be empty"
    } else if label.contains('.') {
        "'.' is reserved for output selection"
    } else if label.chars().any(char::is_whitespace) {
        "label must not contain whitespace"
    } else {
        return Ok(());
    };
    Err(PipelineError::InvalidLabel {
        label: label.to_string(),
        reason: reason.to_string(),
    })
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    handle: StageHandle,
    upstream: Vec<String>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: HashMap<String, RegistryEntry>,
    next_id: u64,
}

impl RegistryInner {
    fn allocate(&mut self) -> StageHandle {
        let handle = StageHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    fn first_referrer(&self, label: &str) -> Option<&str> {
        let mut referrers: Vec<&str> = self
            .entries
            .iter()
            .filter(|(owner, entry)| {
                owner.as_str() != label && entry.upstream.iter().any(|u| u == label)
            })
            .map(|(owner, _)| owner.as_str())
            .collect();
        referrers.sort_unstable();
        referrers.first().copied()
    }
}

#[derive(Debug, Default)]
pub struct LabelRegistry {
    inner: RwLock<RegistryInner>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `label`. `upstream` lists the labels the new entity reads from.
    pub fn register(&self, label: &str, upstream: &[String]) -> Result<StageHandle> {
        validate_label(label)?;
        let mut inner = self.inner.write();
        if inner.entries.contains_key(label) {
            return Err(PipelineError::DuplicateLabel(label.to_string()));
        }
        let handle = inner.allocate();
        inner.entries.insert(
            label.to_string(),
            RegistryEntry {
                handle,
                upstream: upstream.to_vec(),
            },
        );
        tracing::debug!("Registered '{}' as {}", label, handle);
        Ok(handle)
    }

    /// Reserve several labels at once. Either every label is registered or none is.
    pub fn register_batch(&self, items: &[(String, Vec<String>)]) -> Result<Vec<StageHandle>> {
        let mut inner = self.inner.write();

        let mut seen = std::collections::HashSet::new();
        for (label, _) in items {
            validate_label(label)?;
            if inner.entries.contains_key(label) || !seen.insert(label.as_str()) {
                return Err(PipelineError::DuplicateLabel(label.clone()));
            }
        }

        let handles = items
            .iter()
            .map(|(label, upstream)| {
                let handle = inner.allocate();
                inner.entries.insert(
                    label.clone(),
                    RegistryEntry {
                        handle,
                        upstream: upstream.clone(),
                    },
                );
                handle
            })
            .collect();
        tracing::debug!("Registered batch of {} labels", items.len());
        Ok(handles)
    }

    pub fn resolve(&self, label: &str) -> Result<StageHandle> {
        self.try_resolve(label)
            .ok_or_else(|| PipelineError::UnknownLabel(label.to_string()))
    }

    pub fn try_resolve(&self, label: &str) -> Option<StageHandle> {
        self.inner.read().entries.get(label).map(|e| e.handle)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.inner.read().entries.contains_key(label)
    }

    /// Liveness check for a previously resolved handle.
    pub fn is_live(&self, handle: StageHandle) -> bool {
        self.inner
            .read()
            .entries
            .values()
            .any(|e| e.handle == handle)
    }

    pub fn label_of(&self, handle: StageHandle) -> Option<String> {
        self.inner
            .read()
            .entries
            .iter()
            .find(|(_, e)| e.handle == handle)
            .map(|(label, _)| label.clone())
    }

    /// Labels of other registered entities that read from `label`, sorted.
    pub fn referrers(&self, label: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut referrers: Vec<String> = inner
            .entries
            .iter()
            .filter(|(owner, entry)| {
                owner.as_str() != label && entry.upstream.iter().any(|u| u == label)
            })
            .map(|(owner, _)| owner.clone())
            .collect();
        referrers.sort();
        referrers
    }

    /// Free `label`. Fails while any other registered entity still lists it.
    pub fn unregister(&self, label: &str) -> Result<StageHandle> {
        let mut inner = self.inner.write();
        if !inner.entries.contains_key(label) {
            return Err(PipelineError::UnknownLabel(label.to_string()));
        }
        if let Some(referrer) = inner.first_referrer(label) {
            return Err(PipelineError::DanglingReference {
                label: label.to_string(),
                referenced_by: referrer.to_string(),
            });
        }
        let entry = inner
            .entries
            .remove(label)
            .ok_or_else(|| PipelineError::UnknownLabel(label.to_string()))?;
        tracing::debug!("Unregistered '{}' ({})", label, entry.handle);
        Ok(entry.handle)
    }

    /// All registered labels, sorted.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.inner.read().entries.keys().cloned().collect();
        labels.sort();
        labels
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}
