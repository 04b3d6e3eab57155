// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Pipeline lifecycle state.
///
/// ```text
/// Assembled ──connect()──► Connected ──start()──► Running
///     ▲                        ▲  ▲                  │
///     │ add/remove_stage       │  └── run finished ──┤
///     │                        │ connect()           │ stop requested
///     └──────────────────── Stopped ◄──── stop() ────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum PipelineState {
    /// Stages constructed and registered, nothing connected.
    #[default]
    Assembled,
    /// Graph validated, every stage connected in topological order.
    Connected,
    /// Inside `start()`.
    Running,
    /// Every stage disconnected.
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Assembled => "Assembled",
            Self::Connected => "Connected",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Cloneable handle that asks a running pipeline to stop.
///
/// Safe to use from any thread. The run's [`CancellationPolicy`] decides
/// whether the in-flight frame finishes first.
///
/// [`CancellationPolicy`]: crate::core::CancellationPolicy
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stop_requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        tracing::debug!("Stop requested");
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.stop_requested.store(false, Ordering::Release);
    }
}
