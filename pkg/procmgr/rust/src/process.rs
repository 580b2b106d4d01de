// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::ProcessConfig;
use crate::state::ProcessState;
use log::{debug, info, warn};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(Uuid);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Runtime {
    state: ProcessState,
    pid: Option<u32>,
    // Guarded with the state so that retiring and starting cannot interleave.
    retired: bool,
}

/// A supervised process.
///
/// Shared between the entity tree and the supervisor as `Arc<Process>`; the
/// allocation is the process identity and survives reloads that keep its name.
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    app: String,
    name: String,
    config: Mutex<ProcessConfig>,
    runtime: Mutex<Runtime>,
}

// Every guarded value is replaced wholesale, so a poisoned lock still holds a
// consistent value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Process {
    pub fn new(app: impl Into<String>, name: impl Into<String>, config: ProcessConfig) -> Self {
        Self {
            id: ProcessId(Uuid::new_v4()),
            app: app.into(),
            name: name.into(),
            config: Mutex::new(config),
            runtime: Mutex::new(Runtime::default()),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.app, self.name)
    }

    pub fn config(&self) -> ProcessConfig {
        lock(&self.config).clone()
    }

    /// Replace the config in place. A running child keeps its current
    /// command line until it is started again.
    pub fn update_config(&self, config: ProcessConfig) {
        *lock(&self.config) = config;
    }

    pub fn state(&self) -> ProcessState {
        lock(&self.runtime).state
    }

    pub fn pid(&self) -> Option<u32> {
        lock(&self.runtime).pid
    }

    pub fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    /// Record a state change observed by the supervisor. Invalid transitions
    /// are logged and ignored, and a retired process can no longer become
    /// `Running`.
    pub fn transition(&self, next: ProcessState, pid: Option<u32>) -> bool {
        let mut runtime = lock(&self.runtime);
        if runtime.retired && next == ProcessState::Running {
            debug!("[{}] retired, refusing to run", self.qualified_name());
            return false;
        }
        if !runtime.state.can_transition_to(next) {
            warn!(
                "[{}] ignoring invalid transition {} -> {next}",
                self.qualified_name(),
                runtime.state
            );
            return false;
        }
        runtime.state = next;
        runtime.pid = pid;
        true
    }

    /// Whether the process has been dropped from the entity tree.
    pub fn is_retired(&self) -> bool {
        lock(&self.runtime).retired
    }

    /// Mark the process as dropped from the tree. Returns whether it was
    /// running at that moment.
    pub(crate) fn retire(&self) -> bool {
        let mut runtime = lock(&self.runtime);
        runtime.retired = true;
        runtime.state.is_alive()
    }

    /// Check `auto_start` and `condition_path_exists`.
    pub fn should_start(&self) -> bool {
        let config = lock(&self.config);
        if !config.auto_start {
            info!("[{}] auto_start=false, skipping", self.qualified_name());
            return false;
        }
        if let Some(ref path) = config.condition_path_exists
            && !std::path::Path::new(path).exists()
        {
            info!(
                "[{}] condition_path_exists not met: {path}",
                self.qualified_name()
            );
            return false;
        }
        true
    }
}
