// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::GroupConfig;
use crate::process::Process;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(Uuid);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named set of processes inside an application. Its id is kept when a
/// reload reuses the group.
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    name: String,
    config: GroupConfig,
    processes: Vec<Arc<Process>>,
}

impl Group {
    pub fn new(name: impl Into<String>, config: GroupConfig) -> Self {
        Self {
            id: GroupId(Uuid::new_v4()),
            name: name.into(),
            config,
            processes: Vec::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: GroupConfig) {
        self.config = config;
    }

    /// Detach every owned process. The processes themselves are untouched.
    pub fn clear(&mut self) {
        self.processes.clear();
    }

    /// Attach a process, replacing any process with the same name.
    pub fn add_process(&mut self, process: Arc<Process>) {
        match self
            .processes
            .iter_mut()
            .find(|p| p.name() == process.name())
        {
            Some(slot) => *slot = process,
            None => self.processes.push(process),
        }
    }

    pub fn processes(&self) -> &[Arc<Process>] {
        &self.processes
    }

    pub fn process(&self, name: &str) -> Option<&Arc<Process>> {
        self.processes.iter().find(|p| p.name() == name)
    }
}
