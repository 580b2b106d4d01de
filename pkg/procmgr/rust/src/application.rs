// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::AppConfig;
use crate::group::Group;
use crate::process::Process;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApplicationId(Uuid);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Namespace for groups. Holds no runtime state and is rebuilt on every reload.
#[derive(Debug, Clone)]
pub struct Application {
    id: ApplicationId,
    name: String,
    config: AppConfig,
    groups: Vec<Group>,
}

impl Application {
    pub fn new(name: impl Into<String>, config: AppConfig) -> Self {
        Self {
            id: ApplicationId(Uuid::new_v4()),
            name: name.into(),
            config,
            groups: Vec::new(),
        }
    }

    pub fn id(&self) -> ApplicationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Attach a group, replacing any group with the same name.
    pub fn add_group(&mut self, group: Group) {
        match self.groups.iter_mut().find(|g| g.name() == group.name()) {
            Some(slot) => *slot = group,
            None => self.groups.push(group),
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn into_groups(self) -> Vec<Group> {
        self.groups
    }

    pub fn processes(&self) -> impl Iterator<Item = &Arc<Process>> {
        self.groups.iter().flat_map(|g| g.processes())
    }

    pub fn process(&self, name: &str) -> Option<&Arc<Process>> {
        self.processes().find(|p| p.name() == name)
    }
}

/// The live supervised hierarchy.
#[derive(Debug, Clone, Default)]
pub struct EntityTree {
    applications: Vec<Application>,
}

impl EntityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn application(&self, name: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.name() == name)
    }

    /// Look up a process by application and process name.
    pub fn process(&self, app: &str, name: &str) -> Option<&Arc<Process>> {
        self.application(app)?.process(name)
    }

    pub fn processes(&self) -> impl Iterator<Item = &Arc<Process>> {
        self.applications.iter().flat_map(Application::processes)
    }

    /// Add an application, replacing any application with the same name.
    pub fn insert(&mut self, app: Application) {
        match self
            .applications
            .iter_mut()
            .find(|a| a.name() == app.name())
        {
            Some(slot) => *slot = app,
            None => self.applications.push(app),
        }
    }

    /// Remove an application from the tree and hand it to the caller.
    pub fn detach(&mut self, name: &str) -> Option<Application> {
        let pos = self.applications.iter().position(|a| a.name() == name)?;
        Some(self.applications.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Release capacity left over from applications that were dropped.
    pub(crate) fn reclaim(&mut self) {
        self.applications.shrink_to_fit();
    }
}
