// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Raw configuration tree: applications own groups, groups own processes.
//!
//! Maps keep document order so that reconciliation walks them in the order
//! they were written.

use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::BTreeMap;

fn default_true() -> bool {
    true
}

fn default_inherit() -> String {
    "inherit".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    #[serde(default)]
    pub description: Option<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<String>,
    pub pidfile: Option<String>,
    #[serde(default = "default_inherit")]
    pub stdout: String,
    #[serde(default = "default_inherit")]
    pub stderr: String,
    #[serde(default = "default_true")]
    pub auto_start: bool,
    pub condition_path_exists: Option<String>,
    /// Seconds to wait after SIGTERM before escalating to SIGKILL.
    pub stop_timeout: Option<u64>,
}

impl ProcessConfig {
    /// A config with every optional setting at its default.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            description: None,
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            pidfile: None,
            stdout: default_inherit(),
            stderr: default_inherit(),
            auto_start: true,
            condition_path_exists: None,
            stop_timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub processes: IndexMap<String, ProcessConfig>,
}

impl GroupConfig {
    pub fn with_process(mut self, name: impl Into<String>, config: ProcessConfig) -> Self {
        self.processes.insert(name.into(), config);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub groups: IndexMap<String, GroupConfig>,
}

impl AppConfig {
    pub fn with_group(mut self, name: impl Into<String>, config: GroupConfig) -> Self {
        self.groups.insert(name.into(), config);
        self
    }

    /// Iterate `(group, process, config)` over every process of the application.
    pub fn processes(&self) -> impl Iterator<Item = (&str, &str, &ProcessConfig)> {
        self.groups.iter().flat_map(|(group, cfg)| {
            cfg.processes
                .iter()
                .map(move |(name, process)| (group.as_str(), name.as_str(), process))
        })
    }
}

/// Application name to application config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree {
    applications: IndexMap<String, AppConfig>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an application. A repeated name overwrites the
    /// previous entry in place.
    pub fn insert(&mut self, name: impl Into<String>, config: AppConfig) {
        self.applications.insert(name.into(), config);
    }

    pub fn with_app(mut self, name: impl Into<String>, config: AppConfig) -> Self {
        self.insert(name, config);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AppConfig> {
        self.applications.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AppConfig)> {
        self.applications
            .iter()
            .map(|(name, config)| (name.as_str(), config))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.applications.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

/// Combine the accepted baseline with a newly parsed tree.
///
/// The merge is shallow: an application present in `new` replaces the whole
/// entry from `old`, groups and processes included. Applications only present
/// in `old` are carried over unchanged.
pub fn merge(old: &ConfigTree, new: ConfigTree) -> ConfigTree {
    let mut merged = old.clone();
    for (name, config) in new.applications {
        merged.applications.insert(name, config);
    }
    merged
}
