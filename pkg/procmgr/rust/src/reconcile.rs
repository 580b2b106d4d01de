// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Bring the entity tree in line with a merged configuration tree.
//!
//! Applications are always rebuilt. Groups and processes are looked up by name
//! in per-application scratch maps and reused when found; whatever is left in
//! the maps after the walk is orphaned and torn down.
//!
//! A pass runs in two phases. Staging works on a copy of the tree and only
//! records config updates and commands. Commit swaps the staged tree in, then
//! applies the updates and sends the commands. Nothing is visible to the
//! supervisor until staging has finished.

use crate::application::{Application, EntityTree};
use crate::command::{CommandQueue, Envelope, GroupCommand, ProcessCommand};
use crate::config::{AppConfig, ConfigTree, GroupConfig, ProcessConfig};
use crate::group::Group;
use crate::process::Process;
use indexmap::IndexMap;
use log::debug;
use std::fmt;
use std::sync::Arc;

#[cfg(test)]
thread_local! {
    /// Name of an application whose staging panics, to exercise failure
    /// isolation.
    pub(crate) static FAIL_ON_APP: std::cell::RefCell<Option<String>> =
        const { std::cell::RefCell::new(None) };
}

/// Counts of what a reconcile pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub applications: usize,
    pub groups_created: usize,
    pub groups_reused: usize,
    pub groups_removed: usize,
    pub processes_created: usize,
    pub processes_reused: usize,
    /// Orphans that were alive and got a `remove` command.
    pub processes_removed: usize,
    /// Orphans that were not alive and were dropped without a command.
    pub processes_dropped: usize,
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} application(s); groups: {} created, {} reused, {} removed; \
             processes: {} created, {} reused, {} removed, {} dropped",
            self.applications,
            self.groups_created,
            self.groups_reused,
            self.groups_removed,
            self.processes_created,
            self.processes_reused,
            self.processes_removed,
            self.processes_dropped,
        )
    }
}

pub struct ReconciliationEngine {
    tree: EntityTree,
    queue: CommandQueue,
}

/// Prior children of one application, keyed by name. Entries are taken out
/// as they are reused; the rest are orphans.
#[derive(Default)]
struct Scratch {
    groups: IndexMap<String, Group>,
    processes: IndexMap<String, Arc<Process>>,
}

/// A process leaving the tree, and whether staging already queued its
/// `remove`.
struct Orphan {
    process: Arc<Process>,
    remove_queued: bool,
}

struct Staged {
    tree: EntityTree,
    config_updates: Vec<(Arc<Process>, ProcessConfig)>,
    retired: Vec<Orphan>,
    outbox: Vec<Envelope>,
    report: ReconcileReport,
}

impl ReconciliationEngine {
    pub fn new(queue: CommandQueue) -> Self {
        Self {
            tree: EntityTree::new(),
            queue,
        }
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    /// Reconcile every application of `merged`, in its order. Applications in
    /// the live tree that `merged` does not mention are left alone.
    pub fn reconcile(&mut self, merged: &ConfigTree) -> ReconcileReport {
        let mut staged = Staged::new(self.tree.clone());
        for (name, config) in merged.iter() {
            staged.application(name, config);
        }
        self.commit(staged)
    }

    fn commit(&mut self, staged: Staged) -> ReconcileReport {
        let Staged {
            tree,
            config_updates,
            retired,
            mut outbox,
            mut report,
        } = staged;

        let superseded = std::mem::replace(&mut self.tree, tree);
        for (process, config) in config_updates {
            process.update_config(config);
        }
        for orphan in &retired {
            // A queued monitor may have started the process after staging
            // saw it idle. Once retired it cannot start again.
            if orphan.process.retire() && !orphan.remove_queued {
                debug!(
                    "[{}] started while being dropped, remove",
                    orphan.process.qualified_name()
                );
                outbox.push(Envelope::process(&orphan.process, ProcessCommand::Remove));
                report.processes_dropped -= 1;
                report.processes_removed += 1;
            }
        }
        for envelope in outbox {
            self.queue.send(envelope);
        }

        drop(superseded);
        drop(retired);
        self.tree.reclaim();
        report
    }
}

impl Staged {
    fn new(tree: EntityTree) -> Self {
        Self {
            tree,
            config_updates: Vec::new(),
            retired: Vec::new(),
            outbox: Vec::new(),
            report: ReconcileReport::default(),
        }
    }

    fn application(&mut self, name: &str, config: &AppConfig) {
        #[cfg(test)]
        FAIL_ON_APP.with(|fail| {
            if fail.borrow().as_deref() == Some(name) {
                panic!("staging failed on {name}");
            }
        });

        let mut scratch = Scratch::default();
        match self.tree.detach(name) {
            Some(previous) => {
                debug!("update app {name}");
                for group in previous.into_groups() {
                    for process in group.processes() {
                        scratch
                            .processes
                            .insert(process.name().to_string(), Arc::clone(process));
                    }
                    scratch.groups.insert(group.name().to_string(), group);
                }
            }
            None => debug!("create app {name}"),
        }

        let mut app = Application::new(name, config.clone());
        for (group_name, group_config) in &config.groups {
            let group = self.group(name, group_name, group_config, &mut scratch);
            app.add_group(group);
        }
        self.tree.insert(app);
        self.report.applications += 1;

        for (_, mut group) in scratch.groups {
            debug!("remove group {name}:{}", group.name());
            group.clear();
            self.report.groups_removed += 1;
            self.outbox.push(Envelope::Group {
                group,
                command: GroupCommand::Remove,
            });
        }
        for (_, process) in scratch.processes {
            let remove_queued = process.is_alive();
            if remove_queued {
                debug!("[{}] remove", process.qualified_name());
                self.outbox
                    .push(Envelope::process(&process, ProcessCommand::Remove));
                self.report.processes_removed += 1;
            } else {
                debug!(
                    "[{}] drop ({}, nothing to stop)",
                    process.qualified_name(),
                    process.state()
                );
                self.report.processes_dropped += 1;
            }
            self.retired.push(Orphan {
                process,
                remove_queued,
            });
        }
    }

    fn group(
        &mut self,
        app: &str,
        name: &str,
        config: &GroupConfig,
        scratch: &mut Scratch,
    ) -> Group {
        let mut group = match scratch.groups.shift_remove(name) {
            Some(mut group) => {
                debug!("update group {app}:{name}");
                group.update_config(config.clone());
                group.clear();
                self.report.groups_reused += 1;
                group
            }
            None => {
                debug!("create group {app}:{name}");
                self.report.groups_created += 1;
                Group::new(name, config.clone())
            }
        };

        for (process_name, process_config) in &config.processes {
            let process = self.process(app, process_name, process_config, scratch);
            group.add_process(process);
        }
        group
    }

    fn process(
        &mut self,
        app: &str,
        name: &str,
        config: &ProcessConfig,
        scratch: &mut Scratch,
    ) -> Arc<Process> {
        match scratch.processes.shift_remove(name) {
            Some(process) => {
                debug!("[{app}:{name}] update");
                self.config_updates
                    .push((Arc::clone(&process), config.clone()));
                self.report.processes_reused += 1;
                process
            }
            None => {
                debug!("[{app}:{name}] create");
                let process = Arc::new(Process::new(app, name, config.clone()));
                self.outbox
                    .push(Envelope::process(&process, ProcessCommand::Monitor));
                self.report.processes_created += 1;
                process
            }
        }
    }
}
