// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::{ConfigTree, ProcessConfig};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Every problem found in a tree, in the order they were encountered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {}", .problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

pub trait Validator: Send {
    fn validate(&self, tree: &ConfigTree) -> Result<(), ValidationError>;
}

/// Structural rules every merged tree must satisfy before it is reconciled.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeValidator;

impl Validator for TreeValidator {
    fn validate(&self, tree: &ConfigTree) -> Result<(), ValidationError> {
        validate(tree)
    }
}

pub fn validate(tree: &ConfigTree) -> Result<(), ValidationError> {
    let mut problems = Vec::new();
    let mut pidfiles: HashMap<&str, String> = HashMap::new();

    for (app_name, app) in tree.iter() {
        check_name(&mut problems, "application", app_name, app_name);

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for group_name in app.groups.keys() {
            let qualified = format!("{app_name}:{group_name}");
            check_name(&mut problems, "group", group_name, &qualified);
        }
        for (group_name, name, process) in app.processes() {
            let qualified = format!("{app_name}:{name}");
            check_name(&mut problems, "process", name, &qualified);
            check_process(&mut problems, &qualified, process);

            if let Some(first) = owners.insert(name, group_name) {
                problems.push(format!(
                    "process '{qualified}' is declared in both group '{first}' and group '{group_name}'"
                ));
            }
            if let Some(pidfile) = process.pidfile.as_deref()
                && let Some(other) = pidfiles.insert(pidfile, qualified.clone())
            {
                problems.push(format!(
                    "pidfile '{pidfile}' is shared by '{other}' and '{qualified}'"
                ));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { problems })
    }
}

fn check_name(problems: &mut Vec<String>, kind: &str, name: &str, qualified: &str) {
    if name.is_empty() {
        problems.push(format!("{kind} name must not be empty ('{qualified}')"));
    } else if name.chars().any(char::is_whitespace) {
        problems.push(format!("{kind} name '{qualified}' contains whitespace"));
    }
}

fn check_process(problems: &mut Vec<String>, qualified: &str, cfg: &ProcessConfig) {
    if cfg.command.trim().is_empty() {
        problems.push(format!("[{qualified}] command must not be empty"));
    }
    for (field, value) in [("working_dir", &cfg.working_dir), ("pidfile", &cfg.pidfile)] {
        if let Some(path) = value
            && !Path::new(path).is_absolute()
        {
            problems.push(format!("[{qualified}] {field} must be absolute: {path}"));
        }
    }
    if cfg.stop_timeout == Some(0) {
        problems.push(format!("[{qualified}] stop_timeout must be greater than 0"));
    }
}
