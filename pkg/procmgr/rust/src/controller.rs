// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! The reload entry point.
//!
//! [`Controller::load`] runs loader, merge, validation and reconciliation
//! against the committed baseline. Every failure, panics included, comes back
//! as a [`LoadResult`]; the baseline and the entity tree only change when the
//! whole pipeline succeeds.

use crate::application::EntityTree;
use crate::command::CommandQueue;
use crate::config::{ConfigTree, merge};
use crate::fault::{self, Fault};
use crate::loader::{self, LoadError};
use crate::reconcile::{ReconcileReport, ReconciliationEngine};
use crate::validate::{TreeValidator, ValidationError, Validator};
use log::{debug, error, info};
use serde::Serialize;
use std::error::Error as _;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Outcome of a [`Controller::load`] call. Absent fields are left out of the
/// serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<Vec<String>>,
    #[serde(skip_serializing_if = "is_false")]
    pub empty: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LoadResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>, backtrace: Option<Vec<String>>) -> Self {
        Self {
            error: true,
            message: Some(message.into()),
            backtrace,
            empty: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.error
    }

    fn from_error(err: &ReloadError) -> Self {
        let chain = error_chain(err);
        let message = chain.join(": ");
        if matches!(err, ReloadError::Load(LoadError::NotFound { .. })) {
            return Self::failure(message, None);
        }
        Self::failure(message, Some(chain))
    }

    fn from_fault(fault: Fault) -> Self {
        Self::failure(fault.message, Some(fault.backtrace))
    }
}

/// Display of `err` followed by each of its sources.
fn error_chain(err: &ReloadError) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

/// Owns the accepted configuration and the live entity tree.
///
/// Callers serialize access through `&mut self`; one `load` completes before
/// the next begins.
pub struct Controller {
    baseline: ConfigTree,
    engine: ReconciliationEngine,
    validator: Box<dyn Validator>,
}

impl Controller {
    pub fn new(queue: CommandQueue) -> Self {
        Self::with_validator(queue, TreeValidator)
    }

    pub fn with_validator(queue: CommandQueue, validator: impl Validator + 'static) -> Self {
        Self {
            baseline: ConfigTree::new(),
            engine: ReconciliationEngine::new(queue),
            validator: Box::new(validator),
        }
    }

    /// The last configuration that loaded successfully.
    pub fn baseline(&self) -> &ConfigTree {
        &self.baseline
    }

    pub fn tree(&self) -> &EntityTree {
        self.engine.tree()
    }

    /// Load `source` on top of the current baseline and reconcile the result.
    pub fn load(&mut self, source: &str) -> LoadResult {
        if source.trim().is_empty() {
            debug!("empty config source, nothing to load");
            return LoadResult::empty();
        }

        match fault::capture(|| self.apply(Path::new(source))) {
            Ok(Ok(report)) => {
                info!("loaded config from {source}: {report}");
                LoadResult::success()
            }
            Ok(Err(err)) => {
                let result = LoadResult::from_error(&err);
                error!(
                    "failed to load config from {source}: {}",
                    result.message.as_deref().unwrap_or_default()
                );
                result
            }
            Err(fault) => {
                error!(
                    "unexpected fault loading config from {source}: {}",
                    fault.message
                );
                for frame in &fault.backtrace {
                    debug!("    {frame}");
                }
                LoadResult::from_fault(fault)
            }
        }
    }

    fn apply(&mut self, source: &Path) -> Result<ReconcileReport, ReloadError> {
        let parsed = loader::load_source(source)?;
        let merged = merge(&self.baseline, parsed);
        self.validator.validate(&merged)?;
        let report = self.engine.reconcile(&merged);
        // The previous baseline is dropped here, before `load` returns.
        self.baseline = merged;
        Ok(report)
    }
}
