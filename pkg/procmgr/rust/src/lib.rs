// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Live reconfiguration for the Datadog process manager.
//!
//! A [`Controller`] loads a configuration source, merges it onto the last
//! accepted configuration, validates the result and reconciles the entity tree
//! of applications, groups and processes against it. Lifecycle commands go to
//! a [`Supervisor`] over a one-way queue.

pub mod application;
pub mod command;
pub mod config;
pub mod controller;
pub mod fault;
pub mod group;
pub mod loader;
pub mod process;
pub mod reconcile;
pub mod state;
pub mod supervisor;
pub mod validate;

pub use application::{Application, EntityTree};
pub use command::{CommandQueue, CommandReceiver, Envelope, channel};
pub use config::{AppConfig, ConfigTree, GroupConfig, ProcessConfig, merge};
pub use controller::{Controller, LoadResult, ReloadError};
pub use group::Group;
pub use process::Process;
pub use reconcile::{ReconcileReport, ReconciliationEngine};
pub use state::ProcessState;
pub use supervisor::Supervisor;
pub use validate::{TreeValidator, ValidationError, Validator};
