// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! One-way commands from reconciliation to the supervisor.
//!
//! Sending never waits for the command to be carried out. All commands share
//! one FIFO channel, so commands for the same process arrive in issue order.

use crate::group::Group;
use crate::process::Process;
use log::warn;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessCommand {
    /// Start supervising a newly created process.
    Monitor,
    /// Stop the process and forget it.
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCommand {
    Remove,
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessCommand::Monitor => write!(f, "monitor"),
            ProcessCommand::Remove => write!(f, "remove"),
        }
    }
}

impl fmt::Display for GroupCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupCommand::Remove => write!(f, "remove"),
        }
    }
}

#[derive(Debug)]
pub enum Envelope {
    Process {
        process: Arc<Process>,
        command: ProcessCommand,
    },
    /// An orphaned group travels by value: once removed it belongs to the
    /// supervisor.
    Group { group: Group, command: GroupCommand },
}

impl Envelope {
    pub fn process(process: &Arc<Process>, command: ProcessCommand) -> Self {
        Envelope::Process {
            process: Arc::clone(process),
            command,
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Process { process, command } => {
                write!(f, "{command} process {}", process.qualified_name())
            }
            Envelope::Group { group, command } => write!(f, "{command} group {}", group.name()),
        }
    }
}

pub type CommandReceiver = mpsc::UnboundedReceiver<Envelope>;

#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<Envelope>,
}

pub fn channel() -> (CommandQueue, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandQueue { tx }, rx)
}

impl CommandQueue {
    /// Enqueue without waiting. A closed queue only means the supervisor is
    /// gone; the command is dropped.
    pub fn send(&self, envelope: Envelope) {
        if let Err(mpsc::error::SendError(envelope)) = self.tx.send(envelope) {
            warn!("command queue closed, dropping: {envelope}");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
