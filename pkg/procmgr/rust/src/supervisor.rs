// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Runs the OS processes behind the entity tree.
//!
//! The supervisor drains the command queue. Each started process gets a
//! watcher task that owns the child and records its exit, or stops it when
//! told to.

use crate::command::{CommandReceiver, Envelope, ProcessCommand};
use crate::process::{Process, ProcessId};
use crate::state::ProcessState;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(90);
const SIGKILL_TIMEOUT: Duration = Duration::from_secs(10);

struct Worker {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct Supervisor {
    commands: CommandReceiver,
    workers: HashMap<ProcessId, Worker>,
    stopping: Vec<JoinHandle<()>>,
}

impl Supervisor {
    pub fn new(commands: CommandReceiver) -> Self {
        Self {
            commands,
            workers: HashMap::new(),
            stopping: Vec::new(),
        }
    }

    /// Handle commands until every sender is gone, then stop what is still
    /// running.
    pub async fn run(mut self) {
        while let Some(envelope) = self.commands.recv().await {
            self.dispatch(envelope);
        }
        self.shutdown().await;
    }

    fn dispatch(&mut self, envelope: Envelope) {
        self.workers.retain(|_, worker| !worker.task.is_finished());
        self.stopping.retain(|task| !task.is_finished());

        match envelope {
            Envelope::Process {
                process,
                command: ProcessCommand::Monitor,
            } => self.monitor(process),
            Envelope::Process {
                process,
                command: ProcessCommand::Remove,
            } => self.remove(&process),
            Envelope::Group { group, command } => {
                info!("{command} group {} ({})", group.name(), group.id());
            }
        }
    }

    fn monitor(&mut self, process: Arc<Process>) {
        let name = process.qualified_name();
        if process.is_retired() {
            debug!("[{name}] retired, ignoring monitor");
            return;
        }
        if process.is_alive() || self.workers.contains_key(&process.id()) {
            debug!("[{name}] already running");
            return;
        }
        if !process.should_start() {
            return;
        }

        match spawn(&process) {
            Ok(child) => self.adopt(process, child),
            Err(e) => {
                warn!("{e:#}");
                process.transition(ProcessState::Failed, None);
            }
        }
    }

    /// Record a freshly spawned child as the process's runtime. A process
    /// retired in the meantime refuses to run, and its child is killed.
    fn adopt(&mut self, process: Arc<Process>, mut child: Child) {
        let name = process.qualified_name();
        let pid = child.id();
        if !process.transition(ProcessState::Running, pid) {
            info!("[{name}] dropped while starting, killing (pid={})", pid.unwrap_or(0));
            if let Err(e) = child.start_kill() {
                warn!("[{name}] failed to kill: {e}");
            }
            self.stopping.push(tokio::spawn(async move {
                let _ = child.wait().await;
            }));
            return;
        }

        write_pidfile(&process, pid);
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(watch(Arc::clone(&process), child, stopped));
        self.workers.insert(process.id(), Worker { stop, task });
    }

    fn remove(&mut self, process: &Process) {
        match self.workers.remove(&process.id()) {
            Some(worker) => {
                // A send error means the child already exited on its own.
                let _ = worker.stop.send(());
                self.stopping.push(worker.task);
            }
            None => debug!("[{}] not running, nothing to stop", process.qualified_name()),
        }
    }

    async fn shutdown(&mut self) {
        if !self.workers.is_empty() {
            info!("stopping {} process(es)", self.workers.len());
        }
        for (_, worker) in self.workers.drain() {
            let _ = worker.stop.send(());
            self.stopping.push(worker.task);
        }
        for task in self.stopping.drain(..) {
            if let Err(e) = task.await {
                warn!("watcher task failed: {e}");
            }
        }
    }
}

fn stdio_from_str(s: &str) -> Stdio {
    match s {
        "null" => Stdio::null(),
        _ => Stdio::inherit(),
    }
}

fn spawn(process: &Process) -> Result<Child> {
    let name = process.qualified_name();
    let config = process.config();

    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args);
    cmd.envs(&config.env);
    if let Some(ref dir) = config.working_dir {
        cmd.current_dir(dir);
    }
    cmd.stdout(stdio_from_str(&config.stdout));
    cmd.stderr(stdio_from_str(&config.stderr));
    cmd.kill_on_drop(true);

    let child = cmd
        .spawn()
        .with_context(|| format!("[{name}] failed to spawn: {}", config.command))?;

    info!(
        "[{name}] spawned (pid={}, cmd={})",
        child.id().unwrap_or(0),
        config.command
    );
    Ok(child)
}

fn write_pidfile(process: &Process, pid: Option<u32>) {
    let config = process.config();
    if let (Some(pidfile), Some(pid)) = (config.pidfile.as_deref(), pid)
        && let Err(e) = std::fs::write(pidfile, format!("{pid}\n"))
    {
        warn!(
            "[{}] failed to write pidfile {pidfile}: {e}",
            process.qualified_name()
        );
    }
}

async fn watch(process: Arc<Process>, mut child: Child, stop: oneshot::Receiver<()>) {
    // A dropped sender means the supervisor itself went away.
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = stop => None,
    };

    match exited {
        Some(status) => record_exit(&process, status),
        None => {
            stop_child(&process, &mut child).await;
            process.transition(ProcessState::Stopped, None);
        }
    }
    remove_pidfile(&process);
}

fn record_exit(process: &Process, status: std::io::Result<ExitStatus>) {
    let name = process.qualified_name();
    let next = match status {
        Ok(status) if status.success() => {
            info!("[{name}] exited ({status})");
            ProcessState::Exited
        }
        Ok(status) => {
            warn!("[{name}] exited ({status})");
            ProcessState::Failed
        }
        Err(e) => {
            warn!("[{name}] failed to wait: {e}");
            ProcessState::Failed
        }
    };
    process.transition(next, None);
}

/// SIGTERM, wait the process's `stop_timeout`, then SIGKILL stragglers.
async fn stop_child(process: &Process, child: &mut Child) {
    let name = process.qualified_name();
    let stop = process
        .config()
        .stop_timeout
        .map_or(DEFAULT_STOP_TIMEOUT, Duration::from_secs);

    info!("[{name}] sending SIGTERM");
    send_signal(&name, child, Signal::SIGTERM);
    if timeout(stop, child.wait()).await.is_err() {
        warn!(
            "[{name}] stop timeout ({}s) reached, sending SIGKILL",
            stop.as_secs()
        );
        send_signal(&name, child, Signal::SIGKILL);
        if timeout(SIGKILL_TIMEOUT, child.wait()).await.is_err() {
            warn!("[{name}] still running after SIGKILL, giving up");
        }
    }
}

fn send_signal(name: &str, child: &Child, sig: Signal) {
    if let Some(pid) = child.id()
        && let Err(e) = signal::kill(Pid::from_raw(pid as i32), sig)
    {
        warn!("[{name}] failed to send {sig}: {e}");
    }
}

fn remove_pidfile(process: &Process) {
    if let Some(pidfile) = process.config().pidfile
        && let Err(e) = std::fs::remove_file(&pidfile)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(
            "[{}] failed to remove pidfile {pidfile}: {e}",
            process.qualified_name()
        );
    }
}
