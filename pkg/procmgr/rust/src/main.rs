// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::Result;
use clap::Parser;
use dd_procmgr_reload::loader::DEFAULT_CONFIG_SOURCE;
use dd_procmgr_reload::{Controller, LoadResult, Supervisor, channel};
use log::{debug, info, warn};
use tokio::signal::unix::{SignalKind, signal};

#[derive(Parser, Debug)]
#[command(name = "dd-procmgrd", version, about = "Datadog process manager daemon")]
struct Args {
    /// Config file, or directory of *.yaml files.
    #[arg(long, env = "DD_PM_CONFIG", default_value = DEFAULT_CONFIG_SOURCE)]
    config: String,

    #[arg(long, default_value = "info")]
    log_level: log::Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::init_with_level(args.log_level)?;
    info!(
        "dd-procmgrd starting (version {})",
        env!("CARGO_PKG_VERSION")
    );

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let (queue, commands) = channel();
    let supervisor = tokio::spawn(Supervisor::new(commands).run());
    let mut controller = Controller::new(queue);

    // Loading does blocking file I/O. The supervisor keeps running on the
    // runtime's workers meanwhile.
    let result = tokio::task::block_in_place(|| controller.load(&args.config));
    report(&controller, &result);

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                info!("received SIGHUP, reloading {}", args.config);
                let result = tokio::task::block_in_place(|| controller.load(&args.config));
                report(&controller, &result);
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
                break;
            }
        }
    }

    info!("dd-procmgrd shutting down");
    // Closing the queue makes the supervisor stop every child.
    drop(controller);
    supervisor.await?;
    Ok(())
}

fn report(controller: &Controller, result: &LoadResult) {
    match serde_json::to_string(result) {
        Ok(json) => debug!("load result: {json}"),
        Err(e) => warn!("failed to serialize load result: {e}"),
    }
    if result.is_ok() {
        info!(
            "supervising {} application(s), {} process(es)",
            controller.tree().len(),
            controller.tree().processes().count()
        );
    }
}
