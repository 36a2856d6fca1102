// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{info, warn};
use tokio::signal::unix::{SignalKind, signal};

use resmon::cgroup::{CgroupManager, CgroupReport, read_metrics};
use resmon::cli::{Args, CgroupCommand, Command, MonitorArgs, NsCommand};
use resmon::config::{self, Config};
use resmon::diagnostics::Diagnostics;
use resmon::export::{self, Format};
use resmon::namespace::Comparison;
use resmon::{Monitor, MonitorOptions, ProcFs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load_config(args.config)?;
    let log_level = config::get_log_level(&config);
    simple_logger::init_with_level(log_level)?;
    info!("Log level set to: {:?}", log_level);

    match args.command {
        Command::Monitor(monitor) => run_monitor(monitor, &config).await,
        Command::Cgroup(command) => run_cgroup(command, &config),
        Command::Ns(command) => run_ns(command),
    }
}

async fn run_monitor(args: MonitorArgs, config: &Config) -> Result<()> {
    let interval_secs = args.interval.unwrap_or(config.interval_secs);
    let interval = Duration::try_from_secs_f64(interval_secs)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| anyhow!("invalid sampling interval {interval_secs}"))?;

    let options = MonitorOptions {
        max_samples: args.max_samples.unwrap_or(config.max_samples),
        threshold: args.threshold.unwrap_or(config.anomaly_threshold),
    };
    let mut monitor = Monitor::new(ProcFs::host(), args.pid, options)
        .with_context(|| format!("Cannot monitor pid {}", args.pid))?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let signalled = Arc::clone(&stop);
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, stopping"),
            _ = sigint.recv() => info!("Received SIGINT, stopping"),
        }
        signalled.store(true, Ordering::Relaxed);
    });

    let running = Arc::clone(&stop);
    let monitor = tokio::task::spawn_blocking(move || {
        monitor.run(&running, interval);
        monitor
    })
    .await
    .context("Monitoring loop failed")?;

    let format = args.format.unwrap_or_else(|| {
        args.output
            .as_deref()
            .map(Format::from_path)
            .unwrap_or(Format::Csv)
    });
    match &args.output {
        Some(path) => {
            export::write_samples(create(path)?, format, monitor.samples())
                .with_context(|| format!("Failed to write samples to {}", path.display()))?;
            info!("Wrote {} samples to {}", monitor.samples().len(), path.display());
        }
        None => export::write_samples(io::stdout().lock(), format, monitor.samples())
            .context("Failed to write samples")?,
    }

    match &args.anomalies {
        Some(path) => {
            export::write_anomalies(create(path)?, monitor.anomalies())
                .with_context(|| format!("Failed to write anomalies to {}", path.display()))?;
            info!(
                "Wrote {} anomalies to {}",
                monitor.anomalies().len(),
                path.display()
            );
        }
        None if !monitor.anomalies().is_empty() => warn!(
            "{} anomalies detected; pass --anomalies to save them",
            monitor.anomalies().len()
        ),
        None => {}
    }

    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn run_cgroup(command: CgroupCommand, config: &Config) -> Result<()> {
    let manager = CgroupManager::new(config.cgroup_root.clone());

    match command {
        CgroupCommand::Report { name } => {
            let path = manager.path(&name)?;
            if !path.is_dir() {
                warn!("cgroup {} does not exist, reporting zeros", path.display());
            }
            let metrics = read_metrics(&path, &mut Diagnostics::default());
            let report = CgroupReport {
                name: &name,
                path,
                metrics: &metrics,
            };
            writeln!(io::stdout().lock(), "{report}")?;
        }
        CgroupCommand::Create { name } => {
            let path = manager.create(&name)?;
            writeln!(io::stdout().lock(), "{}", path.display())?;
        }
        CgroupCommand::Add { name, pid } => manager.add_process(&name, pid)?,
        CgroupCommand::CpuLimit {
            name,
            max_usec,
            period,
        } => manager.set_cpu_limit(&name, max_usec, period)?,
        CgroupCommand::MemLimit { name, bytes } => manager.set_memory_limit(&name, bytes)?,
    }

    Ok(())
}

fn run_ns(command: NsCommand) -> Result<()> {
    let procfs = ProcFs::host();
    let mut out = io::stdout().lock();

    match command {
        NsCommand::List { pid } => {
            let set = procfs
                .list_namespaces(pid)
                .with_context(|| format!("Cannot read namespaces of pid {pid}"))?;
            writeln!(out, "Namespaces of pid {pid}:")?;
            for entry in set.iter() {
                writeln!(out, "  {entry}")?;
            }
        }
        NsCommand::Compare { pid_a, pid_b } => {
            let comparison = procfs.compare_namespaces(pid_a, pid_b)?;
            writeln!(out, "Namespaces of pid {pid_a} vs pid {pid_b}:")?;
            for (ns_type, result) in comparison {
                let line = match result {
                    Comparison::Shared { id } => format!("shared [{id}]"),
                    Comparison::Diverged { first, second } => {
                        format!("different [{first}] vs [{second}]")
                    }
                    Comparison::OnlyInFirst { id } => format!("only pid {pid_a} [{id}]"),
                    Comparison::OnlyInSecond { id } => format!("only pid {pid_b} [{id}]"),
                };
                writeln!(out, "  {:<7} {line}", ns_type.name())?;
            }
        }
        NsCommand::Find { ns_type, id } => {
            let pids = procfs.find_processes_in_namespace(ns_type, id)?;
            if pids.is_empty() {
                bail!("no process found in {ns_type}:[{id}]");
            }
            let pids: Vec<String> = pids.iter().map(i32::to_string).collect();
            writeln!(out, "{ns_type}:[{id}] -> PIDs: {}", pids.join(" "))?;
        }
        NsCommand::Report => {
            let index = procfs.build_namespace_index()?;
            info!(
                "Scanned {} processes, {} distinct namespaces",
                index.process_count(),
                index.len()
            );
            write!(out, "{index}")?;
        }
    }

    Ok(())
}
