// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cgroup::manager::DEFAULT_CPU_PERIOD_USEC;
use crate::export::Format;
use crate::namespace::{NamespaceId, NamespaceType};

/// Process, cgroup and namespace resource monitor
#[derive(Parser, Debug)]
#[command(name = "resmon")]
#[command(about = "Sample process and cgroup resource usage, score anomalies, inspect namespaces")]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sample one process at a fixed interval until interrupted
    Monitor(MonitorArgs),

    /// Inspect and provision cgroup v2 groups
    #[command(subcommand)]
    Cgroup(CgroupCommand),

    /// Inspect process namespaces
    #[command(subcommand)]
    Ns(NsCommand),
}

#[derive(clap::Args, Debug)]
pub struct MonitorArgs {
    /// Process to monitor
    pub pid: i32,

    /// Sampling interval in seconds
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// Stop after this many samples
    #[arg(short = 'n', long)]
    pub max_samples: Option<usize>,

    /// Absolute z-score at which a point is reported as an anomaly
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Write the collected samples to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format; defaults to the output file extension
    #[arg(short, long)]
    pub format: Option<Format>,

    /// Write detected anomalies as JSON lines to this file
    #[arg(short, long)]
    pub anomalies: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum CgroupCommand {
    /// Print a usage report for a group
    Report { name: String },

    /// Create a group and enable its controllers
    Create { name: String },

    /// Move a process into a group
    Add { name: String, pid: i32 },

    /// Write cpu.max for a group
    CpuLimit {
        name: String,
        max_usec: u64,
        #[arg(long, default_value_t = DEFAULT_CPU_PERIOD_USEC)]
        period: u64,
    },

    /// Write memory.max for a group
    MemLimit { name: String, bytes: u64 },
}

#[derive(Subcommand, Debug)]
pub enum NsCommand {
    /// List the namespaces of a process
    List { pid: i32 },

    /// Compare the namespaces of two processes
    Compare { pid_a: i32, pid_b: i32 },

    /// Find every process in a namespace
    Find { ns_type: NamespaceType, id: NamespaceId },

    /// Report every namespace on the system and its member processes
    Report,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_flags() {
        let args = Args::try_parse_from([
            "resmon", "monitor", "1234", "--interval", "0.5", "-n", "10", "--format", "json",
            "--anomalies", "a.jsonl",
        ])
        .unwrap();
        let Command::Monitor(monitor) = args.command else {
            panic!("expected monitor");
        };
        assert_eq!(monitor.pid, 1234);
        assert_eq!(monitor.interval, Some(0.5));
        assert_eq!(monitor.max_samples, Some(10));
        assert_eq!(monitor.threshold, None);
        assert_eq!(monitor.format, Some(Format::Json));
        assert_eq!(monitor.anomalies, Some(PathBuf::from("a.jsonl")));
    }

    #[test]
    fn test_cgroup_cpu_limit_default_period() {
        let args = Args::try_parse_from(["resmon", "cgroup", "cpu-limit", "web", "50000"]).unwrap();
        let Command::Cgroup(CgroupCommand::CpuLimit { name, max_usec, period }) = args.command
        else {
            panic!("expected cpu-limit");
        };
        assert_eq!(name, "web");
        assert_eq!(max_usec, 50_000);
        assert_eq!(period, 100_000);
    }

    #[test]
    fn test_ns_find_parses_type() {
        let args = Args::try_parse_from(["resmon", "ns", "find", "net", "4026531840"]).unwrap();
        let Command::Ns(NsCommand::Find { ns_type, id }) = args.command else {
            panic!("expected ns find");
        };
        assert_eq!(ns_type, NamespaceType::Net);
        assert_eq!(id, 4_026_531_840);

        assert!(Args::try_parse_from(["resmon", "ns", "find", "bogus", "1"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let args = Args::try_parse_from(["resmon", "ns", "report", "--config", "/tmp/r.yaml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/r.yaml")));
        assert!(matches!(args.command, Command::Ns(NsCommand::Report)));
    }
}
