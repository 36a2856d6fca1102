// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! cgroup v2 accounting for a single group directory.

pub mod manager;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::errors::Result;
use crate::kv::{Grammar, KeyValues, read_key_values, read_scalar};

pub use manager::CgroupManager;

const CPU_KEYS: &[&str] = &["usage_usec", "user_usec", "system_usec"];
const MEMORY_KEYS: &[&str] = &["anon", "file", "pgfault", "pgmajfault"];
const IO_KEYS: &[&str] = &["rbytes", "wbytes", "rios", "wios"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuMetrics {
    pub usage_usec: u64,
    pub user_usec: u64,
    pub system_usec: u64,
}

/// Memory figures in bytes, fault counts verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryMetrics {
    pub current: u64,
    pub anon: u64,
    pub file: u64,
    pub pgfault: u64,
    pub pgmajfault: u64,
}

/// Sums across every device line of `io.stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IoMetrics {
    pub rbytes: u64,
    pub wbytes: u64,
    pub rios: u64,
    pub wios: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CgroupMetrics {
    pub cpu: CpuMetrics,
    pub mem: MemoryMetrics,
    pub io: IoMetrics,
}

/// Reads `cpu.stat`, `memory.stat`, `memory.current` and `io.stat` under
/// `dir`. A file that is missing or unreadable leaves its part of the result
/// zeroed, so a group that is being torn down or has controllers disabled
/// still yields whatever is visible.
pub fn read_metrics(dir: &Path, diagnostics: &mut Diagnostics) -> CgroupMetrics {
    let subject = format!("cgroup {}", dir.display());
    let mut metrics = CgroupMetrics::default();

    if let Some(cpu) = tolerate(
        read_key_values(&dir.join("cpu.stat"), Grammar::Columns, CPU_KEYS),
        &subject,
        "cpu.stat",
        diagnostics,
    ) {
        metrics.cpu = CpuMetrics {
            usage_usec: cpu.get("usage_usec"),
            user_usec: cpu.get("user_usec"),
            system_usec: cpu.get("system_usec"),
        };
    }

    if let Some(mem) = tolerate(
        read_key_values(&dir.join("memory.stat"), Grammar::Columns, MEMORY_KEYS),
        &subject,
        "memory.stat",
        diagnostics,
    ) {
        metrics.mem.anon = mem.get("anon");
        metrics.mem.file = mem.get("file");
        metrics.mem.pgfault = mem.get("pgfault");
        metrics.mem.pgmajfault = mem.get("pgmajfault");
    }

    if let Some(current) = tolerate(
        read_scalar(&dir.join("memory.current")),
        &subject,
        "memory.current",
        diagnostics,
    ) {
        metrics.mem.current = current;
    }

    if let Some(io) = tolerate(
        read_key_values(&dir.join("io.stat"), Grammar::Assignments, IO_KEYS),
        &subject,
        "io.stat",
        diagnostics,
    ) {
        metrics.io = io_metrics(&io);
    }

    metrics
}

fn io_metrics(io: &KeyValues) -> IoMetrics {
    IoMetrics {
        rbytes: io.get("rbytes"),
        wbytes: io.get("wbytes"),
        rios: io.get("rios"),
        wios: io.get("wios"),
    }
}

fn tolerate<T>(
    result: Result<T>,
    subject: &str,
    source: &'static str,
    diagnostics: &mut Diagnostics,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            diagnostics.report(subject, source, &e);
            None
        }
    }
}

/// Human-readable rendering of [`CgroupMetrics`]. Units are converted here
/// for display only.
pub struct CgroupReport<'a> {
    pub name: &'a str,
    pub path: PathBuf,
    pub metrics: &'a CgroupMetrics,
}

const USEC_PER_SEC: f64 = 1_000_000.0;
const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

impl fmt::Display for CgroupReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.metrics;
        writeln!(f, "==== cgroup usage report: '{}' ====", self.name)?;
        writeln!(f, "path: {}", self.path.display())?;
        writeln!(f)?;
        writeln!(f, "[CPU]")?;
        writeln!(f, "  Total usage: {:.2} s", m.cpu.usage_usec as f64 / USEC_PER_SEC)?;
        writeln!(f, "  User:        {:.2} s", m.cpu.user_usec as f64 / USEC_PER_SEC)?;
        writeln!(f, "  System:      {:.2} s", m.cpu.system_usec as f64 / USEC_PER_SEC)?;
        writeln!(f)?;
        writeln!(f, "[Memory]")?;
        writeln!(f, "  Current:     {} KB", m.mem.current / KIB)?;
        writeln!(f, "  Anon:        {} KB", m.mem.anon / KIB)?;
        writeln!(f, "  File cache:  {} KB", m.mem.file / KIB)?;
        writeln!(
            f,
            "  Page faults: {} (major: {})",
            m.mem.pgfault, m.mem.pgmajfault
        )?;
        writeln!(f)?;
        writeln!(f, "[I/O]")?;
        writeln!(f, "  Read:        {} MB", m.io.rbytes / MIB)?;
        writeln!(f, "  Written:     {} MB", m.io.wbytes / MIB)?;
        writeln!(f, "  Read ops:    {}", m.io.rios)?;
        write!(f, "  Write ops:   {}", m.io.wios)
    }
}
