// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Scheduler statistics: `/proc/<pid>/stat` and the aggregate `cpu` line of
//! `/proc/stat`.

use std::fs;
use std::path::Path;

use crate::errors::{Error, Result};
use crate::procfs::ProcFs;

/// The counters this crate needs from `/proc/<pid>/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidStat {
    pub minor_faults: u64,
    pub major_faults: u64,
    pub utime: u64,
    pub stime: u64,
}

impl PidStat {
    pub fn ticks(&self) -> u64 {
        self.utime.saturating_add(self.stime)
    }
}

impl ProcFs {
    pub fn pid_stat(&self, pid: i32) -> Result<PidStat> {
        let path = self.pid_file(pid, "stat");
        let contents = read_lossy(&path)?;
        parse_pid_stat(&contents).ok_or_else(|| Error::malformed(&path, "unexpected stat layout"))
    }

    /// Sum of the first eight fields of the aggregate `cpu` line.
    pub fn system_ticks(&self) -> Result<u64> {
        let path = self.root().join("stat");
        let contents = read_lossy(&path)?;
        parse_system_ticks(&path, &contents)
    }
}

/// Reads a whole pseudo-file. The command name embedded in per-process
/// records is arbitrary bytes, so invalid UTF-8 is replaced, not rejected.
pub(crate) fn read_lossy(path: &Path) -> Result<String> {
    let raw = fs::read(path).map_err(|e| Error::from_io(path, e))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// The command name (field 2) may contain spaces and parentheses, so fields
/// are counted from the last closing parenthesis.
fn parse_pid_stat(contents: &str) -> Option<PidStat> {
    let close = contents.rfind(')')?;
    let rest = contents.get(close + 1..)?;
    let mut fields = rest.split_whitespace();

    // fields[0] is the state (field 3 in proc(5) numbering)
    let minor_faults = fields.nth(7)?.parse().ok()?; // field 10: minflt
    let major_faults = fields.nth(1)?.parse().ok()?; // field 12: majflt
    let utime = fields.nth(1)?.parse().ok()?; // field 14: utime
    let stime = fields.next()?.parse().ok()?; // field 15: stime

    Some(PidStat {
        minor_faults,
        major_faults,
        utime,
        stime,
    })
}

fn parse_system_ticks(path: &Path, contents: &str) -> Result<u64> {
    let line = contents
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| Error::malformed(path, "no aggregate cpu line"))?;

    // user nice system idle iowait irq softirq steal
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|v| v.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::malformed(path, format!("bad cpu tick value: {e}")))?;

    if values.len() < 4 {
        return Err(Error::malformed(path, "cpu line has too few fields"));
    }
    Ok(values.iter().fold(0u64, |acc, v| acc.saturating_add(*v)))
}
