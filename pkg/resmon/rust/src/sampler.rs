// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Point-in-time sampling of a single process.

use log::debug;
use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::errors::{Error, ErrorKind, Result};
use crate::procfs::ProcFs;
use crate::procfs::io::PidIo;
use crate::procfs::stat::PidStat;
use crate::procfs::status::PidStatus;

/// One sampling tick for one PID. Field names are the export column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessSample {
    pub pid: i32,
    pub timestamp: f64,
    pub cpu_percent: f64,
    pub threads: u64,
    pub voluntary_ctxt: u64,
    pub involuntary_ctxt: u64,
    pub rss_kb: u64,
    pub vmsize_kb: u64,
    pub minor_faults: u64,
    pub major_faults: u64,
    pub swap_kb: u64,
    pub rchar: u64,
    pub wchar: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub syscalls: u64,
    pub rchar_per_second: f64,
    pub wchar_per_second: f64,
    pub read_bytes_per_second: f64,
    pub write_bytes_per_second: f64,
    pub syscalls_per_second: f64,
    /// CPU could not be measured this tick; `cpu_percent` is a placeholder.
    #[serde(skip)]
    pub cpu_missing: bool,
    /// I/O accounting was unreadable this tick; the counters are zero-filled
    /// and must not be used as a rate baseline.
    #[serde(skip)]
    pub io_missing: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub rss_kb: u64,
    pub vmsize_kb: u64,
    pub minor_faults: u64,
    pub major_faults: u64,
    pub swap_kb: u64,
}

/// Tick totals from the previous CPU sample of one monitoring session.
///
/// The first call against a fresh baseline reports 0% since there is nothing
/// to diff against yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBaseline {
    last: Option<CpuTicks>,
}

#[derive(Debug, Clone, Copy)]
struct CpuTicks {
    system: u64,
    process: u64,
}

impl CpuBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_primed(&self) -> bool {
        self.last.is_some()
    }

    /// Records the new totals and returns the process share of the system
    /// ticks elapsed since the previous call, as a percentage.
    pub fn advance(&mut self, system: u64, process: u64) -> f64 {
        let previous = self.last.replace(CpuTicks { system, process });
        let Some(previous) = previous else {
            return 0.0;
        };

        let delta_system = system.saturating_sub(previous.system);
        let delta_process = process.saturating_sub(previous.process);
        if delta_system == 0 {
            return 0.0;
        }
        100.0 * delta_process as f64 / delta_system as f64
    }
}

#[derive(Debug, Clone)]
pub struct ProcessSampler {
    procfs: ProcFs,
}

impl ProcessSampler {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }

    pub fn procfs(&self) -> &ProcFs {
        &self.procfs
    }

    pub fn sample_cpu(&self, pid: i32, baseline: &mut CpuBaseline) -> Result<f64> {
        let process = self.procfs.pid_stat(pid)?.ticks();
        let system = self.procfs.system_ticks()?;
        Ok(baseline.advance(system, process))
    }

    /// Memory footprint from the status record. When both RSS and VSZ come
    /// back zero the page counts of `statm` are used instead.
    pub fn sample_memory(&self, pid: i32) -> Result<MemoryUsage> {
        let status = self.procfs.pid_status(pid)?;
        let stat = self
            .procfs
            .pid_stat(pid)
            .inspect_err(|e| debug!("pid {pid}: page fault counters unavailable: {e}"))
            .ok();
        self.memory_from(pid, &status, stat.as_ref())
    }

    fn memory_from(
        &self,
        pid: i32,
        status: &PidStatus,
        stat: Option<&PidStat>,
    ) -> Result<MemoryUsage> {
        let mut usage = MemoryUsage {
            rss_kb: status.rss_kb,
            vmsize_kb: status.vmsize_kb,
            swap_kb: status.swap_kb,
            ..MemoryUsage::default()
        };

        if usage.rss_kb == 0 && usage.vmsize_kb == 0 {
            let statm = self.procfs.pid_statm(pid)?;
            let page_kb = self.procfs.page_size_kb();
            usage.rss_kb = statm.resident_pages.saturating_mul(page_kb);
            usage.vmsize_kb = statm.size_pages.saturating_mul(page_kb);
            debug!("pid {pid}: status has no VmRSS/VmSize, used statm page counts");
        }

        if let Some(stat) = stat {
            usage.minor_faults = stat.minor_faults;
            usage.major_faults = stat.major_faults;
        }

        Ok(usage)
    }

    pub fn sample_io(&self, pid: i32) -> Result<PidIo> {
        self.procfs.pid_io(pid)
    }

    /// Takes a full sample, reading each per-process file once. Failures of
    /// individual sources are reported and leave their fields zeroed (and
    /// flagged as missing); only an unexpected I/O error drops the whole
    /// sample.
    pub fn sample(
        &self,
        pid: i32,
        timestamp: f64,
        baseline: &mut CpuBaseline,
        diagnostics: &mut Diagnostics,
    ) -> Result<ProcessSample> {
        let subject = format!("pid {pid}");
        let mut sample = ProcessSample {
            pid,
            timestamp,
            cpu_missing: true,
            io_missing: true,
            ..ProcessSample::default()
        };
        let mut dropped: Option<Error> = None;

        let mut report = |source: &'static str, err: Error| {
            diagnostics.report(&subject, source, &err);
            if err.kind() == ErrorKind::Io && dropped.is_none() {
                dropped = Some(err);
            }
        };

        let stat = self.procfs.pid_stat(pid).map_err(|e| report("stat", e)).ok();
        let status = self.procfs.pid_status(pid).map_err(|e| report("status", e)).ok();

        if let Some(stat) = &stat {
            match self.procfs.system_ticks() {
                Ok(system) => {
                    sample.cpu_percent = baseline.advance(system, stat.ticks());
                    sample.cpu_missing = false;
                }
                Err(e) => report("system stat", e),
            }
        }

        if let Some(status) = &status {
            sample.threads = status.threads;
            sample.voluntary_ctxt = status.voluntary_ctxt;
            sample.involuntary_ctxt = status.involuntary_ctxt;

            match self.memory_from(pid, status, stat.as_ref()) {
                Ok(mem) => {
                    sample.rss_kb = mem.rss_kb;
                    sample.vmsize_kb = mem.vmsize_kb;
                    sample.minor_faults = mem.minor_faults;
                    sample.major_faults = mem.major_faults;
                    sample.swap_kb = mem.swap_kb;
                }
                Err(e) => report("statm", e),
            }
        }

        match self.sample_io(pid) {
            Ok(io) => {
                sample.rchar = io.rchar;
                sample.wchar = io.wchar;
                sample.read_bytes = io.read_bytes;
                sample.write_bytes = io.write_bytes;
                sample.syscalls = io.syscalls;
                sample.io_missing = false;
            }
            Err(e) => report("io", e),
        }

        match dropped {
            Some(err) => Err(err),
            None => Ok(sample),
        }
    }
}
