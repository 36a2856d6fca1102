// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use crate::errors::{Error, Result};
use crate::kv::{Grammar, read_key_values};
use crate::procfs::ProcFs;
use crate::procfs::stat::read_lossy;

const STATUS_KEYS: &[&str] = &[
    "VmRSS",
    "VmSize",
    "VmSwap",
    "Threads",
    "voluntary_ctxt_switches",
    "nonvoluntary_ctxt_switches",
];

/// Fields of `/proc/<pid>/status`. Sizes are in KiB as the kernel reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidStatus {
    pub rss_kb: u64,
    pub vmsize_kb: u64,
    pub swap_kb: u64,
    pub threads: u64,
    pub voluntary_ctxt: u64,
    pub involuntary_ctxt: u64,
}

/// First two fields of `/proc/<pid>/statm`, in pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidStatm {
    pub size_pages: u64,
    pub resident_pages: u64,
}

impl ProcFs {
    pub fn pid_status(&self, pid: i32) -> Result<PidStatus> {
        let kv = read_key_values(&self.pid_file(pid, "status"), Grammar::Columns, STATUS_KEYS)?;
        Ok(PidStatus {
            rss_kb: kv.get("VmRSS"),
            vmsize_kb: kv.get("VmSize"),
            swap_kb: kv.get("VmSwap"),
            threads: kv.get("Threads"),
            voluntary_ctxt: kv.get("voluntary_ctxt_switches"),
            involuntary_ctxt: kv.get("nonvoluntary_ctxt_switches"),
        })
    }

    pub fn pid_statm(&self, pid: i32) -> Result<PidStatm> {
        let path = self.pid_file(pid, "statm");
        let contents = read_lossy(&path)?;

        let mut fields = contents.split_whitespace().map(|v| v.parse::<u64>());
        match (fields.next(), fields.next()) {
            (Some(Ok(size_pages)), Some(Ok(resident_pages))) => Ok(PidStatm {
                size_pages,
                resident_pages,
            }),
            _ => Err(Error::malformed(&path, "expected two leading page counts")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture(files: &[(&str, &str)]) -> (TempDir, ProcFs) {
        let dir = TempDir::new().unwrap();
        let pid_dir = dir.path().join("10");
        fs::create_dir(&pid_dir).unwrap();
        for (name, contents) in files {
            fs::write(pid_dir.join(name), contents).unwrap();
        }
        let procfs = ProcFs::new(dir.path(), 4);
        (dir, procfs)
    }

    #[test]
    fn test_pid_status() {
        let (_dir, procfs) = fixture(&[(
            "status",
            "Name:\tbash\nThreads:\t3\nVmSize:\t   4096 kB\nVmRSS:\t    1024 kB\n\
             VmSwap:\t      16 kB\nvoluntary_ctxt_switches:\t77\nnonvoluntary_ctxt_switches:\t5\n",
        )]);
        let status = procfs.pid_status(10).unwrap();
        assert_eq!(
            status,
            PidStatus {
                rss_kb: 1024,
                vmsize_kb: 4096,
                swap_kb: 16,
                threads: 3,
                voluntary_ctxt: 77,
                involuntary_ctxt: 5,
            }
        );
    }

    #[test]
    fn test_pid_status_with_non_utf8_name() {
        let (dir, procfs) = fixture(&[]);
        fs::write(
            dir.path().join("10/status"),
            b"Name:\tw\xffx\nThreads:\t2\nVmSize:\t2048 kB\nVmRSS:\t512 kB\n",
        )
        .unwrap();
        let status = procfs.pid_status(10).unwrap();
        assert_eq!(status.rss_kb, 512);
        assert_eq!(status.vmsize_kb, 2048);
        assert_eq!(status.threads, 2);
    }

    #[test]
    fn test_pid_status_kernel_thread_has_no_vm_lines() {
        let (_dir, procfs) = fixture(&[("status", "Name:\tkthreadd\nThreads:\t1\n")]);
        let status = procfs.pid_status(10).unwrap();
        assert_eq!(status.rss_kb, 0);
        assert_eq!(status.vmsize_kb, 0);
        assert_eq!(status.threads, 1);
    }

    #[test]
    fn test_pid_statm() {
        let (_dir, procfs) = fixture(&[("statm", "1000 250 100 10 0 300 0\n")]);
        let statm = procfs.pid_statm(10).unwrap();
        assert_eq!(statm.size_pages, 1000);
        assert_eq!(statm.resident_pages, 250);
    }

    #[test]
    fn test_pid_statm_malformed() {
        let (_dir, procfs) = fixture(&[("statm", "1000\n")]);
        assert!(procfs.pid_statm(10).is_err());
        assert!(procfs.pid_statm(11).unwrap_err().is_not_found());
    }
}
