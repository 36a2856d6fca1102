// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use crate::errors::Result;
use crate::kv::{Grammar, read_key_values};
use crate::procfs::ProcFs;

const IO_KEYS: &[&str] = &[
    "rchar",
    "wchar",
    "syscr",
    "syscw",
    "read_bytes",
    "write_bytes",
];

/// I/O accounting from `/proc/<pid>/io`. Every field defaults to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidIo {
    pub rchar: u64,
    pub wchar: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    /// `syscr + syscw`
    pub syscalls: u64,
}

impl ProcFs {
    pub fn pid_io(&self, pid: i32) -> Result<PidIo> {
        let kv = read_key_values(&self.pid_file(pid, "io"), Grammar::Columns, IO_KEYS)?;
        Ok(PidIo {
            rchar: kv.get("rchar"),
            wchar: kv.get("wchar"),
            read_bytes: kv.get("read_bytes"),
            write_bytes: kv.get("write_bytes"),
            syscalls: kv.get("syscr").saturating_add(kv.get("syscw")),
        })
    }
}
