// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

pub mod io;
pub mod stat;
pub mod status;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::debug;
use nix::unistd::{SysconfVar, sysconf};

use crate::errors::{Error, Result};

static PROC_ROOT: OnceLock<PathBuf> = OnceLock::new();

const FALLBACK_PAGE_SIZE_KB: u64 = 4;

pub fn root_path() -> &'static Path {
    PROC_ROOT.get_or_init(|| {
        if let Ok(v) = env::var("HOST_PROC") {
            return v.into();
        }

        "/proc".into()
    })
}

/// Handle on a process table rooted at an arbitrary directory.
///
/// Production code uses [`ProcFs::host`]; tests point it at a fixture tree
/// laid out like `/proc`.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    page_size_kb: u64,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>, page_size_kb: u64) -> Self {
        Self {
            root: root.into(),
            page_size_kb,
        }
    }

    pub fn host() -> Self {
        Self::new(root_path(), system_page_size_kb())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn page_size_kb(&self) -> u64 {
        self.page_size_kb
    }

    pub fn pid_dir(&self, pid: i32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    pub fn pid_file(&self, pid: i32, name: &str) -> PathBuf {
        self.pid_dir(pid).join(name)
    }

    pub fn exists(&self, pid: i32) -> bool {
        self.pid_dir(pid).is_dir()
    }

    /// Numeric entries of the process table, ascending. Entries that vanish
    /// or cannot be read while listing are skipped.
    pub fn pids(&self) -> Result<Vec<i32>> {
        let entries = fs::read_dir(&self.root).map_err(|e| Error::from_io(&self.root, e))?;

        let mut pids: Vec<i32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
            .filter(|pid| *pid > 0)
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }
}

fn system_page_size_kb() -> u64 {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(bytes)) if bytes > 0 => (bytes as u64) / 1024,
        other => {
            debug!("could not determine page size ({other:?}), assuming 4 KiB");
            FALLBACK_PAGE_SIZE_KB
        }
    }
}
