// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! One-shot provisioning of cgroup v2 groups under a base directory.
//!
//! Values are written once on request. Nothing here re-applies or enforces a
//! policy afterwards.

use std::fs::{self, DirBuilder};
use std::io::ErrorKind;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::errors::{Error, Result};

pub const DEFAULT_BASE: &str = "/sys/fs/cgroup/resource_monitor";
pub const DEFAULT_CPU_PERIOD_USEC: u64 = 100_000;

const CONTROLLERS: &str = "+cpu +memory +io";

#[derive(Debug, Clone)]
pub struct CgroupManager {
    base: PathBuf,
}

impl CgroupManager {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory of the group `name`. Names must be a single path component.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.base.join(name))
    }

    pub fn ensure_base(&self) -> Result<()> {
        create_dir(&self.base)
    }

    /// Creates the group and enables the cpu, memory and io controllers for
    /// the children of the base. Failing to enable controllers only warns:
    /// the group exists, but limits may not take effect.
    pub fn create(&self, name: &str) -> Result<PathBuf> {
        let path = self.path(name)?;
        self.ensure_base()?;
        create_dir(&path)?;

        if let Err(e) = write_control(&self.base, "cgroup.subtree_control", CONTROLLERS) {
            warn!("could not enable controllers under {}: {e}", self.base.display());
        }

        info!("created cgroup {}", path.display());
        Ok(path)
    }

    pub fn add_process(&self, name: &str, pid: i32) -> Result<()> {
        if pid <= 0 {
            return Err(Error::InvalidSubject {
                context: format!("pid must be positive, got {pid}"),
            });
        }
        let path = self.path(name)?;
        write_control(&path, "cgroup.procs", &pid.to_string())?;
        info!("moved pid {pid} into {}", path.display());
        Ok(())
    }

    /// Writes `cpu.max` as `"<max_usec> <period_usec>"`.
    pub fn set_cpu_limit(&self, name: &str, max_usec: u64, period_usec: u64) -> Result<()> {
        if period_usec == 0 {
            return Err(Error::InvalidSubject {
                context: "cpu period must be positive".to_string(),
            });
        }
        let path = self.path(name)?;
        write_control(&path, "cpu.max", &format!("{max_usec} {period_usec}"))?;
        info!(
            "cpu limit for {} set to {max_usec}/{period_usec}",
            path.display()
        );
        Ok(())
    }

    pub fn set_memory_limit(&self, name: &str, limit_bytes: u64) -> Result<()> {
        let path = self.path(name)?;
        write_control(&path, "memory.max", &limit_bytes.to_string())?;
        info!(
            "memory limit for {} set to {limit_bytes} bytes",
            path.display()
        );
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(Error::InvalidSubject {
            context: format!("invalid cgroup name {name:?}"),
        });
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    match DirBuilder::new().mode(0o755).create(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(Error::from_io(path, e)),
    }
}

fn write_control(dir: &Path, file: &str, value: &str) -> Result<()> {
    let path = dir.join(file);
    fs::write(&path, value).map_err(|e| Error::from_io(&path, e))
}
