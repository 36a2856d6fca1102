// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// A throwaway directory laid out like `/proc`.
pub struct ProcTree {
    dir: TempDir,
}

impl ProcTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn system_ticks(&self, total: u64) {
        self.write("stat", &format!("cpu  {total} 0 0 0 0 0 0 0 0 0\ncpu0 {total} 0 0 0 0 0 0 0 0 0\n"));
    }

    /// Writes stat, status and io for `pid` with the given counters.
    pub fn process(&self, pid: i32, utime: u64, rss_kb: u64, write_bytes: u64) {
        self.write(
            &format!("{pid}/stat"),
            &format!("{pid} (fixture proc) S 1 1 1 0 -1 4194304 50 0 1 0 {utime} 0 0 0 20 0 1 0 100 0 0\n"),
        );
        self.write(
            &format!("{pid}/status"),
            &format!(
                "Name:\tfixture\nThreads:\t3\nVmSize:\t{} kB\nVmRSS:\t{rss_kb} kB\nVmSwap:\t0 kB\nvoluntary_ctxt_switches:\t10\nnonvoluntary_ctxt_switches:\t2\n",
                rss_kb * 4
            ),
        );
        self.write(
            &format!("{pid}/io"),
            &format!(
                "rchar: 100\nwchar: {write_bytes}\nsyscr: 5\nsyscw: 5\nread_bytes: 0\nwrite_bytes: {write_bytes}\ncancelled_write_bytes: 0\n"
            ),
        );
    }

    /// Creates `<pid>/ns/<type>` symlinks pointing at `type:[id]`.
    pub fn namespaces(&self, pid: i32, entries: &[(&str, u64)]) {
        let ns = self.root().join(pid.to_string()).join("ns");
        fs::create_dir_all(&ns).unwrap();
        for (name, id) in entries {
            symlink(format!("{name}:[{id}]"), ns.join(name)).unwrap();
        }
    }
}

/// Writes a cgroup v2 group directory with accounting files.
pub fn cgroup_fixture(base: &Path, name: &str) -> PathBuf {
    let dir = base.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("cpu.stat"),
        "usage_usec 2500000\nuser_usec 2000000\nsystem_usec 500000\n",
    )
    .unwrap();
    fs::write(
        dir.join("memory.stat"),
        "anon 1048576\nfile 2048\npgfault 7\npgmajfault 1\n",
    )
    .unwrap();
    fs::write(dir.join("memory.current"), "2097152\n").unwrap();
    fs::write(
        dir.join("io.stat"),
        "8:0 rbytes=1048576 wbytes=3145728 rios=4 wios=6\n8:16 rbytes=1048576 wbytes=0 rios=1 wios=0\n",
    )
    .unwrap();
    dir
}

/// Runs the resmon binary with no config file and the given environment.
pub fn resmon(args: &[&str], env: &[(&str, &Path)]) -> Output {
    let config = tempfile::tempdir().unwrap();
    let mut command = Command::new(env!("CARGO_BIN_EXE_resmon"));
    command
        .arg("--config")
        .arg(config.path().join("absent.yaml"))
        .args(args)
        .env_remove("RESMON_LOG_LEVEL")
        .env("LOG_LEVEL", "error");
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().unwrap()
}
