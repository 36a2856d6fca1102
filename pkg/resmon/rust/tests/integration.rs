// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

mod helpers;

use std::fs;
use std::io::Write;
use std::path::Path;

use helpers::{ProcTree, cgroup_fixture, resmon};
use resmon::cgroup::{CgroupManager, read_metrics};
use resmon::diagnostics::Diagnostics;
use resmon::export::{self, Format};
use resmon::monitor::{CPU_METRIC, Tick, WRITE_RATE_METRIC};
use resmon::namespace::{Comparison, NamespaceEntry, NamespaceType};
use resmon::sampler::{CpuBaseline, ProcessSampler};
use resmon::{Grammar, Monitor, MonitorOptions, ProcFs, read_key_values};

// ===========================================================================
// Group 1: Kernel text formats
// ===========================================================================

#[test]
fn test_io_stat_two_devices_are_aggregated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("io.stat");
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "8:0 rbytes=100 wbytes=50 rios=1 wios=1").unwrap();
    writeln!(file, "8:16 rbytes=100 wbytes=50 rios=1 wios=1").unwrap();

    let values = read_key_values(&path, Grammar::Assignments, &["rbytes", "wbytes"]).unwrap();
    assert_eq!(values.get("rbytes"), 200);
    assert_eq!(values.get("wbytes"), 100);
    assert!(!values.contains("rios"));
}

#[test]
fn test_cgroup_metrics_from_fixture_and_partial_group() {
    let base = tempfile::tempdir().unwrap();
    let full = cgroup_fixture(base.path(), "web");

    let mut diagnostics = Diagnostics::default();
    let metrics = read_metrics(&full, &mut diagnostics);
    assert_eq!(metrics.cpu.usage_usec, 2_500_000);
    assert_eq!(metrics.mem.current, 2_097_152);
    assert_eq!(metrics.io.rbytes, 2_097_152);
    assert_eq!(metrics.io.rios, 5);
    assert_eq!(diagnostics.reported(), 0);

    // controllers disabled: only cpu.stat exists
    let partial = base.path().join("batch");
    fs::create_dir(&partial).unwrap();
    fs::write(partial.join("cpu.stat"), "usage_usec 10\n").unwrap();
    let metrics = read_metrics(&partial, &mut diagnostics);
    assert_eq!(metrics.cpu.usage_usec, 10);
    assert_eq!(metrics.mem.current, 0);
    assert_eq!(metrics.io.wbytes, 0);
    assert_eq!(diagnostics.distinct(), 3);
}

// ===========================================================================
// Group 2: Process sampling and monitoring
// ===========================================================================

#[test]
fn test_sample_memory_status_and_statm_fallback() {
    let tree = ProcTree::new();
    tree.write("10/status", "Name:\tx\nVmSize:\t4096 kB\nVmRSS:\t1024 kB\n");
    tree.write("10/statm", "1 1\n");
    tree.write("20/status", "Name:\ty\n");
    tree.write("20/statm", "1000 250 10 1 0 100 0\n");

    let sampler = ProcessSampler::new(ProcFs::new(tree.root(), 4));
    let direct = sampler.sample_memory(10).unwrap();
    assert_eq!((direct.rss_kb, direct.vmsize_kb), (1024, 4096));

    let fallback = sampler.sample_memory(20).unwrap();
    assert_eq!((fallback.rss_kb, fallback.vmsize_kb), (1000, 4000));
}

#[test]
fn test_monitor_session_and_export() {
    let tree = ProcTree::new();
    let pid = 4242;
    tree.system_ticks(1000);
    tree.process(pid, 0, 1024, 0);

    let options = MonitorOptions {
        max_samples: 16,
        threshold: 3.0,
    };
    let mut monitor = Monitor::new(ProcFs::new(tree.root(), 4), pid, options).unwrap();

    let mut written = 0;
    for (i, step) in [500, 520, 480, 510, 490, 500, 505, 495].iter().enumerate() {
        written += step;
        tree.system_ticks(1000 + 200 * (i as u64 + 1));
        tree.process(pid, 20 * (i as u64 + 1), 1024, written);
        assert_eq!(monitor.tick(100.0 + i as f64), Tick::Recorded);
    }
    written += 5_000_000;
    tree.system_ticks(3000);
    tree.process(pid, 180, 1024, written);
    assert_eq!(monitor.tick(108.0), Tick::Recorded);

    let samples = monitor.samples();
    assert_eq!(samples.len(), 9);
    assert_eq!(samples.first().unwrap().cpu_percent, 0.0);
    assert_eq!(samples.get(1).unwrap().cpu_percent, 10.0);
    assert_eq!(samples.get(1).unwrap().write_bytes_per_second, 520.0);
    assert_eq!(samples.get(1).unwrap().syscalls, 10);
    assert_eq!(samples.get(1).unwrap().minor_faults, 50);
    assert_eq!(samples.get(1).unwrap().threads, 3);
    assert_eq!(monitor.detector().anomalies_for(CPU_METRIC).count(), 0);
    assert_eq!(monitor.detector().anomalies_for(WRITE_RATE_METRIC).count(), 1);

    let out = tempfile::tempdir().unwrap();
    let csv = out.path().join("samples.csv");
    export::write_samples(
        fs::File::create(&csv).unwrap(),
        Format::from_path(&csv),
        samples,
    )
    .unwrap();
    let text = fs::read_to_string(&csv).unwrap();
    assert!(text.starts_with("pid,timestamp,cpu_percent,threads,"));
    assert_eq!(text.lines().count(), 10);

    let jsonl = out.path().join("anomalies.jsonl");
    export::write_anomalies(fs::File::create(&jsonl).unwrap(), monitor.anomalies()).unwrap();
    let line = fs::read_to_string(&jsonl).unwrap();
    let anomaly: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(anomaly["metric"], WRITE_RATE_METRIC);
    assert_eq!(anomaly["timestamp"], 108.0);
    assert!(anomaly["z"].as_f64().unwrap() >= 3.0);
}

#[test]
fn test_sampling_self_from_real_proc() {
    let procfs = ProcFs::new("/proc", 4);
    let pid = i32::try_from(std::process::id()).unwrap();
    let sampler = ProcessSampler::new(procfs);

    let mut baseline = CpuBaseline::new();
    let mut diagnostics = Diagnostics::default();
    let sample = sampler.sample(pid, 0.0, &mut baseline, &mut diagnostics).unwrap();
    assert_eq!(sample.pid, pid);
    assert_eq!(sample.cpu_percent, 0.0);
    assert!(sample.rss_kb > 0);
    assert!(sample.vmsize_kb >= sample.rss_kb);
    assert!(sample.threads >= 1);
    assert!(baseline.is_primed());
}

// ===========================================================================
// Group 3: Namespaces
// ===========================================================================

fn namespace_tree() -> ProcTree {
    let tree = ProcTree::new();
    tree.namespaces(1, &[("net", 100), ("mnt", 7), ("user", 9)]);
    tree.namespaces(2, &[("net", 100), ("mnt", 8)]);
    tree.namespaces(3, &[("net", 200), ("mnt", 8)]);
    // not a pid
    tree.write("sys/kernel", "");
    tree
}

#[test]
fn test_global_index_groups_pids_by_namespace() {
    let tree = namespace_tree();
    let procfs = ProcFs::new(tree.root(), 4);
    let index = procfs.build_namespace_index().unwrap();

    let shared = NamespaceEntry {
        ns_type: NamespaceType::Net,
        id: 100,
    };
    let alone = NamespaceEntry {
        ns_type: NamespaceType::Net,
        id: 200,
    };
    assert_eq!(
        index.pids(&shared).unwrap().iter().copied().collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(
        index.pids(&alone).unwrap().iter().copied().collect::<Vec<_>>(),
        vec![3]
    );
    assert_eq!(index.process_count(), 3);

    let report = index.to_string();
    assert!(report.contains("net:[100] -> PIDs: 1 2\n"));
    assert!(report.contains("mnt:[8] -> PIDs: 2 3\n"));

    assert_eq!(
        procfs
            .find_processes_in_namespace(NamespaceType::Mnt, 8)
            .unwrap(),
        vec![2, 3]
    );
}

#[test]
fn test_compare_reports_shared_diverged_and_exclusive() {
    let tree = namespace_tree();
    let procfs = ProcFs::new(tree.root(), 4);

    let comparison = procfs.compare_namespaces(1, 2).unwrap();
    assert_eq!(
        comparison,
        vec![
            (NamespaceType::Mnt, Comparison::Diverged { first: 7, second: 8 }),
            (NamespaceType::Net, Comparison::Shared { id: 100 }),
            (NamespaceType::User, Comparison::OnlyInFirst { id: 9 }),
        ]
    );
}

// ===========================================================================
// Group 4: Command line
// ===========================================================================

#[test]
fn test_cli_cgroup_report_uses_env_root() {
    let base = tempfile::tempdir().unwrap();
    cgroup_fixture(base.path(), "web");

    let output = resmon(
        &["cgroup", "report", "web"],
        &[("RESMON_CGROUP_ROOT", base.path())],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Total usage: 2.50 s"));
    assert!(stdout.contains("Current:     2048 KB"));
    assert!(stdout.contains("Read:        2 MB"));
    assert!(stdout.contains("Written:     3 MB"));
}

#[test]
fn test_cli_cgroup_provisioning_writes_files_once() {
    let base = tempfile::tempdir().unwrap();
    let env = [("RESMON_CGROUP_ROOT", base.path())];

    assert!(resmon(&["cgroup", "create", "job"], &env).status.success());
    assert!(resmon(&["cgroup", "cpu-limit", "job", "25000"], &env).status.success());
    assert!(resmon(&["cgroup", "mem-limit", "job", "1048576"], &env).status.success());

    let manager = CgroupManager::new(base.path());
    let group = manager.path("job").unwrap();
    assert_eq!(fs::read_to_string(group.join("cpu.max")).unwrap(), "25000 100000");
    assert_eq!(fs::read_to_string(group.join("memory.max")).unwrap(), "1048576");

    assert!(!resmon(&["cgroup", "create", "../escape"], &env).status.success());
}

#[test]
fn test_cli_ns_find_and_report_against_fixture() {
    let tree = namespace_tree();
    let env = [("HOST_PROC", tree.root())];

    let output = resmon(&["ns", "find", "net", "100"], &env);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "net:[100] -> PIDs: 1 2\n"
    );

    let output = resmon(&["ns", "report"], &env);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("net:[200] -> PIDs: 3"));

    assert!(!resmon(&["ns", "find", "net", "999"], &env).status.success());
}

#[test]
fn test_cli_monitor_rejects_missing_pid() {
    let tree = ProcTree::new();
    tree.system_ticks(1);
    let output = resmon(&["monitor", "999999", "-n", "1"], &[("HOST_PROC", tree.root())]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_monitor_collects_until_buffer_full() {
    let tree = ProcTree::new();
    tree.system_ticks(1000);
    tree.process(55, 10, 64, 0);
    let out = tempfile::tempdir().unwrap();
    let json = out.path().join("samples.json");

    let output = resmon(
        &[
            "monitor",
            "55",
            "--interval",
            "0.01",
            "-n",
            "2",
            "--output",
            json.to_str().unwrap(),
        ],
        &[("HOST_PROC", tree.root())],
    );
    assert!(output.status.success());

    let samples: serde_json::Value = serde_json::from_slice(&fs::read(&json).unwrap()).unwrap();
    let samples = samples.as_array().unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0]["pid"], 55);
    assert_eq!(samples[0]["rss_kb"], 64);
    assert!(Path::new(&json).exists());
}
