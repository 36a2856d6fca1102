// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use crate::sampler::ProcessSample;

/// Elapsed time below this is clamped up to it, which also covers duplicate
/// and out-of-order timestamps.
pub const MIN_ELAPSED_SECS: f64 = 1.0;

/// Per-second delta of a monotonic counter. A counter that went backwards
/// (PID reuse) yields 0.
pub fn rate(current: u64, previous: u64, elapsed_secs: f64) -> f64 {
    current.saturating_sub(previous) as f64 / elapsed_secs.max(MIN_ELAPSED_SECS)
}

/// Fills the `*_per_second` fields of `current` relative to `previous`, the
/// immediately preceding sample of the same PID. Without a usable previous
/// sample every rate is 0. A sample whose I/O counters were zero-filled is
/// never a usable baseline, on either side of the delta.
///
/// Returns whether the rates were derived from a real delta.
pub fn apply_rates(current: &mut ProcessSample, previous: Option<&ProcessSample>) -> bool {
    let baseline = previous.filter(|p| p.pid == current.pid && !p.io_missing);
    let (Some(previous), false) = (baseline, current.io_missing) else {
        current.rchar_per_second = 0.0;
        current.wchar_per_second = 0.0;
        current.read_bytes_per_second = 0.0;
        current.write_bytes_per_second = 0.0;
        current.syscalls_per_second = 0.0;
        return false;
    };

    let elapsed = current.timestamp - previous.timestamp;
    current.rchar_per_second = rate(current.rchar, previous.rchar, elapsed);
    current.wchar_per_second = rate(current.wchar, previous.wchar, elapsed);
    current.read_bytes_per_second = rate(current.read_bytes, previous.read_bytes, elapsed);
    current.write_bytes_per_second = rate(current.write_bytes, previous.write_bytes, elapsed);
    current.syscalls_per_second = rate(current.syscalls, previous.syscalls, elapsed);
    true
}
