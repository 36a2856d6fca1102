// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Fixed-interval monitoring session for one PID.
//!
//! A [`Monitor`] owns every piece of state that survives between ticks: the
//! CPU baseline, the anomaly accumulators and the sample buffer. Nothing is
//! shared, so several monitors can run side by side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::anomaly::{Anomaly, AnomalyDetector, DEFAULT_THRESHOLD, validate_threshold};
use crate::diagnostics::Diagnostics;
use crate::errors::{Error, Result};
use crate::procfs::ProcFs;
use crate::rates::apply_rates;
use crate::sampler::{CpuBaseline, ProcessSample, ProcessSampler};

pub const DEFAULT_MAX_SAMPLES: usize = 3600;

pub const CPU_METRIC: &str = "cpu_percent";
pub const WRITE_RATE_METRIC: &str = "write_bytes_per_second";

/// Append-only sample storage with a hard cap.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Vec<ProcessSample>,
    capacity: usize,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidSubject {
                context: "sample buffer capacity must be positive".to_string(),
            });
        }
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(capacity)
            .map_err(|e| Error::InvalidSubject {
                context: format!("cannot allocate a buffer for {capacity} samples: {e}"),
            })?;
        Ok(Self { samples, capacity })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Returns false, and drops the sample, once the buffer is full.
    pub fn push(&mut self, sample: ProcessSample) -> bool {
        if self.is_full() {
            return false;
        }
        self.samples.push(sample);
        true
    }

    pub fn last(&self) -> Option<&ProcessSample> {
        self.samples.last()
    }

    pub fn samples(&self) -> &[ProcessSample] {
        &self.samples
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorOptions {
    pub max_samples: usize,
    pub threshold: f64,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Recorded,
    /// The sample hit an unexpected I/O error and was discarded.
    Dropped,
    BufferFull,
}

#[derive(Debug)]
pub struct Monitor {
    pid: i32,
    sampler: ProcessSampler,
    baseline: CpuBaseline,
    detector: AnomalyDetector,
    buffer: SampleBuffer,
    diagnostics: Diagnostics,
}

impl Monitor {
    /// Fails with `InvalidSubject` when `pid` is not a live process of
    /// `procfs` at startup, or when the options are unusable. Later
    /// disappearance only zero-fills samples.
    pub fn new(procfs: ProcFs, pid: i32, options: MonitorOptions) -> Result<Self> {
        let threshold = validate_threshold(options.threshold)?;
        if pid <= 0 {
            return Err(Error::InvalidSubject {
                context: format!("pid must be positive, got {pid}"),
            });
        }
        if !procfs.exists(pid) {
            return Err(Error::InvalidSubject {
                context: format!("no process with pid {pid} under {}", procfs.root().display()),
            });
        }

        Ok(Self {
            pid,
            sampler: ProcessSampler::new(procfs),
            baseline: CpuBaseline::new(),
            detector: AnomalyDetector::new(threshold),
            buffer: SampleBuffer::with_capacity(options.max_samples)?,
            diagnostics: Diagnostics::default(),
        })
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn tick(&mut self, timestamp: f64) -> Tick {
        if self.buffer.is_full() {
            return Tick::BufferFull;
        }

        let mut sample =
            match self
                .sampler
                .sample(self.pid, timestamp, &mut self.baseline, &mut self.diagnostics)
            {
                Ok(sample) => sample,
                Err(e) => {
                    debug!("pid {}: dropping sample at {timestamp:.3}: {e}", self.pid);
                    return Tick::Dropped;
                }
            };

        // zero-filled sources are placeholders, not observations
        let derived = apply_rates(&mut sample, self.buffer.last());
        if !sample.cpu_missing {
            self.detector.observe(CPU_METRIC, timestamp, sample.cpu_percent);
        }
        if derived {
            self.detector
                .observe(WRITE_RATE_METRIC, timestamp, sample.write_bytes_per_second);
        }

        if self.buffer.push(sample) {
            Tick::Recorded
        } else {
            Tick::BufferFull
        }
    }

    /// Sleeps `interval`, samples, and repeats until `stop` is set or the
    /// buffer is full. Returns the number of samples collected.
    pub fn run(&mut self, stop: &AtomicBool, interval: Duration) -> usize {
        info!(
            "monitoring pid {} every {:.1}s (up to {} samples)",
            self.pid,
            interval.as_secs_f64(),
            self.buffer.capacity()
        );

        while !stop.load(Ordering::Relaxed) {
            thread::sleep(interval);
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if self.tick(now_secs()) == Tick::BufferFull {
                warn!(
                    "sample buffer full after {} samples, stopping",
                    self.buffer.len()
                );
                break;
            }
        }

        info!(
            "collected {} samples, {} anomalies, {} read failures",
            self.buffer.len(),
            self.detector.anomalies().len(),
            self.diagnostics.reported()
        );
        self.buffer.len()
    }

    pub fn samples(&self) -> &[ProcessSample] {
        self.buffer.samples()
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        self.detector.anomalies()
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

/// Seconds since the Unix epoch; 0 if the clock is before it.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
