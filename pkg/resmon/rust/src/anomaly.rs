// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Online z-score anomaly detection over scalar series.
//!
//! Each series keeps a Welford accumulator. A new point is scored against the
//! statistics of the points seen *before* it and only then folded in, so a
//! spike is never compared against itself.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::errors::{Error, Result};

pub const DEFAULT_THRESHOLD: f64 = 3.0;

/// Accepts only finite, strictly positive z-score thresholds.
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if threshold.is_finite() && threshold > 0.0 {
        Ok(threshold)
    } else {
        Err(Error::InvalidSubject {
            context: format!("anomaly threshold must be a positive number, got {threshold}"),
        })
    }
}

/// Welford's running mean and variance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Sample variance; 0 with fewer than two observations.
    pub fn variance(&self) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Z-score of `x` against the current statistics, without updating them.
    pub fn zscore(&self, x: f64) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let std_dev = self.std_dev();
        if std_dev <= 0.0 {
            return 0.0;
        }
        (x - self.mean) / std_dev
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub timestamp: f64,
    pub metric: String,
    pub value: f64,
    #[serde(rename = "z")]
    pub zscore: f64,
}

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    threshold: f64,
    series: BTreeMap<String, RunningStats>,
    anomalies: Vec<Anomaly>,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AnomalyDetector {
    /// `threshold` is expected to have passed [`validate_threshold`].
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            series: BTreeMap::new(),
            anomalies: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scores `value` for `metric`, records an [`Anomaly`] when
    /// `|z| >= threshold`, then folds the value into the series statistics.
    pub fn observe(&mut self, metric: &str, timestamp: f64, value: f64) -> f64 {
        let stats = self.series.entry(metric.to_string()).or_default();

        let zscore = stats.zscore(value);
        if stats.count() >= 2 && zscore.abs() >= self.threshold {
            info!("anomaly in {metric}: value {value:.2} at {timestamp:.0} (z = {zscore:.2})");
            self.anomalies.push(Anomaly {
                timestamp,
                metric: metric.to_string(),
                value,
                zscore,
            });
        }

        stats.update(value);
        zscore
    }

    pub fn stats(&self, metric: &str) -> Option<&RunningStats> {
        self.series.get(metric)
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn anomalies_for<'a>(&'a self, metric: &'a str) -> impl Iterator<Item = &'a Anomaly> + 'a {
        self.anomalies.iter().filter(move |a| a.metric == metric)
    }
}
