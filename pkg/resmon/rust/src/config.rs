// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::anomaly::{DEFAULT_THRESHOLD, validate_threshold};
use crate::cgroup::manager::DEFAULT_BASE;
use crate::monitor::DEFAULT_MAX_SAMPLES;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/resmon/resmon.yaml";

fn default_interval_secs() -> f64 {
    1.0
}

fn default_max_samples() -> usize {
    DEFAULT_MAX_SAMPLES
}

fn default_anomaly_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_cgroup_root() -> PathBuf {
    PathBuf::from(DEFAULT_BASE)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,
    #[serde(default = "default_cgroup_root")]
    pub cgroup_root: PathBuf,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_samples: default_max_samples(),
            anomaly_threshold: default_anomaly_threshold(),
            cgroup_root: default_cgroup_root(),
            log_level: None,
        }
    }
}

/// Loads the YAML config file. A missing file yields the defaults; a file
/// that exists but does not parse, or sets an unusable anomaly threshold, is
/// an error.
pub fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = if path.exists() {
        parse_config(&path)?
    } else {
        warn!(
            "Config file not found at {}. Using defaults.",
            path.display()
        );
        Config::default()
    };

    if let Ok(root) = env::var("RESMON_CGROUP_ROOT")
        && !root.is_empty()
    {
        config.cgroup_root = PathBuf::from(root);
    }

    Ok(config)
}

fn parse_config(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    // an empty document is valid and means "all defaults"
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }

    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse YAML config {}", path.display()))?;
    validate_threshold(config.anomaly_threshold)
        .with_context(|| format!("Invalid anomaly_threshold in {}", path.display()))?;
    Ok(config)
}

pub fn parse_log_level(level: &str) -> log::Level {
    match level.to_lowercase().as_str() {
        "trace" => log::Level::Trace,
        "debug" => log::Level::Debug,
        "info" => log::Level::Info,
        "warn" | "warning" => log::Level::Warn,
        "error" | "critical" => log::Level::Error,
        "off" => log::Level::Error, // log has no "off" level
        _ => log::Level::Info,
    }
}

/// Priority: RESMON_LOG_LEVEL > LOG_LEVEL > YAML config > default Info
pub fn get_log_level(config: &Config) -> log::Level {
    if let Ok(level) = env::var("RESMON_LOG_LEVEL") {
        return parse_log_level(&level);
    }

    if let Ok(level) = env::var("LOG_LEVEL") {
        return parse_log_level(&level);
    }

    config
        .log_level
        .as_deref()
        .map(parse_log_level)
        .unwrap_or(log::Level::Info)
}
