// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use crate::anomaly::Anomaly;
use crate::errors::Error;
use crate::sampler::ProcessSample;

const CSV_HEADER: [&str; 21] = [
    "pid",
    "timestamp",
    "cpu_percent",
    "threads",
    "voluntary_ctxt",
    "involuntary_ctxt",
    "rss_kb",
    "vmsize_kb",
    "minor_faults",
    "major_faults",
    "swap_kb",
    "rchar",
    "wchar",
    "read_bytes",
    "write_bytes",
    "syscalls",
    "rchar_per_second",
    "wchar_per_second",
    "read_bytes_per_second",
    "write_bytes_per_second",
    "syscalls_per_second",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

impl Format {
    /// Picks the format from the file extension, CSV unless it is `.json`.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Csv,
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            other => Err(Error::InvalidSubject {
                context: format!("unknown export format {other:?}"),
            }),
        }
    }
}

pub fn write_samples<W: Write>(writer: W, format: Format, samples: &[ProcessSample]) -> io::Result<()> {
    match format {
        Format::Csv => write_csv(writer, samples),
        Format::Json => write_json(writer, samples),
    }
}

pub fn write_csv<W: Write>(mut writer: W, samples: &[ProcessSample]) -> io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER.join(","))?;
    for s in samples {
        writeln!(
            writer,
            "{},{:.3},{:.2},{},{},{},{},{},{},{},{},{},{},{},{},{},{:.2},{:.2},{:.2},{:.2},{:.2}",
            s.pid,
            s.timestamp,
            s.cpu_percent,
            s.threads,
            s.voluntary_ctxt,
            s.involuntary_ctxt,
            s.rss_kb,
            s.vmsize_kb,
            s.minor_faults,
            s.major_faults,
            s.swap_kb,
            s.rchar,
            s.wchar,
            s.read_bytes,
            s.write_bytes,
            s.syscalls,
            s.rchar_per_second,
            s.wchar_per_second,
            s.read_bytes_per_second,
            s.write_bytes_per_second,
            s.syscalls_per_second,
        )?;
    }
    writer.flush()
}

pub fn write_json<W: Write>(mut writer: W, samples: &[ProcessSample]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, samples)?;
    writeln!(writer)?;
    writer.flush()
}

/// One JSON object per line with keys `timestamp`, `metric`, `value`, `z`.
pub fn write_anomalies<W: Write>(mut writer: W, anomalies: &[Anomaly]) -> io::Result<()> {
    for anomaly in anomalies {
        serde_json::to_writer(&mut writer, anomaly)?;
        writeln!(writer)?;
    }
    writer.flush()
}
