// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod anomaly;
pub mod cgroup;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod export;
mod kv;
pub mod monitor;
pub mod namespace;
pub mod procfs;
pub mod rates;
pub mod sampler;

pub use errors::{Error, ErrorKind, Result};
pub use kv::{Grammar, KeyValues, parse_key_values, read_key_values, read_scalar};
pub use monitor::{Monitor, MonitorOptions};
pub use procfs::ProcFs;
