// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::HashSet;

use log::{debug, warn};

use crate::errors::{Error, ErrorKind};

/// Reports read failures once per (subject, source, kind) at `warn`; repeats
/// go to `debug` so a vanished subject does not flood the log every tick.
#[derive(Debug, Default)]
pub struct Diagnostics {
    seen: HashSet<(String, &'static str, ErrorKind)>,
    reported: usize,
}

impl Diagnostics {
    pub fn report(&mut self, subject: &str, source: &'static str, err: &Error) {
        self.reported += 1;
        if self.seen.insert((subject.to_string(), source, err.kind())) {
            warn!("{subject}: failed to read {source}: {err}");
        } else {
            debug!("{subject}: failed to read {source} again: {err}");
        }
    }

    /// Total failures reported, repeats included.
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// Distinct (subject, source, kind) failures seen.
    pub fn distinct(&self) -> usize {
        self.seen.len()
    }
}
