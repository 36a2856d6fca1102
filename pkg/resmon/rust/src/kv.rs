// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Key/value scanning of kernel pseudo-files.
//!
//! Kernel accounting files come in two shapes:
//!
//! - [`Grammar::Columns`]: one `KEY VALUE...` pair per line, where the key may
//!   carry a trailing colon (`/proc/<pid>/status`, `/proc/<pid>/io`,
//!   `cpu.stat`, `memory.stat`). A repeated key overwrites the earlier value.
//! - [`Grammar::Assignments`]: any number of `KEY=VALUE` tokens anywhere on a
//!   line, repeated once per device (`io.stat`). Every occurrence of a key is
//!   summed into the same accumulator.
//!
//! Only the keys the caller asks for are retained. Values that do not parse
//! as unsigned integers are skipped and leave the key at its default.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::trace;
use nom::{
    IResult, Parser,
    bytes::complete::take_till1,
    character::complete::{char, space0, space1},
};

use crate::errors::{Error, Result};

const READ_LIMIT: u64 = 1024 * 1024; // 1 MiB

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Columns,
    Assignments,
}

/// Accumulated values for the recognized keys of one file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyValues {
    values: HashMap<String, u64>,
}

impl KeyValues {
    /// Value for `key`, or 0 when the key never appeared.
    pub fn get(&self, key: &str) -> u64 {
        self.get_or(key, 0)
    }

    pub fn get_or(&self, key: &str, default: u64) -> u64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn record(&mut self, grammar: Grammar, key: &str, value: u64) {
        match grammar {
            Grammar::Columns => {
                self.values.insert(key.to_string(), value);
            }
            Grammar::Assignments => {
                let acc = self.values.entry(key.to_string()).or_insert(0);
                *acc = acc.saturating_add(value);
            }
        }
    }
}

/// Reads `path` and collects the `recognized` keys using `grammar`.
pub fn read_key_values(path: &Path, grammar: Grammar, recognized: &[&str]) -> Result<KeyValues> {
    let file = File::open(path).map_err(|e| Error::from_io(path, e))?;
    parse_key_values(BufReader::new(file.take(READ_LIMIT)), grammar, recognized)
        .map_err(|e| Error::from_io(path, e))
}

/// Scans already-opened content. Split out from [`read_key_values`] so the
/// grammars can be exercised without touching the filesystem.
pub fn parse_key_values<R: BufRead>(
    mut reader: R,
    grammar: Grammar,
    recognized: &[&str],
) -> std::io::Result<KeyValues> {
    let mut result = KeyValues::default();
    let mut raw = Vec::with_capacity(256);

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        // process names in status are arbitrary bytes
        let line = String::from_utf8_lossy(&raw);

        match grammar {
            Grammar::Columns => {
                if let Ok((_, (key, value))) = column_pair(&line) {
                    accept(&mut result, grammar, recognized, key, value);
                }
            }
            Grammar::Assignments => {
                for token in line.split_whitespace() {
                    if let Ok((_, (key, value))) = assignment(token) {
                        accept(&mut result, grammar, recognized, key, value);
                    }
                }
            }
        }
    }

    Ok(result)
}

/// Reads a file holding a single unsigned integer, such as `memory.current`.
pub fn read_scalar(path: &Path) -> Result<u64> {
    let mut raw = Vec::new();
    File::open(path)
        .and_then(|f| f.take(READ_LIMIT).read_to_end(&mut raw))
        .map_err(|e| Error::from_io(path, e))?;

    let contents = String::from_utf8_lossy(&raw);
    let trimmed = contents.trim();
    trimmed
        .parse::<u64>()
        .map_err(|_| Error::malformed(path, format!("expected integer, found {trimmed:?}")))
}

fn accept(result: &mut KeyValues, grammar: Grammar, recognized: &[&str], key: &str, value: &str) {
    if !recognized.contains(&key) {
        return;
    }
    match value.parse::<u64>() {
        Ok(value) => result.record(grammar, key, value),
        Err(_) => trace!("ignoring non-numeric value {value:?} for key {key}"),
    }
}

fn column_pair(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = space0(input)?;
    let (input, key) = take_till1(|c: char| c.is_whitespace()).parse(input)?;
    let (input, _) = space1(input)?;
    let (input, value) = take_till1(|c: char| c.is_whitespace()).parse(input)?;
    Ok((input, (key.trim_end_matches(':'), value)))
}

fn assignment(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, key) = take_till1(|c: char| c == '=' || c.is_whitespace()).parse(input)?;
    let (input, _) = char('=').parse(input)?;
    let (input, value) = take_till1(|c: char| c.is_whitespace()).parse(input)?;
    Ok((input, (key, value)))
}
