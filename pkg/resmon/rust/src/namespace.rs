// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Namespace membership of processes, per PID and system-wide.
//!
//! Every `/proc/<pid>/ns/<type>` handle is a symbolic link whose target looks
//! like `net:[4026531992]`; the bracketed number identifies the namespace
//! instance. Equal identities mean a shared isolation context.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::str::FromStr;

use log::debug;
use nom::{
    IResult, Parser,
    bytes::complete::take_till1,
    character::complete::{char, digit1},
    combinator::eof,
};
use serde::Serialize;

use crate::errors::{Error, Result};
use crate::procfs::ProcFs;

pub type NamespaceId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceType {
    Mnt,
    Uts,
    Ipc,
    Net,
    Pid,
    Cgroup,
    User,
}

impl NamespaceType {
    pub const COUNT: usize = 7;

    pub const ALL: [NamespaceType; Self::COUNT] = [
        NamespaceType::Mnt,
        NamespaceType::Uts,
        NamespaceType::Ipc,
        NamespaceType::Net,
        NamespaceType::Pid,
        NamespaceType::Cgroup,
        NamespaceType::User,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NamespaceType::Mnt => "mnt",
            NamespaceType::Uts => "uts",
            NamespaceType::Ipc => "ipc",
            NamespaceType::Net => "net",
            NamespaceType::Pid => "pid",
            NamespaceType::Cgroup => "cgroup",
            NamespaceType::User => "user",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for NamespaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NamespaceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NamespaceType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| Error::InvalidSubject {
                context: format!("unknown namespace type {s:?}"),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NamespaceEntry {
    #[serde(rename = "type")]
    pub ns_type: NamespaceType,
    pub id: NamespaceId,
}

impl fmt::Display for NamespaceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}]", self.ns_type, self.id)
    }
}

/// At most one identity per namespace type, iterated in type order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamespaceSet {
    ids: [Option<NamespaceId>; NamespaceType::COUNT],
}

impl NamespaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry`, returning the identity previously held for its type.
    pub fn insert(&mut self, entry: NamespaceEntry) -> Option<NamespaceId> {
        self.ids
            .get_mut(entry.ns_type.slot())
            .and_then(|slot| slot.replace(entry.id))
    }

    pub fn get(&self, ns_type: NamespaceType) -> Option<NamespaceId> {
        self.ids.get(ns_type.slot()).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.ids.iter().filter(|id| id.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = NamespaceEntry> + '_ {
        NamespaceType::ALL.into_iter().filter_map(|ns_type| {
            self.get(ns_type)
                .map(|id| NamespaceEntry { ns_type, id })
        })
    }
}

impl FromIterator<NamespaceEntry> for NamespaceSet {
    fn from_iter<I: IntoIterator<Item = NamespaceEntry>>(iter: I) -> Self {
        let mut set = NamespaceSet::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Comparison {
    Shared { id: NamespaceId },
    Diverged { first: NamespaceId, second: NamespaceId },
    OnlyInFirst { id: NamespaceId },
    OnlyInSecond { id: NamespaceId },
}

/// Classifies every namespace type present in either set.
pub fn compare_sets(first: &NamespaceSet, second: &NamespaceSet) -> Vec<(NamespaceType, Comparison)> {
    NamespaceType::ALL
        .into_iter()
        .filter_map(|ns_type| {
            let comparison = match (first.get(ns_type), second.get(ns_type)) {
                (Some(a), Some(b)) if a == b => Comparison::Shared { id: a },
                (Some(a), Some(b)) => Comparison::Diverged {
                    first: a,
                    second: b,
                },
                (Some(a), None) => Comparison::OnlyInFirst { id: a },
                (None, Some(b)) => Comparison::OnlyInSecond { id: b },
                (None, None) => return None,
            };
            Some((ns_type, comparison))
        })
        .collect()
}

/// Reverse index from namespace instance to member PIDs, plus the set each
/// scanned PID resolved to.
#[derive(Debug, Clone, Default)]
pub struct NamespaceIndex {
    members: BTreeMap<NamespaceEntry, BTreeSet<i32>>,
    processes: BTreeMap<i32, NamespaceSet>,
}

impl NamespaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: i32, set: NamespaceSet) {
        for entry in set.iter() {
            self.members.entry(entry).or_default().insert(pid);
        }
        self.processes.insert(pid, set);
    }

    pub fn pids(&self, entry: &NamespaceEntry) -> Option<&BTreeSet<i32>> {
        self.members.get(entry)
    }

    pub fn namespaces_of(&self, pid: i32) -> Option<&NamespaceSet> {
        self.processes.get(&pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NamespaceEntry, &BTreeSet<i32>)> {
        self.members.iter()
    }

    /// Number of distinct namespace instances.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }
}

impl fmt::Display for NamespaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pid, set) in &self.processes {
            writeln!(f, "Namespaces of pid {pid}:")?;
            for entry in set.iter() {
                writeln!(f, "  {entry}")?;
            }
        }
        for (entry, pids) in &self.members {
            write!(f, "{entry} -> PIDs:")?;
            for pid in pids {
                write!(f, " {pid}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl ProcFs {
    pub fn namespace_id(&self, pid: i32, ns_type: NamespaceType) -> Result<NamespaceId> {
        let path = self.pid_dir(pid).join("ns").join(ns_type.name());
        let target = fs::read_link(&path).map_err(|e| Error::from_io(&path, e))?;
        let target = target.to_string_lossy();

        match link_target(&target) {
            Ok((_, (name, id))) if name == ns_type.name() => id
                .parse::<NamespaceId>()
                .map_err(|e| Error::malformed(&path, format!("bad identity {id:?}: {e}"))),
            _ => Err(Error::malformed(
                &path,
                format!("unexpected link target {target:?}"),
            )),
        }
    }

    /// Resolves every namespace type of `pid`. Types whose handle cannot be
    /// resolved are left out; only a missing or unreadable `ns` directory is
    /// an error.
    pub fn list_namespaces(&self, pid: i32) -> Result<NamespaceSet> {
        let ns_dir = self.pid_dir(pid).join("ns");
        fs::symlink_metadata(&ns_dir).map_err(|e| Error::from_io(&ns_dir, e))?;

        let mut set = NamespaceSet::new();
        for ns_type in NamespaceType::ALL {
            match self.namespace_id(pid, ns_type) {
                Ok(id) => {
                    set.insert(NamespaceEntry { ns_type, id });
                }
                Err(e) => debug!("pid {pid}: skipping {ns_type} namespace: {e}"),
            }
        }
        Ok(set)
    }

    pub fn compare_namespaces(
        &self,
        first: i32,
        second: i32,
    ) -> Result<Vec<(NamespaceType, Comparison)>> {
        let a = self.list_namespaces(first)?;
        let b = self.list_namespaces(second)?;
        Ok(compare_sets(&a, &b))
    }

    /// Best-effort snapshot of namespace membership across the process table.
    /// Processes that exit mid-scan are skipped.
    pub fn build_namespace_index(&self) -> Result<NamespaceIndex> {
        let mut index = NamespaceIndex::new();
        for pid in self.pids()? {
            match self.list_namespaces(pid) {
                Ok(set) => index.insert(pid, set),
                Err(e) => debug!("pid {pid}: skipped in namespace scan: {e}"),
            }
        }
        Ok(index)
    }

    /// PIDs whose `ns_type` handle resolves to `id`, ascending.
    pub fn find_processes_in_namespace(
        &self,
        ns_type: NamespaceType,
        id: NamespaceId,
    ) -> Result<Vec<i32>> {
        Ok(self
            .pids()?
            .into_iter()
            .filter(|pid| self.namespace_id(*pid, ns_type).is_ok_and(|found| found == id))
            .collect())
    }
}

fn link_target(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, name) = take_till1(|c: char| c == ':').parse(input)?;
    let (input, _) = char(':').parse(input)?;
    let (input, _) = char('[').parse(input)?;
    let (input, id) = digit1(input)?;
    let (input, _) = char(']').parse(input)?;
    let (input, _) = eof(input)?;
    Ok((input, (name, id)))
}
