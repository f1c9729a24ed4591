//! File-backed branch registry with optimistic concurrency.
//!
//! The registry is one JSON document holding every tracked branch plus a
//! `version` counter. Writers never edit in place: they load a snapshot,
//! compute a new snapshot, and install it with a compare-and-swap on
//! `version` via [`RegistryStore::save`]. A writer that loses the race gets
//! [`StackError::ConcurrentWriteConflict`] and is expected to reload and
//! recompute; [`RegistryStore::transact`] packages that loop.

use crate::branch::Branch;
use crate::error::{Result, StackError};
use crate::graph::DependencyGraph;
use crate::io;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// RegistryDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub branches: BTreeMap<String, Branch>,
}

impl RegistryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Branch> {
        self.branches.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Branch> {
        self.branches.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// Insert a record keyed by its name. Callers validate first.
    pub fn insert(&mut self, branch: Branch) {
        self.branches.insert(branch.name.clone(), branch);
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.branches.keys().map(|k| k.as_str())
    }

    /// Distinct spec ids referenced by any record.
    pub fn spec_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .branches
            .values()
            .filter_map(|b| b.spec_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn parse(path: &Path, data: &str) -> Result<Self> {
        let mut doc: RegistryDocument =
            serde_json::from_str(data).map_err(|e| StackError::RegistryCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        for (name, branch) in doc.branches.iter_mut() {
            branch.name = name.clone();
        }
        Ok(doc)
    }
}

// ---------------------------------------------------------------------------
// Transaction result
// ---------------------------------------------------------------------------

/// Outcome of [`RegistryStore::transact`].
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    /// Version on disk after the transaction.
    pub version: u64,
    /// False when the closure left the document unchanged and nothing was written.
    pub written: bool,
}

// ---------------------------------------------------------------------------
// RegistryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document. An absent file is an empty document at
    /// version 0.
    pub fn load(&self) -> Result<RegistryDocument> {
        match io::read_optional(&self.path)? {
            Some(data) => RegistryDocument::parse(&self.path, &data),
            None => Ok(RegistryDocument::new()),
        }
    }

    /// Compare-and-swap write. Re-reads the on-disk version immediately
    /// before writing and rejects the write if it differs from
    /// `expected_version`. On success `doc.version` is `expected_version + 1`.
    pub fn save(&self, doc: &mut RegistryDocument, expected_version: u64) -> Result<()> {
        let found = self.load()?.version;
        if found != expected_version {
            return Err(StackError::ConcurrentWriteConflict {
                expected: expected_version,
                found,
            });
        }

        // A persisted document must never contain a cycle.
        DependencyGraph::build(doc).ensure_acyclic()?;

        let mut next = doc.clone();
        next.version = expected_version + 1;
        let data = serde_json::to_string_pretty(&next)?;
        io::atomic_write(&self.path, data.as_bytes())?;
        doc.version = next.version;
        tracing::debug!(path = %self.path.display(), version = doc.version, "registry saved");
        Ok(())
    }

    /// Load, apply `f`, and save, retrying on write conflicts up to
    /// `max_attempts` times. `f` runs once per attempt against a fresh
    /// snapshot, so it must be a pure function of the document it is given.
    ///
    /// When `f` leaves the document unchanged nothing is written.
    pub fn transact<T, F>(&self, max_attempts: u32, mut f: F) -> Result<Committed<T>>
    where
        F: FnMut(&mut RegistryDocument) -> Result<T>,
    {
        let attempts = max_attempts.max(1);
        let mut last_conflict = None;
        for attempt in 1..=attempts {
            let snapshot = self.load()?;
            let mut doc = snapshot.clone();
            let value = f(&mut doc)?;

            if doc == snapshot {
                return Ok(Committed {
                    value,
                    version: snapshot.version,
                    written: false,
                });
            }

            match self.save(&mut doc, snapshot.version) {
                Ok(()) => {
                    return Ok(Committed {
                        value,
                        version: doc.version,
                        written: true,
                    })
                }
                Err(e @ StackError::ConcurrentWriteConflict { .. }) => {
                    tracing::debug!(attempt, error = %e, "registry write conflict, reloading");
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_conflict.unwrap_or(StackError::ConcurrentWriteConflict {
            expected: 0,
            found: 0,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
