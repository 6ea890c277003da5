//! Persistent session state between CLI invocations.
//!
//! Detection is recomputed on every run, so the session only stores what the
//! user decided: manual crops, removed items, setting overrides, and where
//! export numbering continues.
//!
//! ## Keys
//!
//! Entries are keyed by the item's relative source path and carry the
//! SHA-256 of the file they were made against. An override or removal only
//! applies while the hash still matches, so replacing a scan with a new file
//! of the same name starts it fresh.
//!
//! ## Storage
//!
//! JSON at `<temp_dir>/session.json`. A missing, corrupt, or
//! version-mismatched file loads as an empty session.

use crate::batch::{BatchEvent, BatchState, ImageItem};
use crate::crop::{Edge, Offsets};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const SESSION_FILENAME: &str = "session.json";

/// Bump when the format changes incompatibly.
const SESSION_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManualCrop {
    pub source_hash: String,
    pub offsets: Offsets,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub version: u32,
    /// Relative source path → manual crop.
    #[serde(default)]
    pub manual: BTreeMap<String, ManualCrop>,
    /// Relative source path → hash of the removed file.
    #[serde(default)]
    pub removed: BTreeMap<String, String>,
    #[serde(default)]
    pub threshold: Option<i64>,
    #[serde(default)]
    pub match_first: Option<bool>,
    /// Index the next export starts at.
    #[serde(default)]
    pub next_index: Option<i64>,
}

/// What [`Session::restore`] re-applied.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RestoreStats {
    pub manual: usize,
    pub removed: usize,
    /// Overrides dropped because the source file changed.
    pub stale: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::empty()
    }
}

impl Session {
    pub fn empty() -> Self {
        Self {
            version: SESSION_VERSION,
            manual: BTreeMap::new(),
            removed: BTreeMap::new(),
            threshold: None,
            match_first: None,
            next_index: None,
        }
    }

    /// Load from `temp_dir`. Never fails: anything unusable yields an empty session.
    pub fn load(temp_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(session_path(temp_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let session: Self = match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(_) => return Self::empty(),
        };
        if session.version != SESSION_VERSION {
            return Self::empty();
        }
        session
    }

    pub fn save(&self, temp_dir: &Path) -> Result<(), SessionError> {
        std::fs::create_dir_all(temp_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(session_path(temp_dir), json)?;
        Ok(())
    }

    /// Replace stored manual crops with the batch's current ones.
    pub fn capture(&mut self, batch: &BatchState) {
        self.manual = batch
            .items()
            .iter()
            .filter(|item| item.is_manual)
            .map(|item| {
                (
                    item.name.clone(),
                    ManualCrop {
                        source_hash: item.source_hash.clone(),
                        offsets: item.current_offsets,
                    },
                )
            })
            .collect();
    }

    /// Remember that `item` was removed so later runs drop it too.
    pub fn mark_removed(&mut self, item: &ImageItem) {
        self.manual.remove(&item.name);
        self.removed.insert(item.name.clone(), item.source_hash.clone());
    }

    /// Re-apply removals and manual crops to a freshly loaded batch.
    ///
    /// Manual crops are replayed as edge edits, so a stored crop that no
    /// longer fits its image is repaired by the edit rule instead of trusted.
    /// Removals whose file is gone or has changed are forgotten.
    pub fn restore(&mut self, batch: &mut BatchState) -> RestoreStats {
        let mut stats = RestoreStats::default();

        let loaded: BTreeMap<&str, &str> = batch
            .items()
            .iter()
            .map(|item| (item.name.as_str(), item.source_hash.as_str()))
            .collect();
        self.removed
            .retain(|name, hash| loaded.get(name.as_str()) == Some(&hash.as_str()));

        let removals: Vec<_> = batch
            .items()
            .iter()
            .filter(|item| self.removed.contains_key(&item.name))
            .map(|item| item.id)
            .collect();
        for id in removals {
            // Ids come straight from the batch, so removal cannot miss.
            if batch.apply(BatchEvent::Remove(id)).is_ok() {
                stats.removed += 1;
            }
        }

        let mut replays = Vec::new();
        for item in batch.items() {
            match self.manual.get(&item.name) {
                Some(crop) if crop.source_hash == item.source_hash => {
                    replays.push((item.id, crop.offsets));
                }
                Some(_) => stats.stale += 1,
                None => {}
            }
        }
        for (id, offsets) in replays {
            let mut events = vec![BatchEvent::SetManual { id, manual: true }];
            events.extend(Edge::ALL.into_iter().map(|edge| BatchEvent::Edit {
                id,
                edge,
                value: i64::from(offsets.get(edge)),
            }));
            if events.into_iter().all(|event| batch.apply(event).is_ok()) {
                stats.manual += 1;
            }
        }

        debug!(?stats, "restored session");
        stats
    }
}

pub fn session_path(temp_dir: &Path) -> PathBuf {
    temp_dir.join(SESSION_FILENAME)
}
