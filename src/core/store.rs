//! Store handle for a Questline state workspace.
//!
//! A Store is a logical container for the rewards database and its JSONL
//! event logs. All subsystem state (ledger, progression, task claims,
//! activity) is scoped to a store root directory.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory
    pub root: PathBuf,
}

impl Store {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}
