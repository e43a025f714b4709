//! Subsystem registration — centralizes all DB initialization functions.
//!
//! Adding a new subsystem: append one entry to `SUBSYSTEMS`.

use crate::core::error;
use crate::plugins::{activity, ledger, progression, tasks};
use std::path::Path;

pub(crate) struct SubsystemInit {
    /// Subsystem identifier (used for diagnostics).
    #[allow(dead_code)]
    pub name: &'static str,
    pub initialize_db: fn(&Path) -> Result<(), error::QuestlineError>,
}

/// All subsystems that require database initialization.
/// Sequential execution avoids SQLite contention during bootstrap.
pub(crate) const SUBSYSTEMS: &[SubsystemInit] = &[
    SubsystemInit { name: "ledger", initialize_db: ledger::initialize_ledger_db },
    SubsystemInit { name: "progression", initialize_db: progression::initialize_progression_db },
    SubsystemInit { name: "tasks", initialize_db: tasks::initialize_tasks_db },
    SubsystemInit { name: "activity", initialize_db: activity::initialize_activity_db },
];

/// Initialize all subsystem databases sequentially.
pub fn initialize_all_dbs(data_root: &Path) -> Result<(), error::QuestlineError> {
    for sub in SUBSYSTEMS {
        (sub.initialize_db)(data_root)?;
    }
    Ok(())
}
