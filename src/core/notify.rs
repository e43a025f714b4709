//! Fire-and-forget notification sink.
//!
//! Reward grants and level-ups may emit an event for downstream surfaces
//! (in-app inbox, webhooks). Delivery failure never rolls back the ledger
//! mutation that produced the event; a failed emit is reported on stderr
//! and dropped.

use crate::core::time;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    RewardGranted {
        user_id: String,
        task_key: String,
        amount: i64,
    },
    LeveledUp {
        user_id: String,
        old_level: i64,
        new_level: i64,
    },
}

pub trait NotifySink {
    /// Must not return an error to the caller's control flow; implementors
    /// handle their own failures.
    fn emit(&self, event: &NotifyEvent);
}

/// Default sink: appends JSONL events next to the broker audit log.
pub struct JsonlNotifySink {
    log_path: PathBuf,
}

impl JsonlNotifySink {
    pub fn new(root: &Path) -> Self {
        Self {
            log_path: root.join("notify.events.jsonl"),
        }
    }
}

impl NotifySink for JsonlNotifySink {
    fn emit(&self, event: &NotifyEvent) {
        use std::fs::OpenOptions;
        use std::io::Write;

        let line = serde_json::json!({
            "ts": time::now_iso(),
            "event_id": time::new_event_id(),
            "payload": event,
        });

        let res = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .and_then(|mut f| writeln!(f, "{}", line));
        if let Err(e) = res {
            eprintln!("notify: dropped event ({})", e);
        }
    }
}

/// Sink that swallows everything. Used where no delivery surface exists.
pub struct NullNotifySink;

impl NotifySink for NullNotifySink {
    fn emit(&self, _event: &NotifyEvent) {}
}
