//! Activity counters: the read-only seam to the content site's stores.
//!
//! Task progress is measured by counting a user's activity (comments,
//! resource uploads, character creations, favorites). In production those
//! counts come from the catalogue's own stores; the `ActivityCounter` trait
//! is the seam, and `SqliteActivityCounter` is the default implementation
//! backed by the local `activity_event` table.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::QuestlineError;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub fn initialize_activity_db(root: &Path) -> Result<(), QuestlineError> {
    let broker = DbBroker::new(root);
    let db_path = db::rewards_db_path(root);

    broker.with_conn(&db_path, "questline", "activity.init", |conn| {
        conn.execute(schemas::ACTIVITY_DB_SCHEMA_EVENTS, [])?;
        conn.execute(schemas::ACTIVITY_DB_SCHEMA_INDEX_EVENTS_USER, [])?;
        Ok(())
    })
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Comment,
    ResourceUpload,
    CharacterCreation,
    Favorite,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Comment => "comment",
            ActivityKind::ResourceUpload => "resource_upload",
            ActivityKind::CharacterCreation => "character_creation",
            ActivityKind::Favorite => "favorite",
        }
    }

    pub fn parse(s: &str) -> Result<Self, QuestlineError> {
        match s {
            "comment" => Ok(ActivityKind::Comment),
            "resource_upload" => Ok(ActivityKind::ResourceUpload),
            "character_creation" => Ok(ActivityKind::CharacterCreation),
            "favorite" => Ok(ActivityKind::Favorite),
            other => Err(QuestlineError::ValidationError(format!(
                "unknown activity kind: {}",
                other
            ))),
        }
    }
}

/// Read-only count of a user's activity, optionally windowed.
///
/// Implementations have no side effects and may be retried freely.
pub trait ActivityCounter {
    fn count(
        &self,
        user_id: &str,
        kind: ActivityKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, QuestlineError>;
}

/// Default counter backed by the local `activity_event` table.
pub struct SqliteActivityCounter {
    store: Store,
}

impl SqliteActivityCounter {
    pub fn new(store: &Store) -> Self {
        Self {
            store: store.clone(),
        }
    }
}

impl ActivityCounter for SqliteActivityCounter {
    fn count(
        &self,
        user_id: &str,
        kind: ActivityKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, QuestlineError> {
        let broker = DbBroker::new(&self.store.root);
        let db_path = db::rewards_db_path(&self.store.root);
        broker.with_conn(&db_path, "questline", "activity.count", |conn| {
            let count = match since {
                Some(since) => conn.query_row(
                    "SELECT COUNT(*) FROM activity_event
                     WHERE user_id = ?1 AND kind = ?2 AND created_at >= ?3",
                    params![user_id, kind.as_str(), time::to_iso(since)],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM activity_event WHERE user_id = ?1 AND kind = ?2",
                    params![user_id, kind.as_str()],
                    |row| row.get(0),
                )?,
            };
            Ok(count)
        })
    }
}

/// Record one activity event at an explicit instant.
pub fn record_activity(
    store: &Store,
    user_id: &str,
    kind: ActivityKind,
    at: DateTime<Utc>,
) -> Result<String, QuestlineError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    let id = time::new_event_id();
    let row_id = id.clone();
    broker.with_conn(&db_path, "questline", "activity.record", move |conn| {
        conn.execute(
            "INSERT INTO activity_event(id, user_id, kind, created_at) VALUES(?1, ?2, ?3, ?4)",
            params![row_id, user_id, kind.as_str(), time::to_iso(at)],
        )?;
        Ok(())
    })?;
    Ok(id)
}

#[derive(Parser, Debug)]
#[clap(name = "activity", about = "Record and count user activity events")]
pub struct ActivityCli {
    #[clap(subcommand)]
    pub command: ActivityCommand,
}

#[derive(Subcommand, Debug)]
pub enum ActivityCommand {
    /// Record one activity event for a user (comment, upload, ...).
    Record {
        #[clap(long)]
        user: String,
        #[clap(long)]
        kind: String,
    },
    /// Count a user's lifetime activity of one kind.
    Count {
        #[clap(long)]
        user: String,
        #[clap(long)]
        kind: String,
    },
}

pub fn run_activity_cli(store: &Store, cli: ActivityCli) -> Result<(), QuestlineError> {
    initialize_activity_db(&store.root)?;
    match cli.command {
        ActivityCommand::Record { user, kind } => {
            let kind = ActivityKind::parse(&kind)?;
            let id = record_activity(store, &user, kind, Utc::now())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "activity.record",
                    "ok",
                    serde_json::json!({ "id": id, "user": user, "kind": kind.as_str() })
                ))
                .unwrap()
            );
        }
        ActivityCommand::Count { user, kind } => {
            let kind = ActivityKind::parse(&kind)?;
            let counter = SqliteActivityCounter::new(store);
            let count = counter.count(&user, kind, None)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "activity.count",
                    "ok",
                    serde_json::json!({ "user": user, "kind": kind.as_str(), "count": count })
                ))
                .unwrap()
            );
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "activity",
        "version": "0.1.0",
        "description": "Activity events backing task progress counts",
        "commands": [
            { "name": "record", "parameters": ["user", "kind"] },
            { "name": "count", "parameters": ["user", "kind"] }
        ],
        "storage": ["rewards.db"]
    })
}
