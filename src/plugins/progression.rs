//! Progression plugin: per-user experience and level state.
//!
//! Experience only ever increases through `add_experience`. A single grant
//! may cascade through several levels; each discrete transition appends its
//! own `level_change_log` row. On level-up the surplus experience carries
//! forward (`current_exp -= delta`), so no experience is lost — demotions
//! have no path through this module.

use crate::core::broker::{DbBroker, user_scope};
use crate::core::db;
use crate::core::error::QuestlineError;
use crate::core::notify::{NotifyEvent, NotifySink};
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::levels::LevelTable;
use clap::{Parser, Subcommand};
use rusqlite::{OptionalExtension, Transaction, params};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub fn initialize_progression_db(root: &Path) -> Result<(), QuestlineError> {
    let broker = DbBroker::new(root);
    let db_path = db::rewards_db_path(root);

    broker.with_conn(&db_path, "questline", "progression.init", |conn| {
        conn.execute(schemas::PROGRESSION_DB_SCHEMA_STATE, [])?;
        conn.execute(schemas::PROGRESSION_DB_SCHEMA_LEVEL_LOG, [])?;
        conn.execute(schemas::PROGRESSION_DB_SCHEMA_INDEX_LEVEL_LOG_USER, [])?;
        Ok(())
    })
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProgressionState {
    pub user_id: String,
    pub level: i64,
    /// Experience accumulated since the last level-up.
    pub current_exp: i64,
    /// Lifetime cumulative experience.
    pub total_exp: i64,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LevelChange {
    pub old_level: i64,
    pub new_level: i64,
}

/// Pure cascade step: drain `current_exp` through consecutive level-ups.
///
/// The cost of each transition is the threshold delta between the two
/// levels, so surplus experience always carries forward.
pub fn cascade(
    table: &LevelTable,
    start_level: i64,
    start_exp: i64,
) -> (i64, i64, Vec<LevelChange>) {
    let mut level = start_level;
    let mut exp = start_exp;
    let mut changes = Vec::new();

    while let Some(next) = table.next_level_after(level) {
        let cur_required = table.get(level).map(|d| d.required_exp).unwrap_or(0);
        let delta = next.required_exp - cur_required;
        if exp < delta {
            break;
        }
        exp -= delta;
        changes.push(LevelChange {
            old_level: level,
            new_level: next.level,
        });
        level = next.level;
    }

    (level, exp, changes)
}

/// Grant experience, cascading level-ups inside one transaction.
pub fn add_experience(
    store: &Store,
    table: &LevelTable,
    sink: &dyn NotifySink,
    user_id: &str,
    amount: i64,
    reason: &str,
) -> Result<(ProgressionState, Vec<LevelChange>), QuestlineError> {
    if amount <= 0 {
        return Err(QuestlineError::InvalidExperienceAmount(amount));
    }

    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    let (state, changes) = broker.with_tx(
        &db_path,
        "questline",
        &user_scope(user_id),
        "progression.add_exp",
        |tx| {
            let mut state = ensure_state_tx(tx, table, user_id)?;
            let now = time::now_iso();

            state.total_exp += amount;
            state.current_exp += amount;

            let (level, current_exp, changes) = cascade(table, state.level, state.current_exp);
            state.level = level;
            state.current_exp = current_exp;
            state.updated_at = now.clone();

            for change in &changes {
                tx.execute(
                    "INSERT INTO level_change_log(id, user_id, old_level, new_level, reason, created_at)
                     VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        time::new_event_id(),
                        user_id,
                        change.old_level,
                        change.new_level,
                        reason,
                        now
                    ],
                )?;
            }

            tx.execute(
                "UPDATE progression_state SET level = ?2, current_exp = ?3, total_exp = ?4, updated_at = ?5
                 WHERE user_id = ?1",
                params![user_id, state.level, state.current_exp, state.total_exp, now],
            )?;

            Ok((state, changes))
        },
    )?;

    // Notification is fire-and-forget, after the commit.
    for change in &changes {
        sink.emit(&NotifyEvent::LeveledUp {
            user_id: user_id.to_string(),
            old_level: change.old_level,
            new_level: change.new_level,
        });
    }

    Ok((state, changes))
}

/// Fetch a user's progression, lazily creating floor-level state.
pub fn get_progression(
    store: &Store,
    table: &LevelTable,
    user_id: &str,
) -> Result<ProgressionState, QuestlineError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    broker.with_tx(
        &db_path,
        "questline",
        &user_scope(user_id),
        "progression.get",
        |tx| ensure_state_tx(tx, table, user_id),
    )
}

/// Level transitions for a user, newest first.
pub fn list_level_changes(
    store: &Store,
    user_id: &str,
    limit: i64,
) -> Result<Vec<(i64, i64, String, String)>, QuestlineError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    broker.with_conn(&db_path, "questline", "progression.log", |conn| {
        let mut stmt = conn.prepare(
            "SELECT old_level, new_level, reason, created_at FROM level_change_log
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

fn ensure_state_tx(
    tx: &Transaction,
    table: &LevelTable,
    user_id: &str,
) -> Result<ProgressionState, QuestlineError> {
    let existing = tx
        .query_row(
            "SELECT user_id, level, current_exp, total_exp, updated_at
             FROM progression_state WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(ProgressionState {
                    user_id: row.get(0)?,
                    level: row.get(1)?,
                    current_exp: row.get(2)?,
                    total_exp: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
        .optional()?;

    if let Some(state) = existing {
        return Ok(state);
    }

    let now = time::now_iso();
    let floor = table.floor();
    tx.execute(
        "INSERT INTO progression_state(user_id, level, current_exp, total_exp, updated_at)
         VALUES(?1, ?2, 0, 0, ?3)",
        params![user_id, floor.level, now],
    )?;
    Ok(ProgressionState {
        user_id: user_id.to_string(),
        level: floor.level,
        current_exp: 0,
        total_exp: 0,
        updated_at: now,
    })
}

#[derive(Parser, Debug)]
#[clap(name = "progression", about = "Experience, levels, and level history")]
pub struct ProgressionCli {
    #[clap(subcommand)]
    pub command: ProgressionCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProgressionCommand {
    /// Grant experience to a user (cascades level-ups).
    AddExp {
        #[clap(long)]
        user: String,
        #[clap(long)]
        amount: i64,
        #[clap(long, default_value = "manual")]
        reason: String,
    },
    /// Show a user's level and experience counters.
    Get {
        #[clap(long)]
        user: String,
    },
    /// Show a user's level transition history.
    Log {
        #[clap(long)]
        user: String,
        #[clap(long, default_value_t = 50)]
        limit: i64,
    },
    /// Print the configured level table.
    Levels,
}

pub fn run_progression_cli(store: &Store, cli: ProgressionCli) -> Result<(), QuestlineError> {
    initialize_progression_db(&store.root)?;
    let table = LevelTable::load(&store.root)?;
    let sink = crate::core::notify::JsonlNotifySink::new(&store.root);
    match cli.command {
        ProgressionCommand::AddExp {
            user,
            amount,
            reason,
        } => {
            let (state, changes) = add_experience(store, &table, &sink, &user, amount, &reason)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "progression.add_exp",
                    "ok",
                    serde_json::json!({ "state": state, "level_changes": changes })
                ))
                .unwrap()
            );
        }
        ProgressionCommand::Get { user } => {
            let state = get_progression(store, &table, &user)?;
            let next = table.next_level_after(state.level).cloned();
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "progression.get",
                    "ok",
                    serde_json::json!({ "state": state, "next_level": next })
                ))
                .unwrap()
            );
        }
        ProgressionCommand::Log { user, limit } => {
            let log: Vec<_> = list_level_changes(store, &user, limit)?
                .into_iter()
                .map(|(old_level, new_level, reason, created_at)| {
                    serde_json::json!({
                        "old_level": old_level,
                        "new_level": new_level,
                        "reason": reason,
                        "created_at": created_at,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "progression.log",
                    "ok",
                    serde_json::json!({ "changes": log })
                ))
                .unwrap()
            );
        }
        ProgressionCommand::Levels => {
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "progression.levels",
                    "ok",
                    serde_json::json!({ "levels": table.defs() })
                ))
                .unwrap()
            );
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "progression",
        "version": "0.1.0",
        "description": "Experience grants with cascading level-ups",
        "commands": [
            { "name": "add-exp", "parameters": ["user", "amount", "reason"] },
            { "name": "get", "parameters": ["user"] },
            { "name": "log", "parameters": ["user", "limit"] },
            { "name": "levels", "parameters": [] }
        ],
        "storage": ["rewards.db"]
    })
}
