//! Centralized database schema definitions for the rewards bin.
//!
//! Questline keeps all progression state in one consolidated SQLite
//! database so that a task claim and its ledger credit can share a single
//! transaction:
//! 1. account_balance / ledger_entry: the point ledger and its audit trail.
//! 2. progression_state / level_change_log: experience and level history.
//! 3. claim_record: the one-claim-per-period guard, keyed by period.
//! 4. activity_event: default backing table for the activity counters.

pub const REWARDS_DB_NAME: &str = "rewards.db";

pub const LEDGER_DB_SCHEMA_BALANCE: &str = "
    CREATE TABLE IF NOT EXISTS account_balance (
        user_id TEXT PRIMARY KEY,
        points INTEGER NOT NULL DEFAULT 0,
        total_earned INTEGER NOT NULL DEFAULT 0,
        total_spent INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL,
        CHECK(points >= 0),
        CHECK(points = total_earned - total_spent)
    )
";

pub const LEDGER_DB_SCHEMA_ENTRIES: &str = "
    CREATE TABLE IF NOT EXISTS ledger_entry (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        amount INTEGER NOT NULL,
        kind TEXT NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL
    )
";
pub const LEDGER_DB_SCHEMA_INDEX_ENTRIES_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_ledger_entry_user ON ledger_entry(user_id, created_at)";

pub const PROGRESSION_DB_SCHEMA_STATE: &str = "
    CREATE TABLE IF NOT EXISTS progression_state (
        user_id TEXT PRIMARY KEY,
        level INTEGER NOT NULL,
        current_exp INTEGER NOT NULL DEFAULT 0,
        total_exp INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL,
        CHECK(current_exp >= 0),
        CHECK(total_exp >= 0)
    )
";

pub const PROGRESSION_DB_SCHEMA_LEVEL_LOG: &str = "
    CREATE TABLE IF NOT EXISTS level_change_log (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        old_level INTEGER NOT NULL,
        new_level INTEGER NOT NULL,
        reason TEXT,
        created_at TEXT NOT NULL
    )
";
pub const PROGRESSION_DB_SCHEMA_INDEX_LEVEL_LOG_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_level_change_log_user ON level_change_log(user_id, created_at)";

pub const TASKS_DB_SCHEMA_CLAIMS: &str = "
    CREATE TABLE IF NOT EXISTS claim_record (
        user_id TEXT NOT NULL,
        task_key TEXT NOT NULL,
        period_key TEXT NOT NULL,
        claimed_at TEXT NOT NULL,
        PRIMARY KEY(user_id, task_key, period_key)
    )
";

pub const ACTIVITY_DB_SCHEMA_EVENTS: &str = "
    CREATE TABLE IF NOT EXISTS activity_event (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
";
pub const ACTIVITY_DB_SCHEMA_INDEX_EVENTS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_activity_event_user ON activity_event(user_id, kind, created_at)";
