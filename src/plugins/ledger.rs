//! Ledger plugin: durable point balances with an append-only audit trail.
//!
//! Every balance mutation goes through `credit`/`debit`, which pair the
//! `account_balance` update with exactly one `ledger_entry` row inside one
//! transaction. The entry log is never mutated or deleted; it is the audit
//! trail that reconciles the balance row
//! (`points == total_earned - total_spent`).

use crate::core::broker::{DbBroker, user_scope};
use crate::core::db;
use crate::core::error::QuestlineError;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time;
use clap::{Parser, Subcommand};
use rusqlite::{OptionalExtension, Transaction, params};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub fn initialize_ledger_db(root: &Path) -> Result<(), QuestlineError> {
    let broker = DbBroker::new(root);
    let db_path = db::rewards_db_path(root);

    broker.with_conn(&db_path, "questline", "ledger.init", |conn| {
        conn.execute(schemas::LEDGER_DB_SCHEMA_BALANCE, [])?;
        conn.execute(schemas::LEDGER_DB_SCHEMA_ENTRIES, [])?;
        conn.execute(schemas::LEDGER_DB_SCHEMA_INDEX_ENTRIES_USER, [])?;
        Ok(())
    })
}

/// Enumerated reason for a balance change.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    TaskReward,
    AdminAdjust,
    Expiration,
    Refund,
    Promotion,
    Purchase,
    Exchange,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::TaskReward => "task_reward",
            EntryKind::AdminAdjust => "admin_adjust",
            EntryKind::Expiration => "expiration",
            EntryKind::Refund => "refund",
            EntryKind::Promotion => "promotion",
            EntryKind::Purchase => "purchase",
            EntryKind::Exchange => "exchange",
        }
    }

    pub fn parse(s: &str) -> Result<Self, QuestlineError> {
        match s {
            "task_reward" => Ok(EntryKind::TaskReward),
            "admin_adjust" => Ok(EntryKind::AdminAdjust),
            "expiration" => Ok(EntryKind::Expiration),
            "refund" => Ok(EntryKind::Refund),
            "promotion" => Ok(EntryKind::Promotion),
            "purchase" => Ok(EntryKind::Purchase),
            "exchange" => Ok(EntryKind::Exchange),
            other => Err(QuestlineError::ValidationError(format!(
                "unknown entry kind: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountBalance {
    pub user_id: String,
    pub points: i64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    /// Signed: positive = credit, negative = debit.
    pub amount: i64,
    pub kind: EntryKind,
    pub description: String,
    pub created_at: String,
}

/// Increase a user's balance. Appends the paired ledger entry in the same
/// transaction.
pub fn credit(
    store: &Store,
    user_id: &str,
    amount: i64,
    kind: EntryKind,
    description: &str,
) -> Result<(AccountBalance, LedgerEntry), QuestlineError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    broker.with_tx(
        &db_path,
        "questline",
        &user_scope(user_id),
        "ledger.credit",
        |tx| credit_tx(tx, user_id, amount, kind, description),
    )
}

/// Decrease a user's balance, only if sufficient points are available.
/// The check and the write share the transaction.
pub fn debit(
    store: &Store,
    user_id: &str,
    amount: i64,
    kind: EntryKind,
    description: &str,
) -> Result<(AccountBalance, LedgerEntry), QuestlineError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    broker.with_tx(
        &db_path,
        "questline",
        &user_scope(user_id),
        "ledger.debit",
        |tx| debit_tx(tx, user_id, amount, kind, description),
    )
}

/// Fetch a user's balance, lazily creating the zero row.
pub fn get_balance(store: &Store, user_id: &str) -> Result<AccountBalance, QuestlineError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    broker.with_tx(
        &db_path,
        "questline",
        &user_scope(user_id),
        "ledger.balance",
        |tx| ensure_balance_tx(tx, user_id),
    )
}

/// Ledger entries for a user, newest first.
pub fn list_entries(
    store: &Store,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntry>, QuestlineError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    broker.with_conn(&db_path, "questline", "ledger.history", |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, amount, kind, description, created_at
             FROM ledger_entry WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(params![user_id, limit, offset], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, user_id, amount, kind, description, created_at) = row?;
            out.push(LedgerEntry {
                id,
                user_id,
                amount,
                kind: EntryKind::parse(&kind)?,
                description: description.unwrap_or_default(),
                created_at,
            });
        }
        Ok(out)
    })
}

// --- Transaction-scoped internals, shared with the tasks plugin so a claim
// --- and its credit commit or roll back together.

pub(crate) fn ensure_balance_tx(
    tx: &Transaction,
    user_id: &str,
) -> Result<AccountBalance, QuestlineError> {
    let existing = tx
        .query_row(
            "SELECT user_id, points, total_earned, total_spent, updated_at
             FROM account_balance WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(AccountBalance {
                    user_id: row.get(0)?,
                    points: row.get(1)?,
                    total_earned: row.get(2)?,
                    total_spent: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
        .optional()?;

    if let Some(balance) = existing {
        return Ok(balance);
    }

    let now = time::now_iso();
    tx.execute(
        "INSERT INTO account_balance(user_id, points, total_earned, total_spent, updated_at)
         VALUES(?1, 0, 0, 0, ?2)",
        params![user_id, now],
    )?;
    Ok(AccountBalance {
        user_id: user_id.to_string(),
        points: 0,
        total_earned: 0,
        total_spent: 0,
        updated_at: now,
    })
}

pub(crate) fn credit_tx(
    tx: &Transaction,
    user_id: &str,
    amount: i64,
    kind: EntryKind,
    description: &str,
) -> Result<(AccountBalance, LedgerEntry), QuestlineError> {
    if amount <= 0 {
        return Err(QuestlineError::InvalidAmount(amount));
    }
    let mut balance = ensure_balance_tx(tx, user_id)?;
    let now = time::now_iso();

    balance.points += amount;
    balance.total_earned += amount;
    balance.updated_at = now.clone();
    tx.execute(
        "UPDATE account_balance SET points = ?2, total_earned = ?3, updated_at = ?4
         WHERE user_id = ?1",
        params![user_id, balance.points, balance.total_earned, now],
    )?;

    let entry = append_entry_tx(tx, user_id, amount, kind, description, &now)?;
    Ok((balance, entry))
}

pub(crate) fn debit_tx(
    tx: &Transaction,
    user_id: &str,
    amount: i64,
    kind: EntryKind,
    description: &str,
) -> Result<(AccountBalance, LedgerEntry), QuestlineError> {
    if amount <= 0 {
        return Err(QuestlineError::InvalidAmount(amount));
    }
    let mut balance = ensure_balance_tx(tx, user_id)?;
    if balance.points < amount {
        return Err(QuestlineError::InsufficientBalance {
            have: balance.points,
            need: amount,
        });
    }
    let now = time::now_iso();

    balance.points -= amount;
    balance.total_spent += amount;
    balance.updated_at = now.clone();
    tx.execute(
        "UPDATE account_balance SET points = ?2, total_spent = ?3, updated_at = ?4
         WHERE user_id = ?1",
        params![user_id, balance.points, balance.total_spent, now],
    )?;

    let entry = append_entry_tx(tx, user_id, -amount, kind, description, &now)?;
    Ok((balance, entry))
}

fn append_entry_tx(
    tx: &Transaction,
    user_id: &str,
    amount: i64,
    kind: EntryKind,
    description: &str,
    now: &str,
) -> Result<LedgerEntry, QuestlineError> {
    let entry = LedgerEntry {
        id: time::new_event_id(),
        user_id: user_id.to_string(),
        amount,
        kind,
        description: description.to_string(),
        created_at: now.to_string(),
    };
    tx.execute(
        "INSERT INTO ledger_entry(id, user_id, amount, kind, description, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id,
            entry.user_id,
            entry.amount,
            entry.kind.as_str(),
            entry.description,
            entry.created_at
        ],
    )?;
    Ok(entry)
}

#[derive(Parser, Debug)]
#[clap(name = "ledger", about = "Point balances and the ledger audit trail")]
pub struct LedgerCli {
    #[clap(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// Credit points to a user.
    Credit {
        #[clap(long)]
        user: String,
        #[clap(long)]
        amount: i64,
        #[clap(long, default_value = "admin_adjust")]
        kind: String,
        #[clap(long, default_value = "")]
        description: String,
    },
    /// Debit points from a user.
    Debit {
        #[clap(long)]
        user: String,
        #[clap(long)]
        amount: i64,
        #[clap(long, default_value = "purchase")]
        kind: String,
        #[clap(long, default_value = "")]
        description: String,
    },
    /// Show a user's balance.
    Balance {
        #[clap(long)]
        user: String,
    },
    /// List a user's ledger entries, newest first.
    History {
        #[clap(long)]
        user: String,
        #[clap(long, default_value_t = 50)]
        limit: i64,
        #[clap(long, default_value_t = 0)]
        offset: i64,
    },
}

pub fn run_ledger_cli(store: &Store, cli: LedgerCli) -> Result<(), QuestlineError> {
    initialize_ledger_db(&store.root)?;
    match cli.command {
        LedgerCommand::Credit {
            user,
            amount,
            kind,
            description,
        } => {
            let (balance, entry) = credit(store, &user, amount, EntryKind::parse(&kind)?, &description)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "ledger.credit",
                    "ok",
                    serde_json::json!({ "balance": balance, "entry": entry })
                ))
                .unwrap()
            );
        }
        LedgerCommand::Debit {
            user,
            amount,
            kind,
            description,
        } => {
            let (balance, entry) = debit(store, &user, amount, EntryKind::parse(&kind)?, &description)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "ledger.debit",
                    "ok",
                    serde_json::json!({ "balance": balance, "entry": entry })
                ))
                .unwrap()
            );
        }
        LedgerCommand::Balance { user } => {
            let balance = get_balance(store, &user)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "ledger.balance",
                    "ok",
                    serde_json::json!({ "balance": balance })
                ))
                .unwrap()
            );
        }
        LedgerCommand::History {
            user,
            limit,
            offset,
        } => {
            let entries = list_entries(store, &user, limit, offset)?;
            let count = entries.len();
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "ledger.history",
                    "ok",
                    serde_json::json!({ "entries": entries, "count": count })
                ))
                .unwrap()
            );
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "ledger",
        "version": "0.1.0",
        "description": "Point balances with an append-only audit trail",
        "commands": [
            { "name": "credit", "parameters": ["user", "amount", "kind", "description"] },
            { "name": "debit", "parameters": ["user", "amount", "kind", "description"] },
            { "name": "balance", "parameters": ["user"] },
            { "name": "history", "parameters": ["user", "limit", "offset"] }
        ],
        "storage": ["rewards.db"]
    })
}
