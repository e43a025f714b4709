use crate::core::db;
use crate::core::error::QuestlineError;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use ulid::Ulid;

/// The DB Broker is the "Thin Waist" for state access.
///
/// Every read-modify-write in the ledger, progression, and claim subsystems
/// routes through here. The broker serializes same-scope operations with an
/// in-process lock (scope = one user), wraps the closure in an IMMEDIATE
/// SQLite transaction, and appends one audit event per brokered operation.
/// Operations on different scopes never contend on the lock; SQLite-level
/// contention surfaces as `ConcurrencyConflict`.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub scope: Option<String>,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

fn scope_lock(scope: &str) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<FxHashMap<String, Arc<Mutex<()>>>>> = OnceLock::new();
    let map = LOCKS.get_or_init(|| Mutex::new(FxHashMap::default()));
    let mut guard = map.lock().unwrap();
    guard
        .entry(scope.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Translate SQLite lock contention into the retryable conflict error.
fn map_busy(err: QuestlineError) -> QuestlineError {
    if let QuestlineError::RusqliteError(rusqlite::Error::SqliteFailure(e, ref msg)) = err {
        if matches!(
            e.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ) {
            return QuestlineError::ConcurrencyConflict(
                msg.clone().unwrap_or_else(|| "database busy".to_string()),
            );
        }
    }
    err
}

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join("broker.events.jsonl"),
        }
    }

    /// Execute a closure with a plain connection (reads, schema init).
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, QuestlineError>
    where
        F: FnOnce(&Connection) -> Result<R, QuestlineError>,
    {
        let db_id = db_id_of(db_path);
        let conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = f(&conn).map_err(map_busy);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, None, op_name, &db_id, status)?;

        result
    }

    /// Execute a closure inside an IMMEDIATE transaction, holding the
    /// in-process lock for `scope`. The transaction commits only if the
    /// closure returns Ok; any error rolls back every write it made.
    pub fn with_tx<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        scope: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, QuestlineError>
    where
        F: FnOnce(&Transaction) -> Result<R, QuestlineError>,
    {
        let lock = scope_lock(scope);
        let _guard = lock.lock().unwrap();

        let db_id = db_id_of(db_path);
        let mut conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = (|| -> Result<R, QuestlineError> {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(QuestlineError::RusqliteError)?;
            let out = f(&tx)?;
            tx.commit().map_err(QuestlineError::RusqliteError)?;
            Ok(out)
        })()
        .map_err(map_busy);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, Some(scope), op_name, &db_id, status)?;

        result
    }

    fn log_event(
        &self,
        actor: &str,
        scope: Option<&str>,
        op: &str,
        db_id: &str,
        status: &str,
    ) -> Result<(), QuestlineError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: crate::core::time::now_iso(),
            event_id: Ulid::new().to_string(),
            actor: actor.to_string(),
            scope: scope.map(|s| s.to_string()),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(QuestlineError::IoError)?;

        writeln!(f, "{}", serde_json::to_string(&ev).unwrap()).map_err(QuestlineError::IoError)?;
        Ok(())
    }
}

/// Lock scope for operations that touch a single user's rows.
pub fn user_scope(user_id: &str) -> String {
    format!("user:{}", user_id)
}

fn db_id_of(db_path: &Path) -> String {
    db_path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
