//! Tasks plugin: task catalog, progress counting, and idempotent claims.
//!
//! A task is completed by accumulating activity inside its period window.
//! Claiming the reward is guarded by the `claim_record` table: the claim
//! key encodes the period, so daily/weekly resets need no cleanup job, and
//! the check-and-insert shares one transaction with the ledger credit. A
//! claim whose credit fails leaves no claim record behind.

use crate::core::broker::{DbBroker, user_scope};
use crate::core::config::{TaskConfig, load_config};
use crate::core::db;
use crate::core::error::QuestlineError;
use crate::core::notify::{NotifyEvent, NotifySink};
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::activity::{ActivityCounter, ActivityKind};
use crate::plugins::ledger::{self, AccountBalance, EntryKind};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub fn initialize_tasks_db(root: &Path) -> Result<(), QuestlineError> {
    let broker = DbBroker::new(root);
    let db_path = db::rewards_db_path(root);

    broker.with_conn(&db_path, "questline", "tasks.init", |conn| {
        conn.execute(schemas::TASKS_DB_SCHEMA_CLAIMS, [])?;
        Ok(())
    })
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    Daily,
    Weekly,
    Achievement,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Daily => "daily",
            TaskCategory::Weekly => "weekly",
            TaskCategory::Achievement => "achievement",
        }
    }

    pub fn parse(s: &str) -> Result<Self, QuestlineError> {
        match s {
            "daily" => Ok(TaskCategory::Daily),
            "weekly" => Ok(TaskCategory::Weekly),
            "achievement" => Ok(TaskCategory::Achievement),
            other => Err(QuestlineError::ValidationError(format!(
                "unknown task category: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskDef {
    pub task_key: String,
    pub category: TaskCategory,
    pub activity: ActivityKind,
    pub threshold: i64,
    pub reward: i64,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct TaskCatalog {
    tasks: Vec<TaskDef>,
}

impl TaskCatalog {
    pub fn new(tasks: Vec<TaskDef>) -> Result<Self, QuestlineError> {
        for (i, task) in tasks.iter().enumerate() {
            if task.threshold <= 0 {
                return Err(QuestlineError::ValidationError(format!(
                    "task {} threshold must be > 0",
                    task.task_key
                )));
            }
            if tasks[..i].iter().any(|t| t.task_key == task.task_key) {
                return Err(QuestlineError::ValidationError(format!(
                    "duplicate task key: {}",
                    task.task_key
                )));
            }
        }
        Ok(Self { tasks })
    }

    /// Built-in catalog, overridden by `[[task]]` entries in questline.toml.
    pub fn load(root: &Path) -> Result<Self, QuestlineError> {
        let config = load_config(root)?;
        if config.task.is_empty() {
            return Self::new(default_tasks());
        }
        let tasks = config
            .task
            .into_iter()
            .map(TaskDef::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tasks)
    }

    pub fn get(&self, task_key: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.task_key == task_key)
    }

    pub fn tasks(&self) -> &[TaskDef] {
        &self.tasks
    }
}

impl TryFrom<TaskConfig> for TaskDef {
    type Error = QuestlineError;

    fn try_from(c: TaskConfig) -> Result<Self, QuestlineError> {
        Ok(TaskDef {
            title: c.title.unwrap_or_else(|| c.task_key.clone()),
            category: TaskCategory::parse(&c.category)?,
            activity: ActivityKind::parse(&c.activity)?,
            task_key: c.task_key,
            threshold: c.threshold,
            reward: c.reward,
        })
    }
}

pub fn default_tasks() -> Vec<TaskDef> {
    vec![
        TaskDef {
            task_key: "daily_comment".into(),
            category: TaskCategory::Daily,
            activity: ActivityKind::Comment,
            threshold: 1,
            reward: 10,
            title: "Post a comment today".into(),
        },
        TaskDef {
            task_key: "daily_favorite".into(),
            category: TaskCategory::Daily,
            activity: ActivityKind::Favorite,
            threshold: 3,
            reward: 15,
            title: "Favorite three entries today".into(),
        },
        TaskDef {
            task_key: "weekly_upload".into(),
            category: TaskCategory::Weekly,
            activity: ActivityKind::ResourceUpload,
            threshold: 1,
            reward: 50,
            title: "Upload a resource this week".into(),
        },
        TaskDef {
            task_key: "first_character".into(),
            category: TaskCategory::Achievement,
            activity: ActivityKind::CharacterCreation,
            threshold: 1,
            reward: 100,
            title: "Create your first character entry".into(),
        },
        TaskDef {
            task_key: "hundred_comments".into(),
            category: TaskCategory::Achievement,
            activity: ActivityKind::Comment,
            threshold: 100,
            reward: 500,
            title: "Post one hundred comments".into(),
        },
    ]
}

/// Period key identifying one instance of a task's claim state machine.
pub fn period_key(category: TaskCategory, now: DateTime<Utc>) -> String {
    match category {
        TaskCategory::Daily => time::utc_day_key(now),
        TaskCategory::Weekly => time::iso_week_key(now),
        TaskCategory::Achievement => "lifetime".to_string(),
    }
}

/// Start of the counting window, None for lifetime counts.
pub fn period_start(category: TaskCategory, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match category {
        TaskCategory::Daily => Some(time::start_of_utc_day(now)),
        TaskCategory::Weekly => Some(time::start_of_iso_week(now)),
        TaskCategory::Achievement => None,
    }
}

/// Current progress count for a task. Read-only, no side effects.
pub fn get_progress(
    counter: &dyn ActivityCounter,
    user_id: &str,
    task: &TaskDef,
    now: DateTime<Utc>,
) -> Result<i64, QuestlineError> {
    counter.count(user_id, task.activity, period_start(task.category, now))
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClaimOutcome {
    pub task_key: String,
    pub period_key: String,
    pub credited: i64,
    pub balance: AccountBalance,
}

/// Claim a task reward: verify completion, then atomically mark the period
/// claimed and credit the ledger. The claim record and the credit commit or
/// roll back together.
pub fn claim_reward(
    store: &Store,
    catalog: &TaskCatalog,
    counter: &dyn ActivityCounter,
    sink: &dyn NotifySink,
    user_id: &str,
    task_key: &str,
    now: DateTime<Utc>,
) -> Result<ClaimOutcome, QuestlineError> {
    let task = catalog
        .get(task_key)
        .ok_or_else(|| QuestlineError::UnknownTask(task_key.to_string()))?;
    let period = period_key(task.category, now);

    // The progress count calls out to the activity collaborator; it has no
    // side effects, so it stays outside the claim transaction.
    let progress = get_progress(counter, user_id, task, now)?;
    if progress < task.threshold {
        return Err(QuestlineError::TaskNotCompleted {
            task_key: task_key.to_string(),
            progress,
            threshold: task.threshold,
        });
    }

    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    let reward = task.reward;
    let outcome = broker.with_tx(
        &db_path,
        "questline",
        &user_scope(user_id),
        "tasks.claim",
        |tx| {
            let already: i64 = tx.query_row(
                "SELECT COUNT(*) FROM claim_record
                 WHERE user_id = ?1 AND task_key = ?2 AND period_key = ?3",
                params![user_id, task_key, period],
                |row| row.get(0),
            )?;
            if already > 0 {
                return Err(QuestlineError::AlreadyClaimed {
                    task_key: task_key.to_string(),
                    period_key: period.clone(),
                });
            }
            tx.execute(
                "INSERT INTO claim_record(user_id, task_key, period_key, claimed_at)
                 VALUES(?1, ?2, ?3, ?4)",
                params![user_id, task_key, period, time::now_iso()],
            )?;

            let (balance, _entry) = ledger::credit_tx(
                tx,
                user_id,
                reward,
                EntryKind::TaskReward,
                &format!("reward for {}", task_key),
            )?;

            Ok(ClaimOutcome {
                task_key: task_key.to_string(),
                period_key: period.clone(),
                credited: reward,
                balance,
            })
        },
    )?;

    sink.emit(&NotifyEvent::RewardGranted {
        user_id: user_id.to_string(),
        task_key: task_key.to_string(),
        amount: reward,
    });

    Ok(outcome)
}

/// Claims already recorded for a user, newest first.
pub fn list_claims(
    store: &Store,
    user_id: &str,
) -> Result<Vec<(String, String, String)>, QuestlineError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::rewards_db_path(&store.root);
    broker.with_conn(&db_path, "questline", "tasks.claims", |conn| {
        let mut stmt = conn.prepare(
            "SELECT task_key, period_key, claimed_at FROM claim_record
             WHERE user_id = ?1 ORDER BY claimed_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

#[derive(Parser, Debug)]
#[clap(name = "tasks", about = "Task catalog, progress, and reward claims")]
pub struct TasksCli {
    #[clap(subcommand)]
    pub command: TasksCommand,
}

#[derive(Subcommand, Debug)]
pub enum TasksCommand {
    /// Print the task catalog.
    List,
    /// Show a user's progress toward a task.
    Progress {
        #[clap(long)]
        user: String,
        #[clap(long)]
        task: String,
    },
    /// Claim a completed task's reward.
    Claim {
        #[clap(long)]
        user: String,
        #[clap(long)]
        task: String,
    },
    /// List a user's recorded claims.
    Claims {
        #[clap(long)]
        user: String,
    },
}

pub fn run_tasks_cli(store: &Store, cli: TasksCli) -> Result<(), QuestlineError> {
    initialize_tasks_db(&store.root)?;
    crate::plugins::ledger::initialize_ledger_db(&store.root)?;
    crate::plugins::activity::initialize_activity_db(&store.root)?;
    let catalog = TaskCatalog::load(&store.root)?;
    let counter = crate::plugins::activity::SqliteActivityCounter::new(store);
    let sink = crate::core::notify::JsonlNotifySink::new(&store.root);
    match cli.command {
        TasksCommand::List => {
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "tasks.list",
                    "ok",
                    serde_json::json!({ "tasks": catalog.tasks() })
                ))
                .unwrap()
            );
        }
        TasksCommand::Progress { user, task } => {
            let def = catalog
                .get(&task)
                .ok_or_else(|| QuestlineError::UnknownTask(task.clone()))?;
            let now = Utc::now();
            let progress = get_progress(&counter, &user, def, now)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "tasks.progress",
                    "ok",
                    serde_json::json!({
                        "task": def.task_key,
                        "period_key": period_key(def.category, now),
                        "progress": progress,
                        "threshold": def.threshold,
                        "completed": progress >= def.threshold,
                    })
                ))
                .unwrap()
            );
        }
        TasksCommand::Claim { user, task } => {
            let outcome = claim_reward(store, &catalog, &counter, &sink, &user, &task, Utc::now())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "tasks.claim",
                    "ok",
                    serde_json::json!({ "claim": outcome })
                ))
                .unwrap()
            );
        }
        TasksCommand::Claims { user } => {
            let claims: Vec<_> = list_claims(store, &user)?
                .into_iter()
                .map(|(task_key, period_key, claimed_at)| {
                    serde_json::json!({
                        "task_key": task_key,
                        "period_key": period_key,
                        "claimed_at": claimed_at,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&time::command_envelope(
                    "tasks.claims",
                    "ok",
                    serde_json::json!({ "claims": claims })
                ))
                .unwrap()
            );
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "tasks",
        "version": "0.1.0",
        "description": "Task completion tracking and idempotent reward claims",
        "commands": [
            { "name": "list", "parameters": [] },
            { "name": "progress", "parameters": ["user", "task"] },
            { "name": "claim", "parameters": ["user", "task"] },
            { "name": "claims", "parameters": ["user"] }
        ],
        "storage": ["rewards.db"]
    })
}
