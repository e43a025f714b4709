//! Questline: the progression and rewards ledger for a community game
//! catalogue.
//!
//! Questline owns the state a content site cannot afford to get wrong:
//! point balances, experience levels, and task-reward claims. Everything
//! else (catalogue CRUD, sessions, rendering) lives outside and talks to
//! this crate through its operations and the activity-counter seam.
//!
//! # Guarantees
//!
//! - **Balance invariant**: `points == total_earned - total_spent` after
//!   every committed mutation; every credit/debit appends exactly one
//!   ledger entry in the same transaction.
//! - **Cascade invariant**: experience grants drain fully through the
//!   level table; surplus experience carries forward, never resets.
//! - **Claim idempotence**: each `(user, task, period)` claim succeeds at
//!   most once. The claim record and its ledger credit commit or roll back
//!   together.
//!
//! # Architecture
//!
//! All state lives in one SQLite database (`rewards.db`) under a store
//! root directory. Mutations route through the `DbBroker` thin waist:
//! per-user lock scoping, IMMEDIATE transactions, and a JSONL audit event
//! per brokered operation. Subsystems live in `plugins/`; each owns its
//! schema constants, operations, and clap CLI:
//!
//! - `ledger`: balances and the append-only entry log
//! - `levels`: the level table and its validation
//! - `progression`: experience grants with cascading level-ups
//! - `tasks`: task catalog, period windows, and idempotent claims
//! - `activity`: the read-only counter seam to the content site

pub mod cli;
pub mod core;
pub mod plugins;
pub mod subsystems;
