//! Core modules for Questline's shared primitives.
//!
//! Brokered database access, schema definitions, error taxonomy, config,
//! and timestamp/period-key helpers live here. Domain subsystems live in
//! `plugins/`.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod schemas;
pub mod store;
pub mod time;
