//! Domain subsystems. Each plugin owns its tables in the rewards bin, its
//! public operations, and its CLI surface.

pub mod activity;
pub mod ledger;
pub mod levels;
pub mod progression;
pub mod tasks;
