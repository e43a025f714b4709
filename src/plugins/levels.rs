//! Level table: ordered catalog of levels and their experience thresholds.
//!
//! Thresholds are cumulative (`required_exp` is the lifetime experience
//! needed to *reach* the level) and strictly increasing. The catalog must
//! contain a floor level at `required_exp == 0` so a fresh user always
//! resolves to a level.

use crate::core::config::{LevelConfig, load_config};
use crate::core::error::QuestlineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LevelDef {
    pub level: i64,
    pub name: String,
    pub required_exp: i64,
    pub benefits: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LevelTable {
    defs: Vec<LevelDef>,
}

impl LevelTable {
    /// Build a table, validating the catalog invariants.
    pub fn new(mut defs: Vec<LevelDef>) -> Result<Self, QuestlineError> {
        if defs.is_empty() {
            return Err(QuestlineError::NoLevelsConfigured);
        }
        defs.sort_by_key(|d| d.level);
        if defs[0].required_exp != 0 {
            return Err(QuestlineError::ValidationError(format!(
                "floor level {} must have required_exp 0, has {}",
                defs[0].level, defs[0].required_exp
            )));
        }
        for pair in defs.windows(2) {
            if pair[1].level <= pair[0].level {
                return Err(QuestlineError::ValidationError(format!(
                    "duplicate level number: {}",
                    pair[1].level
                )));
            }
            if pair[1].required_exp <= pair[0].required_exp {
                return Err(QuestlineError::ValidationError(format!(
                    "required_exp must be strictly increasing: level {} ({}) after level {} ({})",
                    pair[1].level, pair[1].required_exp, pair[0].level, pair[0].required_exp
                )));
            }
        }
        Ok(Self { defs })
    }

    /// Built-in catalog, overridden by `[[level]]` entries in questline.toml.
    pub fn load(root: &Path) -> Result<Self, QuestlineError> {
        let config = load_config(root)?;
        if config.level.is_empty() {
            return Self::new(default_levels());
        }
        Self::new(config.level.into_iter().map(LevelDef::from).collect())
    }

    /// The definition with the greatest `required_exp <= total_exp`.
    pub fn level_for(&self, total_exp: i64) -> &LevelDef {
        // new() guarantees a floor at 0, so the fold always matches.
        self.defs
            .iter()
            .take_while(|d| d.required_exp <= total_exp)
            .last()
            .unwrap_or(&self.defs[0])
    }

    pub fn get(&self, level: i64) -> Option<&LevelDef> {
        self.defs.iter().find(|d| d.level == level)
    }

    /// The next configured level after `level`, or None at the top.
    pub fn next_level_after(&self, level: i64) -> Option<&LevelDef> {
        self.defs.iter().find(|d| d.level > level)
    }

    pub fn floor(&self) -> &LevelDef {
        &self.defs[0]
    }

    pub fn defs(&self) -> &[LevelDef] {
        &self.defs
    }
}

impl From<LevelConfig> for LevelDef {
    fn from(c: LevelConfig) -> Self {
        LevelDef {
            level: c.level,
            name: c.name,
            required_exp: c.required_exp,
            benefits: c.benefits,
            icon: c.icon,
        }
    }
}

pub fn default_levels() -> Vec<LevelDef> {
    let named = [
        (1, "Newcomer", 0),
        (2, "Visitor", 100),
        (3, "Regular", 300),
        (4, "Contributor", 700),
        (5, "Collector", 1500),
        (6, "Curator", 3000),
        (7, "Archivist", 6000),
        (8, "Luminary", 12000),
    ];
    named
        .into_iter()
        .map(|(level, name, required_exp)| LevelDef {
            level,
            name: name.to_string(),
            required_exp,
            benefits: None,
            icon: None,
        })
        .collect()
}
