//! Store-root configuration (`questline.toml`).
//!
//! The level table and the task catalog ship with built-in defaults; a
//! deployment can override either with `[[level]]` / `[[task]]` arrays in
//! the store root's `questline.toml`. Absent file means defaults.

use crate::core::error::QuestlineError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "questline.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QuestlineConfig {
    #[serde(default)]
    pub level: Vec<LevelConfig>,
    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelConfig {
    pub level: i64,
    pub name: String,
    pub required_exp: i64,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub task_key: String,
    /// daily | weekly | achievement
    pub category: String,
    /// comment | resource_upload | character_creation | favorite
    pub activity: String,
    pub threshold: i64,
    pub reward: i64,
    #[serde(default)]
    pub title: Option<String>,
}

/// Load the config file from the store root, or defaults when absent.
pub fn load_config(root: &Path) -> Result<QuestlineConfig, QuestlineError> {
    let path = root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(QuestlineConfig::default());
    }
    let raw = fs::read_to_string(&path).map_err(QuestlineError::IoError)?;
    toml::from_str(&raw)
        .map_err(|e| QuestlineError::ConfigError(format!("{}: {}", path.display(), e)))
}
