//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Reward rates (XP and coins per minute)
//! - Timer defaults and the start-conflict policy
//! - The booster shop catalog
//! - Weekly category goals
//!
//! Configuration is stored at `~/.config/studyquest/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::{ConfigError, CoreError, Result};
use crate::inventory::{Catalog, CatalogItem};
use crate::progress::CategoryGoal;
use crate::rewards::RewardPolicy;
use crate::service::ConflictPolicy;

/// Timer-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_duration_min")]
    pub default_duration_min: u64,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyquest/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rewards: RewardPolicy,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default = "Catalog::default_items")]
    pub catalog: Vec<CatalogItem>,
    #[serde(default)]
    pub goals: Vec<CategoryGoal>,
}

// Default functions
fn default_duration_min() -> u64 {
    25
}
fn default_tick_interval_ms() -> u64 {
    1000
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            default_duration_min: default_duration_min(),
            conflict_policy: ConflictPolicy::default(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rewards: RewardPolicy::default(),
            timer: TimerConfig::default(),
            catalog: Catalog::default_items(),
            goals: Vec::new(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::LoadFailed {
                    path,
                    message: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// into the field's type. The config is unchanged on error.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.catalog()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)?;
        self.save()
    }

    /// The validated shop catalog.
    pub fn catalog(&self) -> Result<Catalog> {
        Catalog::new(self.catalog.clone())
    }

    pub fn goal(&self, category_id: &str) -> Option<&CategoryGoal> {
        self.goals.iter().find(|g| g.category_id == category_id)
    }

    /// Insert or replace the weekly goal for a category.
    pub fn set_goal(&mut self, category_id: &str, weekly_goal_minutes: u32) {
        match self.goals.iter_mut().find(|g| g.category_id == category_id) {
            Some(goal) => goal.weekly_goal_minutes = weekly_goal_minutes,
            None => self.goals.push(CategoryGoal {
                category_id: category_id.to_string(),
                weekly_goal_minutes,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.rewards.xp_per_minute, 10);
        assert_eq!(parsed.timer.conflict_policy, ConflictPolicy::Reject);
        assert_eq!(parsed.catalog, cfg.catalog);
    }

    #[test]
    fn empty_file_gets_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.timer.default_duration_min, 25);
        assert_eq!(parsed.timer.tick_interval_ms, 1000);
        assert_eq!(parsed.rewards.coins_per_minute, 1);
        assert!(!parsed.catalog.is_empty());
        assert!(parsed.goals.is_empty());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: Config = toml::from_str(
            "[rewards]\nxp_per_minute = 12\n\n[timer]\nconflict_policy = \"replace\"\n",
        )
        .unwrap();
        assert_eq!(parsed.rewards.xp_per_minute, 12);
        assert_eq!(parsed.rewards.coins_per_minute, 1);
        assert_eq!(parsed.timer.conflict_policy, ConflictPolicy::Replace);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("rewards.xp_per_minute").as_deref(), Some("10"));
        assert_eq!(cfg.get("timer.conflict_policy").as_deref(), Some("reject"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_value_updates_nested_fields() {
        let mut cfg = Config::default();
        cfg.set_value("rewards.coins_per_minute", "3").unwrap();
        cfg.set_value("timer.conflict_policy", "replace").unwrap();
        assert_eq!(cfg.rewards.coins_per_minute, 3);
        assert_eq!(cfg.timer.conflict_policy, ConflictPolicy::Replace);
    }

    #[test]
    fn set_value_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_value("timer.nonexistent", "1"),
            Err(CoreError::Config(ConfigError::UnknownKey(_)))
        ));
        assert!(cfg.set_value("rewards.xp_per_minute", "lots").is_err());
        assert!(cfg.set_value("timer.conflict_policy", "sometimes").is_err());
        assert_eq!(cfg.rewards.xp_per_minute, 10);
        assert_eq!(cfg.timer.conflict_policy, ConflictPolicy::Reject);
    }

    #[test]
    fn set_value_rejects_invalid_catalog() {
        let mut cfg = Config::default();
        let bad = r#"[{"name":"Bad","kind":"xp_booster","factor":0.0,"price_coins":1}]"#;
        assert!(cfg.set_value("catalog", bad).is_err());
        assert_eq!(cfg.catalog, Catalog::default_items());
    }

    #[test]
    fn set_goal_inserts_then_replaces() {
        let mut cfg = Config::default();
        cfg.set_goal("math", 300);
        cfg.set_goal("math", 240);
        cfg.set_goal("art", 60);
        assert_eq!(cfg.goals.len(), 2);
        assert_eq!(cfg.goal("math").unwrap().weekly_goal_minutes, 240);
    }
}
