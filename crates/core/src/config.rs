// crates/core/src/config.rs
//! Engine configuration.
//!
//! Loaded from TOML (`<config_dir>/replyradar/config.toml` unless a path is
//! given) with `REPLYRADAR_*` environment overrides on top:
//!
//! ```toml
//! [thresholds]
//! sla_hours = 12
//! stale_outbound_calendar = "calendar_days"
//!
//! [followup]
//! batch_size = 50
//!
//! [ai]
//! model = "classifier-small"
//! daily_cap = 200
//! command = ["replyradar-classify", "--json"]
//!
//! [logging]
//! level = "debug"
//! json = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::followup::FollowupConfig;
use crate::interpretation::gate::{BudgetLimits, DEFAULT_AMBIGUITY_KEYWORDS};
use crate::interpretation::prompt::PROMPT_VERSION;
use crate::signals::{check_range, Thresholds, MAX_THRESHOLD_HOURS};

const ENV_PREFIX: &str = "REPLYRADAR_";

/// Classifier gate and runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub model: String,
    pub prompt_version: String,
    pub max_input_chars: usize,
    pub timeout_ms: u64,
    pub daily_cap: u32,
    pub per_conversation_cap: u32,
    pub ambiguity_keywords: Vec<String>,
    /// argv of an external classifier command; empty means no runtime.
    pub command: Vec<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "classifier-small".into(),
            prompt_version: PROMPT_VERSION.into(),
            max_input_chars: 600,
            timeout_ms: 8_000,
            daily_cap: 500,
            per_conversation_cap: 3,
            ambiguity_keywords: DEFAULT_AMBIGUITY_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            command: Vec::new(),
        }
    }
}

impl AiConfig {
    pub fn limits(&self) -> BudgetLimits {
        BudgetLimits {
            daily_cap: self.daily_cap,
            per_conversation_cap: self.per_conversation_cap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    pub json: bool,
    /// Write a daily-rolling log file here in addition to stderr.
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            file_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub followup: FollowupConfig,
    pub ai: AiConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load config, apply environment overrides, validate.
    ///
    /// An explicit `path` must exist. The default location is optional: when
    /// it is missing, defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match crate::paths::config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::from_toml_str(&text, path)
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `REPLYRADAR_*` overrides from the given variables.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "AI_ENABLED" => self.ai.enabled = parse_env(&key, &value)?,
                "AI_MODEL" => self.ai.model = value,
                "AI_DAILY_CAP" => self.ai.daily_cap = parse_env(&key, &value)?,
                "AI_PER_CONVERSATION_CAP" => {
                    self.ai.per_conversation_cap = parse_env(&key, &value)?
                }
                "AI_TIMEOUT_MS" => self.ai.timeout_ms = parse_env(&key, &value)?,
                "AI_MAX_INPUT_CHARS" => self.ai.max_input_chars = parse_env(&key, &value)?,
                "LOG_LEVEL" => self.logging.level = value,
                "LOG_JSON" => self.logging.json = parse_env(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Semantic checks serde can't express. Reports every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = self.thresholds.problems("thresholds.");
        for (name, value) in [
            ("idle_threshold_hours", self.followup.idle_threshold_hours),
            ("revival_window_hours", self.followup.revival_window_hours),
        ] {
            check_range(&mut problems, "followup.", name, value, MAX_THRESHOLD_HOURS);
        }
        if self.followup.batch_size == 0 {
            problems.push("followup.batch_size must be at least 1".to_string());
        }
        if self.ai.max_input_chars == 0 {
            problems.push("ai.max_input_chars must be at least 1".to_string());
        }
        if self.ai.timeout_ms == 0 {
            problems.push("ai.timeout_ms must be at least 1".to_string());
        }
        if self.ai.model.trim().is_empty() {
            problems.push("ai.model must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems.join("; ")))
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::CalendarMode;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.thresholds.sla_hours, 24);
        assert_eq!(c.followup.batch_size, 100);
        assert_eq!(c.ai.prompt_version, PROMPT_VERSION);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let text = r#"
            [thresholds]
            sla_hours = 12
            stale_outbound_calendar = "calendar_days"

            [followup]
            batch_size = 25

            [ai]
            daily_cap = 7
            command = ["cls", "--json"]
        "#;
        let c = EngineConfig::from_toml_str(text, Path::new("inline")).unwrap();
        assert_eq!(c.thresholds.sla_hours, 12);
        assert_eq!(c.thresholds.stale_outbound_calendar, CalendarMode::CalendarDays);
        assert_eq!(c.thresholds.inactivity_timeout_days, 30);
        assert_eq!(c.followup.batch_size, 25);
        assert_eq!(c.followup.idle_threshold_hours, 24);
        assert_eq!(c.ai.daily_cap, 7);
        assert_eq!(c.ai.command, vec!["cls".to_string(), "--json".to_string()]);
        assert_eq!(c.logging, LoggingConfig::default());
    }

    #[test]
    fn test_malformed_toml() {
        let err = EngineConfig::from_toml_str("[ai\nmodel = ", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"\njson = true").unwrap();
        let c = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(c.logging.level, "debug");
        assert!(c.logging.json);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut c = EngineConfig::default();
        c.apply_env_overrides(vars(&[
            ("REPLYRADAR_AI_MODEL", "other"),
            ("REPLYRADAR_AI_DAILY_CAP", "42"),
            ("REPLYRADAR_AI_ENABLED", "false"),
            ("UNRELATED", "x"),
            ("REPLYRADAR_UNKNOWN", "ignored"),
        ]))
        .unwrap();
        assert_eq!(c.ai.model, "other");
        assert_eq!(c.ai.daily_cap, 42);
        assert!(!c.ai.enabled);
    }

    #[test]
    fn test_env_override_bad_value() {
        let mut c = EngineConfig::default();
        let err = c
            .apply_env_overrides(vars(&[("REPLYRADAR_AI_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validation_collects_all() {
        let mut c = EngineConfig::default();
        c.followup.batch_size = 0;
        c.thresholds.sla_hours = -1;
        let ConfigError::Validation(msg) = c.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(msg.contains("batch_size"));
        assert!(msg.contains("thresholds.sla_hours"));
    }

    #[test]
    fn test_validation_rejects_out_of_range_windows() {
        let text = r#"
            [followup]
            idle_threshold_hours = 9223372036854775807

            [thresholds]
            inactivity_timeout_days = 100000
        "#;
        let c = EngineConfig::from_toml_str(text, Path::new("inline")).unwrap();
        let ConfigError::Validation(msg) = c.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(msg.contains("followup.idle_threshold_hours"));
        assert!(msg.contains("thresholds.inactivity_timeout_days"));
        assert!(!msg.contains("revival_window_hours"));
    }
}
