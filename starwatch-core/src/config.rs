use crate::{ConfigError, CoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const PLACEHOLDER_API_ID: &str = "YOUR_API_ID";
const DEFAULT_FLOOD_MARKER: &str = "Необходимо подождать";

/// Runtime configuration, loaded once at startup and read-only afterwards.
///
/// Every field carries an explicit default so that a partial file never
/// leaves an option silently unset. Durations are whole seconds on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub api_id: String,
    pub api_hash: String,
    pub phone_number: String,
    #[serde(alias = "lolz_token")]
    pub forum_token: String,
    pub forum_thread_id: String,
    pub forum_base_url: String,
    pub messaging_gateway_url: String,
    pub session_name: String,
    pub stars_count: u32,
    pub check_interval: u64,
    pub api_delay: u64,
    pub max_retries: u32,
    pub retry_base_delay: u64,
    pub flood_wait_margin: u64,
    pub max_flood_waits: u32,
    pub reaction_spacing: u64,
    pub page_fetch_delay: u64,
    pub pages_per_cycle: u32,
    pub processed_posts_file: PathBuf,
    pub enable_reply: bool,
    pub reply_templates: Vec<String>,
    pub mention_author: bool,
    pub skip_posts_with_comments: bool,
    pub resolve_latest_message: bool,
    pub forum_flood_marker: String,
    pub request_timeout: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_id: String::new(),
            api_hash: String::new(),
            phone_number: String::new(),
            forum_token: String::new(),
            forum_thread_id: String::new(),
            forum_base_url: "https://prod-api.lolz.live".to_string(),
            messaging_gateway_url: "http://127.0.0.1:8081".to_string(),
            session_name: "stars_bot_session".to_string(),
            stars_count: 3,
            check_interval: 30,
            api_delay: 5,
            max_retries: 3,
            retry_base_delay: 3,
            flood_wait_margin: 2,
            max_flood_waits: 10,
            reaction_spacing: 1,
            page_fetch_delay: 1,
            pages_per_cycle: 1,
            processed_posts_file: PathBuf::from("processed_posts.json"),
            enable_reply: true,
            reply_templates: vec![
                "Готово! Отправил звезды. ⭐".to_string(),
                "Выполнено.".to_string(),
                "Сделал.".to_string(),
                "+rep".to_string(),
            ],
            mention_author: true,
            skip_posts_with_comments: true,
            resolve_latest_message: true,
            forum_flood_marker: DEFAULT_FLOOD_MARKER.to_string(),
            request_timeout: 30,
        }
    }
}

impl BotConfig {
    /// Load and validate a configuration file. Files ending in `.toml` are
    /// parsed as TOML, everything else as JSON.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        Self::load_with_thread(path, None)
    }

    /// Like [`BotConfig::load`], with a command-line thread id applied
    /// before validation so it can stand in for a missing one.
    pub fn load_with_thread(path: &Path, thread_id: Option<String>) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = Self::parse(&raw, is_toml(path))?.with_thread_override(thread_id);
        config.validate()?;

        info!(outcome = "success", "Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn parse(raw: &str, toml_format: bool) -> Result<Self, ConfigError> {
        if toml_format {
            Ok(toml::from_str(raw)?)
        } else {
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidFormat {
                details: e.to_string(),
            })
        }
    }

    /// Write a template with every default and placeholder credentials.
    pub fn write_template(path: &Path) -> Result<(), CoreError> {
        let template = Self {
            api_id: PLACEHOLDER_API_ID.to_string(),
            api_hash: "YOUR_API_HASH".to_string(),
            phone_number: "+10000000000".to_string(),
            forum_token: "YOUR_FORUM_TOKEN".to_string(),
            forum_thread_id: "0".to_string(),
            ..Default::default()
        };

        let rendered = if is_toml(path) {
            toml::to_string_pretty(&template).map_err(|e| ConfigError::InvalidFormat {
                details: e.to_string(),
            })?
        } else {
            serde_json::to_string_pretty(&template)?
        };

        std::fs::write(path, rendered)?;
        info!(outcome = "success", "Configuration template written to {}", path.display());
        Ok(())
    }

    pub fn with_thread_override(mut self, thread_id: Option<String>) -> Self {
        if let Some(thread_id) = thread_id.filter(|id| !id.trim().is_empty()) {
            debug!("Thread id overridden from command line: {}", thread_id);
            self.forum_thread_id = thread_id;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("api_id", &self.api_id),
            ("api_hash", &self.api_hash),
            ("phone_number", &self.phone_number),
            ("forum_token", &self.forum_token),
            ("forum_thread_id", &self.forum_thread_id),
            ("session_name", &self.session_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        if self.api_id == PLACEHOLDER_API_ID {
            return Err(ConfigError::InvalidValue {
                field: "api_id".to_string(),
                value: self.api_id.clone(),
            });
        }

        for (field, value) in [
            ("max_retries", u64::from(self.max_retries)),
            ("stars_count", u64::from(self.stars_count)),
            ("check_interval", self.check_interval),
            ("pages_per_cycle", u64::from(self.pages_per_cycle)),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }

        if self.enable_reply && self.reply_templates.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed {
                reason: "enable_reply is set but reply_templates is empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_secs(self.api_delay)
    }

    pub fn reaction_spacing(&self) -> Duration {
        Duration::from_secs(self.reaction_spacing)
    }

    pub fn page_fetch_delay(&self) -> Duration {
        Duration::from_secs(self.page_fetch_delay)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_secs(self.retry_base_delay)
    }

    pub fn flood_wait_margin(&self) -> Duration {
        Duration::from_secs(self.flood_wait_margin)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Location of the messaging session file; its absence marks a first run.
    pub fn session_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.session", self.session_name))
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_json() -> String {
        r#"{
            "api_id": "12345",
            "api_hash": "abcdef",
            "phone_number": "+15550001111",
            "lolz_token": "token",
            "forum_thread_id": "777"
        }"#
        .to_string()
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let config = BotConfig::parse(&valid_json(), false).unwrap();
        assert_eq!(config.forum_token, "token");
        assert_eq!(config.stars_count, 3);
        assert_eq!(config.max_retries, 3);
        assert!(config.skip_posts_with_comments);
        assert!(config.resolve_latest_message);
        assert_eq!(config.reply_templates.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_placeholder_api_id_is_rejected() {
        let mut config = BotConfig::parse(&valid_json(), false).unwrap();
        config.api_id = PLACEHOLDER_API_ID.to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "api_id"
        ));
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let mut config = BotConfig::parse(&valid_json(), false).unwrap();
        config.forum_token = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { field }) if field == "forum_token"
        ));
    }

    #[test]
    fn test_zero_retries_is_rejected() {
        let mut config = BotConfig::parse(&valid_json(), false).unwrap();
        config.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reply_without_templates_is_rejected() {
        let mut config = BotConfig::parse(&valid_json(), false).unwrap();
        config.reply_templates.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));

        config.enable_reply = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_format() {
        let raw = r#"
            api_id = "1"
            api_hash = "h"
            phone_number = "+1"
            forum_token = "t"
            forum_thread_id = "42"
            check_interval = 60
            enable_reply = false
        "#;
        let config = BotConfig::parse(raw, true).unwrap();
        assert_eq!(config.check_interval(), Duration::from_secs(60));
        assert!(!config.enable_reply);
    }

    #[test]
    fn test_invalid_json_reports_format_error() {
        assert!(matches!(
            BotConfig::parse("{not json", false),
            Err(ConfigError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_thread_override() {
        let config = BotConfig::parse(&valid_json(), false).unwrap();
        let overridden = config.clone().with_thread_override(Some("999".to_string()));
        assert_eq!(overridden.forum_thread_id, "999");

        let untouched = config.with_thread_override(Some(" ".to_string()));
        assert_eq!(untouched.forum_thread_id, "777");
    }

    #[test]
    fn test_template_round_trips_but_fails_validation() {
        let path = std::env::temp_dir().join(format!("starwatch_config_{}.json", uuid::Uuid::new_v4()));
        BotConfig::write_template(&path).unwrap();

        let err = BotConfig::load(&path).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::InvalidValue { .. })
        ));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_command_line_thread_fills_missing_thread_id() {
        let path = std::env::temp_dir().join(format!("starwatch_config_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"api_id": "1", "api_hash": "h", "phone_number": "+1", "forum_token": "t"}"#,
        )
        .unwrap();

        assert!(matches!(
            BotConfig::load(&path).unwrap_err(),
            CoreError::Config(ConfigError::MissingField { field }) if field == "forum_thread_id"
        ));

        let config = BotConfig::load_with_thread(&path, Some("4242".to_string())).unwrap();
        assert_eq!(config.forum_thread_id, "4242");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file() {
        let err = BotConfig::load(Path::new("/nonexistent/starwatch.json")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_session_path() {
        let config = BotConfig::default();
        assert_eq!(config.session_path(), PathBuf::from("stars_bot_session.session"));
    }
}
