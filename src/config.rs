//! Configuration types, read from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// User-facing texts.
///
/// Defaults are the bot's long-standing prompts, except `confirmation`,
/// whose old text announced one specific trip and is now a plain thank-you.
/// Deployments override any of them through `SIGNUP_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub name: String,
    pub phone: String,
    /// Label of the share-contact keyboard button.
    pub contact_button: String,
    pub confirmation: String,
    pub closing: String,
    pub restart: String,
    /// Sent when an event could not be processed.
    pub failure: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            name: "👋 እንኳን ደህና መጡ! እባክዎ ሙሉ ስምዎን ያስገቡ።".to_string(),
            phone: "Please share your phone number or type it manually:".to_string(),
            contact_button: "📞 Share your phone".to_string(),
            confirmation: "✅ ስለተመዘገቡ እናመሰግናለን። Thank you for registering!".to_string(),
            closing: "You can now close the chat.".to_string(),
            restart: "Please type /start to begin.".to_string(),
            failure: "⚠️ Something went wrong. Please try again in a moment.".to_string(),
        }
    }
}

impl Prompts {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let pick = |key: &str, default: String| {
            lookup(key).filter(|s| !s.trim().is_empty()).unwrap_or(default)
        };
        Self {
            name: pick("SIGNUP_PROMPT_NAME", defaults.name),
            phone: pick("SIGNUP_PROMPT_PHONE", defaults.phone),
            contact_button: pick("SIGNUP_CONTACT_BUTTON", defaults.contact_button),
            confirmation: pick("SIGNUP_CONFIRMATION", defaults.confirmation),
            closing: pick("SIGNUP_CLOSING", defaults.closing),
            restart: pick("SIGNUP_RESTART", defaults.restart),
            failure: pick("SIGNUP_FAILURE", defaults.failure),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token. Without one the bot runs on the local CLI channel.
    pub telegram_token: Option<SecretString>,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Port of the read-only HTTP reporting server.
    pub http_port: u16,
    /// Allowed CORS origin for the reporting server (`*` for any).
    pub cors_origin: String,
    /// Dialogs idle for longer than this are dropped.
    pub session_idle_timeout: Duration,
    pub prompts: Prompts,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            db_path: PathBuf::from("./data/signup-bot.db"),
            http_port: 8000,
            cors_origin: "*".to_string(),
            session_idle_timeout: Duration::from_secs(3600), // 1 hour
            prompts: Prompts::default(),
        }
    }
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let telegram_token = lookup("TELEGRAM_BOT_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        let db_path = lookup("SIGNUP_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let http_port = match lookup("SIGNUP_HTTP_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "SIGNUP_HTTP_PORT".into(),
                message: format!("{raw:?}: {e}"),
            })?,
            None => defaults.http_port,
        };

        let cors_origin = lookup("SIGNUP_CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        let session_idle_timeout = match lookup("SIGNUP_SESSION_IDLE_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                Ok(_) => {
                    return Err(ConfigError::InvalidValue {
                        key: "SIGNUP_SESSION_IDLE_SECS".into(),
                        message: "must be greater than zero".into(),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::InvalidValue {
                        key: "SIGNUP_SESSION_IDLE_SECS".into(),
                        message: format!("{raw:?}: {e}"),
                    });
                }
            },
            None => defaults.session_idle_timeout,
        };

        Ok(Self {
            telegram_token,
            db_path,
            http_port,
            cors_origin,
            session_idle_timeout,
            prompts: Prompts::from_lookup(&lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = BotConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.telegram_token.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/signup-bot.db"));
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.cors_origin, "*");
        assert_eq!(config.session_idle_timeout, Duration::from_secs(3600));
        assert_eq!(config.prompts, Prompts::default());
    }

    #[test]
    fn values_from_lookup() {
        let config = BotConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", " 123:abc "),
            ("SIGNUP_DB_PATH", "/var/lib/signup/bot.db"),
            ("SIGNUP_HTTP_PORT", "9090"),
            ("SIGNUP_CORS_ORIGIN", "https://example.org"),
            ("SIGNUP_SESSION_IDLE_SECS", "120"),
            ("SIGNUP_CLOSING", "Bye!"),
            ("SIGNUP_CONFIRMATION", "See you Sunday at 8:00."),
        ]))
        .unwrap();

        assert_eq!(
            config.telegram_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("123:abc".to_string())
        );
        assert_eq!(config.db_path, PathBuf::from("/var/lib/signup/bot.db"));
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.cors_origin, "https://example.org");
        assert_eq!(config.session_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.prompts.closing, "Bye!");
        assert_eq!(config.prompts.confirmation, "See you Sunday at 8:00.");
        assert_eq!(config.prompts.restart, Prompts::default().restart);
    }

    #[test]
    fn blank_token_means_no_telegram() {
        let config = BotConfig::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "  ")])).unwrap();
        assert!(config.telegram_token.is_none());
    }

    #[test]
    fn blank_prompt_keeps_default() {
        let config = BotConfig::from_lookup(lookup(&[("SIGNUP_PROMPT_NAME", "")])).unwrap();
        assert_eq!(config.prompts.name, Prompts::default().name);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = BotConfig::from_lookup(lookup(&[("SIGNUP_HTTP_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SIGNUP_HTTP_PORT"));
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        let err =
            BotConfig::from_lookup(lookup(&[("SIGNUP_SESSION_IDLE_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
