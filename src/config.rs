//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Token budget for interactive classification.
pub const INTERACTIVE_MAX_LENGTH: usize = 64;

/// Token budget the offline preparation pipeline tokenizes training data with.
///
/// Kept separate from [`INTERACTIVE_MAX_LENGTH`]; checkpoints record the value
/// they were prepared with and the classifier only logs a mismatch.
pub const TRAINING_MAX_LENGTH: usize = 256;

/// Default submission endpoint.
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Standard mail submission port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Sender address used by the demo login.
pub const DEMO_USER_EMAIL: &str = "demo@email.ai";

/// Classifier configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Directory holding `checkpoint.json` and `vocab.txt`.
    pub checkpoint_dir: PathBuf,
    /// Maximum sequence length, `[CLS]`/`[SEP]` included.
    pub max_length: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./model"),
            max_length: INTERACTIVE_MAX_LENGTH,
        }
    }
}

/// Mail transport configuration. Credentials are supplied per send, never here.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
        }
    }
}

/// Application configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub smtp: SmtpConfig,
    /// Logged-in sender address.
    pub user_email: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            smtp: SmtpConfig::default(),
            user_email: DEMO_USER_EMAIL.to_string(),
        }
    }
}

impl AppConfig {
    /// Build config from `INTENT_MAIL_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let checkpoint_dir = lookup("INTENT_MAIL_CHECKPOINT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.classifier.checkpoint_dir);

        let max_length = match lookup("INTENT_MAIL_MAX_LENGTH") {
            Some(raw) => parse_value::<usize>("INTENT_MAIL_MAX_LENGTH", &raw)?,
            None => defaults.classifier.max_length,
        };
        // [CLS] and [SEP] alone take two slots.
        if max_length < 3 {
            return Err(ConfigError::InvalidValue {
                key: "INTENT_MAIL_MAX_LENGTH".into(),
                message: format!("must be at least 3, got {max_length}"),
            });
        }

        let host = lookup("INTENT_MAIL_SMTP_HOST").unwrap_or(defaults.smtp.host);

        let port = match lookup("INTENT_MAIL_SMTP_PORT") {
            Some(raw) => parse_value::<u16>("INTENT_MAIL_SMTP_PORT", &raw)?,
            None => defaults.smtp.port,
        };

        let user_email = lookup("INTENT_MAIL_USER_EMAIL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.user_email);

        Ok(Self {
            classifier: ClassifierConfig {
                checkpoint_dir,
                max_length,
            },
            smtp: SmtpConfig { host, port },
            user_email,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.classifier.max_length, INTERACTIVE_MAX_LENGTH);
        assert_eq!(config.classifier.checkpoint_dir, PathBuf::from("./model"));
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.user_email, DEMO_USER_EMAIL);
    }

    #[test]
    fn interactive_and_training_lengths_stay_distinct() {
        assert_eq!(INTERACTIVE_MAX_LENGTH, 64);
        assert_eq!(TRAINING_MAX_LENGTH, 256);
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("INTENT_MAIL_CHECKPOINT_DIR", "/opt/model"),
            ("INTENT_MAIL_MAX_LENGTH", "128"),
            ("INTENT_MAIL_SMTP_HOST", "mail.example.com"),
            ("INTENT_MAIL_SMTP_PORT", "2525"),
            ("INTENT_MAIL_USER_EMAIL", " me@example.com "),
        ]))
        .unwrap();
        assert_eq!(config.classifier.checkpoint_dir, PathBuf::from("/opt/model"));
        assert_eq!(config.classifier.max_length, 128);
        assert_eq!(config.smtp.host, "mail.example.com");
        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.user_email, "me@example.com");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("INTENT_MAIL_SMTP_PORT", "smtp")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "INTENT_MAIL_SMTP_PORT"));
    }

    #[test]
    fn max_length_too_small_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("INTENT_MAIL_MAX_LENGTH", "2")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
