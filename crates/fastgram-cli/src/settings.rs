//! The config file as the CLI may write it back.

use fastgram_core::Config;
use tracing::{debug, warn};

/// Tracks the config file contents separately from the effective config, so
/// environment and `--api-url` overrides are never persisted. When the file
/// could not be read, nothing is written to it.
pub struct Settings {
    stored: Option<Config>,
}

impl Settings {
    pub fn new(stored: Option<Config>) -> Self {
        Self { stored }
    }

    /// Remember the email used to sign in. Returns whether the file was written.
    pub fn remember_email(&mut self, email: &str) -> bool {
        let Some(stored) = self.stored.as_mut() else {
            debug!("Config file unreadable, not overwriting it");
            return false;
        };
        if stored.last_email.as_deref() == Some(email) {
            return false;
        }

        stored.last_email = Some(email.to_string());
        match stored.save() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to save config");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_config_is_not_overwritten() {
        let mut settings = Settings::new(None);
        assert!(!settings.remember_email("ada@example.com"));
        assert!(settings.stored.is_none());
    }

    #[test]
    fn test_same_email_is_not_saved_again() {
        let mut settings = Settings::new(Some(Config {
            last_email: Some("ada@example.com".to_string()),
            ..Config::default()
        }));
        assert!(!settings.remember_email("ada@example.com"));
    }
}
