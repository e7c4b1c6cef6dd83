//! Configuration for presence-daemon

use presence_tracker::TrackerConfig;
use presence_types::{DirectoryEntry, EntryKind, Subscription, UserId};
use serde::{Deserialize, Serialize};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// One tracker per entry
    #[serde(default)]
    pub trackers: Vec<TrackerConfig>,

    /// Subtree and properties to watch
    #[serde(default)]
    pub subscription: Subscription,

    /// In-memory directory seed
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Users the in-memory directory starts with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// A directory user created at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: String,

    /// Create as a system user
    #[serde(default)]
    pub system: bool,

    #[serde(default)]
    pub disabled: bool,
}

impl SeedUser {
    pub fn entry(&self) -> DirectoryEntry {
        DirectoryEntry {
            id: UserId::new(self.id.clone()),
            kind: if self.system {
                EntryKind::SystemUser
            } else {
                EntryKind::User
            },
            disabled: self.disabled,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `PRESENCE_` environment variables with `__` between nested keys
    /// (`PRESENCE_LOGGING__LEVEL=debug`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PRESENCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Add trackers for users not configured yet.
    pub fn track_users<I, S>(&mut self, users: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for user in users {
            let user = user.into();
            if !self.trackers.iter().any(|t| t.user_id == user) {
                self.trackers.push(TrackerConfig::new(user));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_types::USERS_PATH;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert!(config.trackers.is_empty());
        assert_eq!(config.subscription.root_path, USERS_PATH);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = DaemonConfig::load(Some("/nonexistent/presence")).unwrap();
        assert!(config.directory.users.is_empty());
        assert_eq!(config.subscription.properties.len(), 3);
    }

    #[test]
    fn test_load_nested_key_from_env() {
        std::env::set_var("PRESENCE_LOGGING__LEVEL", "debug");
        let config = DaemonConfig::load(None);
        std::env::remove_var("PRESENCE_LOGGING__LEVEL");

        assert_eq!(config.unwrap().logging.level, "debug");
    }

    #[test]
    fn test_track_users_deduplicates() {
        let mut config = DaemonConfig::default();
        config.track_users(["alice", "bob", "alice"]);
        assert_eq!(
            config.trackers,
            vec![TrackerConfig::new("alice"), TrackerConfig::new("bob")]
        );
    }

    #[test]
    fn test_seed_user_entry() {
        let seed = SeedUser {
            id: "sling-readall".to_string(),
            system: true,
            disabled: false,
        };
        assert_eq!(
            seed.entry(),
            DirectoryEntry::system_user("sling-readall")
        );
    }
}
