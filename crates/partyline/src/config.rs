//! Configuration for the partyline host.
//!
//! Loaded from a TOML file; a default file is written when none exists so a
//! first run leaves something to edit.

use anyhow::Context;
use party_system::{NameLimits, SystemConfig, TemplateProvider};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Root configuration object, serialized to/from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Party naming rules.
    pub party: PartySettings,
    /// Chat templates and routing flags.
    pub chat: ChatSettings,
    /// Banned-word filter seed list.
    pub filter: FilterSettings,
    /// State file location.
    pub storage: StorageSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartySettings {
    /// Minimum party name length.
    #[serde(default = "default_name_min")]
    pub name_min_len: usize,
    /// Maximum party name length.
    #[serde(default = "default_name_max")]
    pub name_max_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Template for party chat lines.
    pub party_template: String,
    /// Template for admin chat lines.
    pub admin_template: String,
    /// Template for NSFW chat lines.
    pub nsfw_template: String,
    /// Whether the word filter also censors global chat.
    #[serde(default)]
    pub censor_global_chat: bool,
    /// Whether a bare `/p` toggles party chat.
    #[serde(default = "default_true")]
    pub toggle_with_p: bool,
    /// Whether `/p <message>` is inverted while party chat is toggled:
    /// the message goes to global chat instead.
    #[serde(default)]
    pub invert_p: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Words the filter starts out with.
    #[serde(default)]
    pub banned_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Where parties, spies and last channels are kept.
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter.
    pub level: String,
    /// JSON formatting.
    #[serde(default)]
    pub json_format: bool,
}

fn default_name_min() -> usize {
    4
}

fn default_name_max() -> usize {
    15
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            party: PartySettings {
                name_min_len: default_name_min(),
                name_max_len: default_name_max(),
            },
            chat: ChatSettings {
                party_template: "[{PARTYNAME}] {DISPLAYNAME}: {MESSAGE}".to_string(),
                admin_template: "[Admin] {DISPLAYNAME}: {MESSAGE}".to_string(),
                nsfw_template: "[NSFW] {DISPLAYNAME}: {MESSAGE}".to_string(),
                censor_global_chat: false,
                toggle_with_p: true,
                invert_p: false,
            },
            filter: FilterSettings {
                banned_words: Vec::new(),
            },
            storage: StorageSettings {
                state_file: PathBuf::from("partyline_state.toml"),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads the configuration, writing the defaults when the file is
    /// missing.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let config: AppConfig = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            let config = AppConfig::default();
            config.save(path)?;
            info!(path = %path.display(), "wrote default configuration");
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let raw = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn name_limits(&self) -> NameLimits {
        NameLimits {
            min: self.party.name_min_len,
            max: self.party.name_max_len,
        }
    }

    pub fn system_config(&self) -> SystemConfig {
        SystemConfig {
            name_limits: self.name_limits(),
            censor_global_chat: self.chat.censor_global_chat,
        }
    }
}

/// Template provider backed by the `[chat]` section.
#[derive(Debug, Clone)]
pub struct ConfigTemplates {
    party: String,
    admin: String,
    nsfw: String,
}

impl From<&ChatSettings> for ConfigTemplates {
    fn from(chat: &ChatSettings) -> Self {
        Self {
            party: chat.party_template.clone(),
            admin: chat.admin_template.clone(),
            nsfw: chat.nsfw_template.clone(),
        }
    }
}

impl TemplateProvider for ConfigTemplates {
    fn party_chat(&self) -> String {
        self.party.clone()
    }

    fn admin_chat(&self) -> String {
        self.admin.clone()
    }

    fn nsfw_chat(&self) -> String {
        self.nsfw.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let written = AppConfig::load_or_create(&path).unwrap();
        assert!(path.exists());

        let reread = AppConfig::load_or_create(&path).unwrap();
        assert_eq!(reread.party.name_min_len, written.party.name_min_len);
        assert_eq!(reread.chat.party_template, written.chat.party_template);
        assert_eq!(reread.storage.state_file, written.storage.state_file);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[party]

[chat]
party_template = "P {DISPLAYNAME}: {MESSAGE}"
admin_template = "A {DISPLAYNAME}: {MESSAGE}"
nsfw_template = "N {DISPLAYNAME}: {MESSAGE}"
censor_global_chat = true

[filter]
banned_words = ["creeper"]

[storage]
state_file = "state.toml"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = AppConfig::load_or_create(&path).unwrap();
        assert_eq!(config.party.name_min_len, 4);
        assert_eq!(config.party.name_max_len, 15);
        assert!(config.chat.censor_global_chat);
        assert!(config.chat.toggle_with_p);
        assert_eq!(config.filter.banned_words, vec!["creeper".to_string()]);
        assert_eq!(config.logging.level, "debug");
    }
}
