//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::application::errors::ConfigError;
use crate::application::messaging::throttle::ThrottleConfig;

/// Bot configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub irc: IrcConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
}

/// Network and identity parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct IrcConfig {
    pub server: String,
    pub nick: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
}

/// Enabled modules, in load order, plus one parameter map per module
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModulesConfig {
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        let mut params = BTreeMap::new();
        params.insert(
            "karma".to_string(),
            serde_json::json!({ "filename": "karma.json", "debouncing-rate": 5000 }),
        );

        Self {
            irc: IrcConfig {
                server: "irc.libera.chat".to_string(),
                nick: "relay-bot".to_string(),
                owner: None,
                channels: vec!["#relay-bot".to_string()],
                user_name: None,
                real_name: None,
            },
            throttle: ThrottleConfig::default(),
            modules: ModulesConfig {
                enabled: vec!["help".to_string(), "karma".to_string()],
                params,
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.irc.nick.trim().is_empty() {
            return Err(ConfigError::InvalidValue("irc.nick must not be empty".to_string()));
        }
        if self.throttle.burst_limit == 0 {
            return Err(ConfigError::InvalidValue("throttle.burst-limit must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parameters for `module`, an empty object when none are configured
    pub fn module_params(&self, module: &str) -> serde_json::Value {
        self.modules
            .params
            .get(module)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r##"
irc:
  server: irc.example.org
  nick: relay-bot
  owner: admin
  channels: ["#one", "#two"]
throttle:
  burst-limit: 3
modules:
  enabled: [karma, help]
  karma:
    filename: /tmp/karma.json
    debouncing_rate: 100
"##;

    #[test]
    fn parses_full_document() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.irc.owner.as_deref(), Some("admin"));
        assert_eq!(config.irc.channels, vec!["#one", "#two"]);
        assert_eq!(config.throttle.burst_limit, 3);
        assert_eq!(config.throttle.window_ms, 1000);
        assert_eq!(config.modules.enabled, vec!["karma", "help"]);
        assert_eq!(
            config.module_params("karma"),
            json!({ "filename": "/tmp/karma.json", "debouncing_rate": 100 })
        );
        assert_eq!(config.module_params("help"), json!({}));
    }

    #[test]
    fn sections_default_when_absent() {
        let config = Config::parse("irc:\n  server: s\n  nick: n\n").unwrap();
        assert_eq!(config.throttle, ThrottleConfig::default());
        assert!(config.modules.enabled.is_empty());
    }

    #[test]
    fn invalid_documents_are_rejected() {
        assert!(matches!(Config::parse("irc: [unclosed"), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::parse("modules:\n  enabled: []\n"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            Config::parse("irc:\n  server: s\n  nick: ''\n"),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(Config::load("/nonexistent/relay-bot.yaml"), Err(ConfigError::Read(_))));
    }

    #[test]
    fn default_round_trips_through_yaml() {
        let config = Config::default();
        let parsed = Config::parse(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
