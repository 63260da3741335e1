use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub location: LocationConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub web: WebConfig,
    pub api_keys: Vec<ApiKey>,
}

/// Pointers to deployment-provided artifacts; the service never writes
/// either file.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub outputs_file: PathBuf,
    pub identity_token_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LocationConfig {
    Agent {
        url: String,
        #[serde(
            default = "default_agent_timeout",
            deserialize_with = "deserialize_duration"
        )]
        timeout: Duration,
        #[serde(default = "default_high_accuracy")]
        high_accuracy: bool,
    },
    Fixed {
        coordinates: String,
    },
}

fn default_agent_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_high_accuracy() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SinkConfig {
    Topic {
        endpoint: String,
        #[serde(default = "default_topic_prefix")]
        topic_prefix: String,
    },
    Records {
        endpoint: String,
    },
}

fn default_topic_prefix() -> String {
    "location".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(
        default = "default_period",
        deserialize_with = "deserialize_duration"
    )]
    pub period: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
        }
    }
}

fn default_period() -> Duration {
    Duration::from_secs(5)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ControlSession,
    ViewStatus,
    ViewHistory,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
auth:
  outputs_file: ./outputs.json
  identity_token_file: ./identity.token
location:
  source: agent
  url: http://127.0.0.1:7000/fix
  timeout: 5s
  high_accuracy: true
sink:
  mode: topic
  endpoint: https://broker.example.com
  topic_prefix: location
session:
  period: 5s
web:
  bind: 127.0.0.1:8080
api_keys:
  - key: secret-1
    name: dashboard
    permissions: [control_session, view_status, view_history]
"#;

    #[test]
    fn parses_full_config() {
        let config: Config = serde_yaml::from_str(FULL).unwrap();
        assert_eq!(config.session.period, Duration::from_secs(5));
        assert_eq!(config.web.bind, "127.0.0.1:8080");
        match &config.location {
            LocationConfig::Agent {
                url,
                timeout,
                high_accuracy,
            } => {
                assert_eq!(url, "http://127.0.0.1:7000/fix");
                assert_eq!(*timeout, Duration::from_secs(5));
                assert!(*high_accuracy);
            }
            other => panic!("unexpected location config: {:?}", other),
        }
        match &config.sink {
            SinkConfig::Topic { topic_prefix, .. } => assert_eq!(topic_prefix, "location"),
            other => panic!("unexpected sink config: {:?}", other),
        }
    }

    #[test]
    fn session_section_defaults_when_absent() {
        let yaml = r#"
auth:
  outputs_file: ./outputs.json
  identity_token_file: ./identity.token
location:
  source: fixed
  coordinates: "52.52, 13.405"
sink:
  mode: records
  endpoint: https://store.example.com
web: {}
api_keys: []
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.session.period, Duration::from_secs(5));
        assert_eq!(config.web.bind, "0.0.0.0:8080");
        assert!(matches!(config.sink, SinkConfig::Records { .. }));
    }

    #[test]
    fn api_key_lookup_checks_permissions() {
        let config: Config = serde_yaml::from_str(FULL).unwrap();
        let key = config.find_api_key("secret-1").unwrap();
        assert_eq!(key.name, "dashboard");
        assert!(key.permissions.contains(&Permission::ViewHistory));
        assert!(config.find_api_key("nope").is_none());
    }
}
