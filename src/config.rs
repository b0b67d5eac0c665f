use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{name}`: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Credentials and target for the GitHub-hosted asset repository.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub token: String,
    pub user: String,
    pub repo: String,
    pub branch: String,
}

impl PublishConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            token: required(&lookup, "GITHUB_TOKEN")?,
            user: required(&lookup, "GITHUB_USER")?,
            repo: required(&lookup, "REPO_NAME")?,
            branch: required(&lookup, "BRANCH")?,
        })
    }
}

/// Endpoint and key for the document-database data API.
#[derive(Debug, Clone)]
pub struct DocStoreConfig {
    pub url: String,
    pub api_key: String,
}

impl DocStoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: required(&lookup, "DB_URL")?
                .trim_end_matches('/')
                .to_string(),
            api_key: required(&lookup, "DB_API_KEY")?,
        })
    }
}

/// Where the file-backed collections live and which encounter node to track.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub encounter_node: u32,
}

impl DataConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| ".".to_string());
        let encounter_node = match env::var("ENCOUNTER_NODE") {
            Ok(raw) => raw.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                name: "ENCOUNTER_NODE",
                value: raw,
            })?,
            Err(_) => DEFAULT_ENCOUNTER_NODE,
        };
        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            encounter_node,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub publish: PublishConfig,
    pub data: DataConfig,
    /// Upstream ids excluded from the character category (placeholder entries).
    pub excluded_characters: Vec<String>,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            publish: PublishConfig::from_env()?,
            data: DataConfig::from_env()?,
            excluded_characters: EXCLUDED_CHARACTERS
                .iter()
                .map(|id| id.to_string())
                .collect(),
        })
    }
}

const DEFAULT_ENCOUNTER_NODE: u32 = 62022;

const EXCLUDED_CHARACTERS: &[&str] = &["2011", "2021"];

fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let owned: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| {
            owned
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn publish_config_requires_every_value() {
        let lookup = fake_env(&[
            ("GITHUB_USER", "octocat"),
            ("REPO_NAME", "assets"),
            ("BRANCH", "main"),
        ]);
        let err = PublishConfig::from_lookup(lookup).expect_err("token missing");
        assert!(matches!(err, ConfigError::Missing("GITHUB_TOKEN")));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let lookup = fake_env(&[("DB_URL", "   "), ("DB_API_KEY", "key")]);
        let err = DocStoreConfig::from_lookup(lookup).expect_err("blank url");
        assert!(matches!(err, ConfigError::Missing("DB_URL")));
    }

    #[test]
    fn docstore_url_is_normalized() {
        let lookup = fake_env(&[
            ("DB_URL", "https://data.example.com/app/v1/"),
            ("DB_API_KEY", "key"),
        ]);
        let config = DocStoreConfig::from_lookup(lookup).expect("config");
        assert_eq!(config.url, "https://data.example.com/app/v1");
    }
}
