/// Configuration management for topology discovery and server selection
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cluster::ClusterState;
use crate::core::{ReadMode, SelectionCriteria, ServerAddress, TagSet};
use crate::selection::ServerSelector;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cluster seed configuration
    pub cluster: ClusterConfig,
    /// Default selection criteria
    pub selection: SelectionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Cluster seed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Initial server addresses handed to monitoring
    pub seeds: Vec<String>,
    /// Expected replica set name; members of any other set are rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_set: Option<String>,
}

/// Default selection criteria for operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Read mode (primary, primaryPreferred, secondary, secondaryPreferred, nearest)
    pub read_mode: ReadMode,
    /// Maximum replication lag in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_staleness_sec: Option<u64>,
    /// How long an operation waits for a suitable server
    pub server_selection_timeout_ms: u64,
    /// Tag sets tried in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_sets: Vec<TagSet>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (text, compact)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig {
                seeds: vec!["127.0.0.1:27017".to_string()],
                replica_set: None,
            },
            selection: SelectionConfig {
                read_mode: ReadMode::Primary,
                tag_sets: Vec::new(),
                max_staleness_sec: None,
                server_selection_timeout_ms: 30_000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl SelectionConfig {
    pub fn criteria(&self) -> SelectionCriteria {
        SelectionCriteria {
            mode: self.read_mode,
            tag_sets: self.tag_sets.clone(),
            max_staleness: self.max_staleness_sec.map(Duration::from_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.seeds.is_empty() {
            return Err(ConfigError::ValidationError(
                "seeds cannot be empty".to_string(),
            ));
        }

        for seed in &self.cluster.seeds {
            ServerAddress::parse(seed)
                .map_err(|e| ConfigError::ValidationError(format!("Invalid seed: {}", e)))?;
        }

        if let Some(replica_set) = &self.cluster.replica_set {
            if replica_set.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "replica_set cannot be empty".to_string(),
                ));
            }
        }

        if self.selection.server_selection_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "server_selection_timeout_ms must be greater than 0".to_string(),
            ));
        }

        self.selection
            .criteria()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "text" | "compact" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    /// Parsed seed addresses
    pub fn seed_addresses(&self) -> Result<Vec<ServerAddress>, ConfigError> {
        self.cluster
            .seeds
            .iter()
            .map(|seed| {
                ServerAddress::parse(seed)
                    .map_err(|e| ConfigError::ValidationError(format!("Invalid seed: {}", e)))
            })
            .collect()
    }

    /// Empty cluster state honoring the configured replica set name
    pub fn cluster_state(&self) -> ClusterState {
        match &self.cluster.replica_set {
            Some(set_name) => ClusterState::with_replica_set_name(set_name.clone()),
            None => ClusterState::new(),
        }
    }

    /// Selector with the configured default criteria and timeout
    pub fn server_selector(&self) -> Result<ServerSelector, ConfigError> {
        ServerSelector::new(self.selection.criteria(), self.selection.timeout())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P, mode: &str) -> Result<(), ConfigError> {
        let config = match mode {
            "standalone" => Config::default(),
            "replica_set" => Config {
                cluster: ClusterConfig {
                    seeds: vec![
                        "10.0.1.10:27017".to_string(),
                        "10.0.1.11:27017".to_string(),
                        "10.0.1.12:27017".to_string(),
                    ],
                    replica_set: Some("rs0".to_string()),
                },
                selection: SelectionConfig {
                    read_mode: ReadMode::SecondaryPreferred,
                    tag_sets: vec![
                        TagSet::from([("dc".to_string(), "east".to_string())]),
                        TagSet::new(),
                    ],
                    max_staleness_sec: Some(120),
                    server_selection_timeout_ms: 30_000,
                },
                ..Default::default()
            },
            "sharded" => Config {
                cluster: ClusterConfig {
                    seeds: vec![
                        "10.0.2.10:27017".to_string(),
                        "10.0.2.11:27017".to_string(),
                    ],
                    replica_set: None,
                },
                ..Default::default()
            },
            _ => {
                return Err(ConfigError::ValidationError(
                    "Mode must be 'standalone', 'replica_set' or 'sharded'".to_string(),
                ))
            }
        };

        config.save_to_file(path)
    }
}

/// Configuration error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.selection.criteria(), SelectionCriteria::primary());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.cluster.seeds.clear();
        assert!(config.validate().is_err());

        config.cluster.seeds = vec!["db:notaport".to_string()];
        assert!(config.validate().is_err());

        config.cluster.seeds = vec!["db:27017".to_string()];
        assert!(config.validate().is_ok());

        config.selection.server_selection_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_invalid_criteria() {
        let mut config = Config::default();
        config.selection.max_staleness_sec = Some(120);
        // primary mode cannot carry a staleness bound
        assert!(config.validate().is_err());

        config.selection.read_mode = ReadMode::Secondary;
        assert!(config.validate().is_ok());

        config.selection.max_staleness_sec = Some(10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_bad_logging() {
        let mut config = Config::default();
        config.logging.format = "json".to_string();
        assert!(config.validate().is_err());

        config.logging.format = "compact".to_string();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed_config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed_config, config);
    }

    #[test]
    fn test_config_file_operations() {
        let config = Config::default();
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();
        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config, config);
    }

    #[test]
    fn test_example_configs_are_valid() {
        for mode in ["standalone", "replica_set", "sharded"] {
            let temp_file = NamedTempFile::new().unwrap();
            Config::create_example_config(temp_file.path(), mode).unwrap();
            let loaded = Config::load_from_file(temp_file.path()).unwrap();
            assert!(loaded.server_selector().is_ok(), "mode {mode}");
        }

        let temp_file = NamedTempFile::new().unwrap();
        assert!(Config::create_example_config(temp_file.path(), "redis").is_err());
    }

    #[test]
    fn test_replica_set_example_pins_state() {
        let temp_file = NamedTempFile::new().unwrap();
        Config::create_example_config(temp_file.path(), "replica_set").unwrap();
        let config = Config::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.seed_addresses().unwrap().len(), 3);
        assert_eq!(config.cluster_state().topology().set_name(), Some("rs0"));
        assert_eq!(
            config.selection.criteria().max_staleness,
            Some(Duration::from_secs(120))
        );
    }
}
