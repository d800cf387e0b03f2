use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProviderConfig,
    pub humanizer: HumanizerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// "mock" for the built-in deterministic providers, "live" for Ollama + Sapling
    pub mode: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub sapling_url: String,
    pub sapling_api_key: String,
    /// Bounded retries around each provider call (network flakiness,
    /// separate from the engine's own iteration budget)
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HumanizerConfig {
    /// Detector score the loop tries to get under (percent, lower = more human)
    pub target_score: f64,
    /// Hard cap on rewrite attempts per run
    pub max_iterations: u32,
    /// Minimum acceptable similarity between input and any accepted rewrite
    pub similarity_floor: f64,
    /// Overall wall-clock budget for one run
    pub deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::TimekillError::Config(e.to_string()))?;

        toml::from_str(&content)
            .map_err(|e| crate::error::TimekillError::Config(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "0.0.0.0:8787".to_string(),
            },
            providers: ProviderConfig {
                mode: "mock".to_string(),
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "mistral:latest".to_string(),
                sapling_url: "https://api.sapling.ai".to_string(),
                sapling_api_key: String::new(),
                retry_max_attempts: 3,
                retry_base_delay_ms: 250,
                call_timeout_secs: 30,
            },
            humanizer: HumanizerConfig {
                target_score: 20.0,
                max_iterations: 5,
                similarity_floor: 0.6,
                deadline_secs: 180,
            },
            storage: StorageConfig {
                database_url: "sqlite://timekill.db".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.humanizer.max_iterations, 5);
        assert_eq!(config.providers.mode, "mock");
        assert!(config.humanizer.similarity_floor > 0.0);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server.listen_addr, config.server.listen_addr);
        assert_eq!(parsed.humanizer.target_score, config.humanizer.target_score);
    }
}
