// bcli-config/src/lib.rs

use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config file not found at: {0}")]
    NotFound(PathBuf),
}

/// Top-level configuration for the bitcoin-cli driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chain parameters: which CLI binary to run, and how.
    pub chain: ChainParams,
    /// Error-tolerance and retry tuning for the dispatch loop.
    pub driver: DriverConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics export configuration.
    pub metrics: MetricsConfig,
}

/// Immutable description of the external CLI this driver invokes.
/// Holds no mutable state; one instance is shared for the process
/// lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainParams {
    /// Path to (or bare name of) the `bitcoin-cli` binary.
    pub cli_binary: PathBuf,
    /// Which network to pass as a base argument, e.g. `-regtest`.
    /// `None` means mainnet, which needs no extra flag.
    pub network: Option<Network>,
    /// Optional `-datadir=...` to pass on every invocation.
    pub datadir: Option<PathBuf>,
}

impl ChainParams {
    /// Build the network argument string bitcoin-cli expects, if any.
    pub fn network_arg(&self) -> Option<String> {
        match self.network? {
            Network::Bitcoin => None,
            Network::Testnet => Some("-testnet".to_string()),
            Network::Signet => Some("-signet".to_string()),
            Network::Regtest => Some("-regtest".to_string()),
            _ => None,
        }
    }

    /// Build the `-datadir=...` argument string, if any.
    pub fn datadir_arg(&self) -> Option<String> {
        self.datadir
            .as_ref()
            .map(|d| format!("-datadir={}", d.display()))
    }
}

/// Tuning knobs for the dispatch loop's error-tolerance and retry
/// behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// How long a streak of non-zero exits (without capture requested)
    /// may persist before the driver treats it as fatal.
    pub error_window_secs: u64,
    /// Delay between retries of a transiently-failing request, and
    /// between warm-up probe attempts.
    pub retry_interval_ms: u64,
    /// Initial capacity of the child output buffer (it doubles from
    /// there as needed).
    pub initial_output_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            error_window_secs: 60,
            retry_interval_ms: 1_000,
            initial_output_capacity: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Log file path (optional)
    pub file: Option<PathBuf>,
}

/// Metrics export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to install a Prometheus exporter.
    pub prometheus: bool,
    /// Address the Prometheus exporter listens on, if enabled.
    pub listen_addr: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            prometheus: false,
            listen_addr: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file at `path`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save this configuration as a pretty-printed TOML file at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Returns the default config file path: `{config_dir()}/bcli/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound(PathBuf::from("$XDG_CONFIG_HOME")))?
            .join("bcli");
        Ok(config_dir.join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainParams {
                cli_binary: PathBuf::from("bitcoin-cli"),
                network: Some(Network::Regtest),
                datadir: None,
            },
            driver: DriverConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: None,
            },
            metrics: MetricsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn from_file_round_trips_chain_params() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
            [chain]
            cli_binary = "/usr/local/bin/bitcoin-cli"
            network = "regtest"

            [driver]
            error_window_secs = 30
            retry_interval_ms = 500
            initial_output_capacity = 64

            [logging]
            level = "debug"

            [metrics]
            prometheus = true
            listen_addr = "127.0.0.1:9000"
        "#;
        fs::write(&temp_file, toml_content).unwrap();

        let loaded = Config::from_file(&temp_file).unwrap();
        assert_eq!(
            loaded.chain.cli_binary,
            PathBuf::from("/usr/local/bin/bitcoin-cli")
        );
        assert_eq!(loaded.chain.network, Some(Network::Regtest));
        assert_eq!(loaded.driver.error_window_secs, 30);
        assert_eq!(loaded.logging.level, "debug");
        assert!(loaded.metrics.prometheus);
    }

    #[test]
    fn from_file_missing_is_file_read_error() {
        let result = Config::from_file("this/path/does/not/exist.toml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }

    #[test]
    fn from_file_invalid_toml_is_parse_error() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(&temp_file, "not valid toml {{{").unwrap();
        let result = Config::from_file(&temp_file);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn save_then_load_round_trips() {
        let config = Config::default();
        let temp_file = NamedTempFile::new().unwrap();
        config.save(&temp_file).unwrap();

        let reloaded = Config::from_file(&temp_file).unwrap();
        assert_eq!(reloaded.chain.cli_binary, config.chain.cli_binary);
        assert_eq!(reloaded.driver.error_window_secs, config.driver.error_window_secs);
    }

    #[test]
    fn network_arg_maps_known_networks() {
        let mut params = ChainParams {
            cli_binary: PathBuf::from("bitcoin-cli"),
            network: Some(Network::Bitcoin),
            datadir: None,
        };
        assert_eq!(params.network_arg(), None);

        params.network = Some(Network::Regtest);
        assert_eq!(params.network_arg(), Some("-regtest".to_string()));

        params.network = None;
        assert_eq!(params.network_arg(), None);
    }

    #[test]
    fn datadir_arg_formats_flag() {
        let params = ChainParams {
            cli_binary: PathBuf::from("bitcoin-cli"),
            network: None,
            datadir: Some(PathBuf::from("/var/lib/bitcoind")),
        };
        assert_eq!(
            params.datadir_arg(),
            Some("-datadir=/var/lib/bitcoind".to_string())
        );
    }

    #[test]
    fn default_config_is_regtest_with_60s_window() {
        let config = Config::default();
        assert_eq!(config.chain.network, Some(Network::Regtest));
        assert_eq!(config.driver.error_window_secs, 60);
        assert_eq!(config.driver.initial_output_capacity, 100);
    }
}
