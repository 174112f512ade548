//! Configuration file for the kadseek CLI.

use kadseek_search::{GuardConfig, Prefs, SearchConfig, ServiceConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// kadseek configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,
    /// Search configuration
    #[serde(default)]
    pub search: SearchSection,
    /// Request guard configuration
    #[serde(default)]
    pub guard: GuardSection,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Local UDP port for KAD traffic
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    /// TCP port advertised to peers
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    /// Contact file used to seed searches
    #[serde(default = "default_nodes_file")]
    pub nodes_file: PathBuf,
    /// Public address when it differs from the outbound interface (NAT)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extern_ip: Option<Ipv4Addr>,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// Lifetime of a search session in seconds
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,
    /// Seconds to wait for the next batch of results
    #[serde(default = "default_result_wait_secs")]
    pub result_wait_secs: u64,
    /// Peers contacted per search
    #[serde(default = "default_max_contacts")]
    pub max_contacts: usize,
    /// Files kept per search
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

/// Request guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSection {
    /// Minimum milliseconds between two requests of one kind to one peer
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_udp_port() -> u16 {
    kadseek_proto::DEFAULT_UDP_PORT
}

fn default_tcp_port() -> u16 {
    kadseek_proto::DEFAULT_TCP_PORT
}

fn default_nodes_file() -> PathBuf {
    config_dir().join("nodes.dat")
}

fn default_expiry_secs() -> u64 {
    10
}

fn default_result_wait_secs() -> u64 {
    10
}

fn default_max_contacts() -> usize {
    SearchConfig::default().max_contacts
}

fn default_max_files() -> usize {
    SearchConfig::default().max_files
}

fn default_min_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("kadseek")
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            udp_port: default_udp_port(),
            tcp_port: default_tcp_port(),
            nodes_file: default_nodes_file(),
            extern_ip: None,
        }
    }
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            expiry_secs: default_expiry_secs(),
            result_wait_secs: default_result_wait_secs(),
            max_contacts: default_max_contacts(),
            max_files: default_max_files(),
        }
    }
}

impl Default for GuardSection {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load config from the default path, or defaults if there is none
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Idle wait between result batches
    #[must_use]
    pub fn result_wait(&self) -> Duration {
        Duration::from_secs(self.search.result_wait_secs)
    }

    /// Service settings derived from this file
    #[must_use]
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            udp_port: self.network.udp_port,
            search: SearchConfig {
                expiry: Duration::from_secs(self.search.expiry_secs),
                max_contacts: self.search.max_contacts,
                max_files: self.search.max_files,
                ..SearchConfig::default()
            },
            guard: GuardConfig {
                min_interval: Duration::from_millis(self.guard.min_interval_ms),
            },
            ..ServiceConfig::default()
        }
    }

    /// Local identity using the configured ports and public address
    #[must_use]
    pub fn prefs(&self, local_ip: Ipv4Addr) -> Prefs {
        let mut prefs = Prefs::new(local_ip);
        prefs.udp_port = self.network.udp_port;
        prefs.tcp_port = self.network.tcp_port;
        prefs.extern_ip = self.network.extern_ip;
        prefs
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.network.udp_port == 0 || self.network.tcp_port == 0 {
            anyhow::bail!("UDP and TCP ports must be non-zero");
        }

        if self.search.expiry_secs == 0 || self.search.result_wait_secs == 0 {
            anyhow::bail!("Search expiry and result wait must be at least 1 second");
        }

        if self.search.max_contacts == 0 || self.search.max_files == 0 {
            anyhow::bail!("Search contact and file limits must be non-zero");
        }

        if self.guard.min_interval_ms == 0 {
            anyhow::bail!("Guard interval must be at least 1 ms");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.udp_port, 1979);
        assert_eq!(config.network.tcp_port, 1988);
        assert_eq!(config.search.expiry_secs, 10);
        assert_eq!(config.result_wait(), Duration::from_secs(10));
        assert!(config.network.nodes_file.ends_with("kadseek/nodes.dat"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.network.udp_port = 0;
        assert!(config.validate().is_err());

        config.network.udp_port = 4672;
        config.search.result_wait_secs = 0;
        assert!(config.validate().is_err());

        config.search.result_wait_secs = 5;
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[network]\nudp_port = 4672\n\n[guard]\nmin_interval_ms = 250\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.network.udp_port, 4672);
        assert_eq!(config.network.tcp_port, 1988);
        assert_eq!(config.search.max_files, SearchConfig::default().max_files);

        let service = config.service_config();
        assert_eq!(service.udp_port, 4672);
        assert_eq!(service.guard.min_interval, Duration::from_millis(250));
        assert_eq!(service.search.expiry, Duration::from_secs(10));
    }

    #[test]
    fn test_prefs_from_config() {
        let local = Ipv4Addr::new(192, 168, 1, 20);
        let config: Config = toml::from_str(
            "[network]\ntcp_port = 4662\nextern_ip = \"203.0.113.9\"\n",
        )
        .unwrap();

        let prefs = config.prefs(local);
        assert_eq!(prefs.tcp_port, 4662);
        assert_eq!(prefs.udp_port, 1979);
        assert_eq!(prefs.local_ip, local);
        assert_eq!(prefs.public_ip(), Ipv4Addr::new(203, 0, 113, 9));

        assert_eq!(Config::default().prefs(local).public_ip(), local);
    }

    #[test]
    fn test_toml_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.network.udp_port, deserialized.network.udp_port);
        assert_eq!(config.guard.min_interval_ms, deserialized.guard.min_interval_ms);
    }
}
