//! Configuration loading for deckrocket.
//!
//! Configuration is an optional TOML file (`--config`). Every section and
//! field may be omitted.

use deckrocket_client::{LanMeshConfig, LinkConfig, DEFAULT_DISCOVERY_PORT, DEFAULT_SERVICE};
use deckrocket_core::{PeerPolicy, DEFAULT_INVITE_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for deckrocket.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PresenterConfig {
    /// Mesh discovery and session configuration.
    #[serde(default)]
    pub mesh: MeshConfig,
    /// Companion link configuration.
    #[serde(default)]
    pub companion: CompanionConfig,
    /// Deck cache configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Mesh configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MeshConfig {
    /// Service name advertised and browsed for (default: deckrocket).
    #[serde(default = "default_service")]
    pub service: String,
    /// Name shown to other peers (default: deckrocket).
    #[serde(default = "default_service")]
    pub display_name: String,
    /// UDP port we listen for beacons on (default: 48611).
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// UDP port we send beacons to (default: 48611).
    #[serde(default = "default_discovery_port")]
    pub beacon_port: u16,
    /// Beacon destination (default: 255.255.255.255).
    #[serde(default = "default_beacon_address")]
    pub beacon_address: IpAddr,
    /// TCP address for sessions (default: 0.0.0.0:0).
    #[serde(default = "default_mesh_listen")]
    pub listen_address: SocketAddr,
    /// Beacon interval in milliseconds (default: 2000).
    #[serde(default = "default_beacon_interval_ms")]
    pub beacon_interval_ms: u64,
    /// Silence after which a peer is lost, in milliseconds (default: 8000).
    #[serde(default = "default_peer_ttl_ms")]
    pub peer_ttl_ms: u64,
    /// Invitation timeout in seconds (default: 30).
    #[serde(default = "default_invite_timeout_secs")]
    pub invite_timeout_secs: u64,
    /// Re-invite immediately when a session drops (default: true).
    #[serde(default = "default_true")]
    pub reinvite_on_loss: bool,
}

/// Companion link configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CompanionConfig {
    /// Address the presenter listens on for its companion (default: 0.0.0.0:48612).
    #[serde(default = "default_companion_listen")]
    pub listen_address: SocketAddr,
    /// Request timeout in milliseconds (default: 5000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Redial delay in milliseconds (default: 2000).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

/// Deck cache configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Data directory (default: platform data dir; `--data-dir` wins).
    pub data_dir: Option<PathBuf>,
    /// Cache decks received over the mesh (default: true).
    #[serde(default = "default_true")]
    pub cache_received_decks: bool,
}

// Default value functions
fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

fn default_discovery_port() -> u16 {
    DEFAULT_DISCOVERY_PORT
}

fn default_beacon_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::BROADCAST)
}

fn default_mesh_listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
}

fn default_beacon_interval_ms() -> u64 {
    2_000
}

fn default_peer_ttl_ms() -> u64 {
    8_000
}

fn default_invite_timeout_secs() -> u64 {
    DEFAULT_INVITE_TIMEOUT.as_secs()
}

fn default_companion_listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 48_612)
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_reconnect_delay_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            display_name: default_service(),
            discovery_port: default_discovery_port(),
            beacon_port: default_discovery_port(),
            beacon_address: default_beacon_address(),
            listen_address: default_mesh_listen(),
            beacon_interval_ms: default_beacon_interval_ms(),
            peer_ttl_ms: default_peer_ttl_ms(),
            invite_timeout_secs: default_invite_timeout_secs(),
            reinvite_on_loss: default_true(),
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            listen_address: default_companion_listen(),
            request_timeout_ms: default_request_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cache_received_decks: default_true(),
        }
    }
}

impl MeshConfig {
    /// Transport settings.
    pub fn transport(&self) -> LanMeshConfig {
        LanMeshConfig {
            service: self.service.clone(),
            display_name: self.display_name.clone(),
            discovery_port: self.discovery_port,
            beacon_port: self.beacon_port,
            beacon_address: self.beacon_address,
            listen_address: self.listen_address,
            beacon_interval: Duration::from_millis(self.beacon_interval_ms),
            peer_ttl: Duration::from_millis(self.peer_ttl_ms),
        }
    }

    /// Invitation policy.
    pub fn policy(&self) -> PeerPolicy {
        PeerPolicy {
            invite_timeout: Duration::from_secs(self.invite_timeout_secs),
            reinvite_on_loss: self.reinvite_on_loss,
        }
    }
}

impl CompanionConfig {
    /// Link settings for the presenter (listening side).
    pub fn listen(&self) -> LinkConfig {
        self.with_timeouts(LinkConfig::listen(self.listen_address))
    }

    /// Link settings for a companion dialing `addr`.
    pub fn connect(&self, addr: SocketAddr) -> LinkConfig {
        self.with_timeouts(LinkConfig::connect(addr))
    }

    fn with_timeouts(&self, mut link: LinkConfig) -> LinkConfig {
        link.request_timeout = Duration::from_millis(self.request_timeout_ms);
        link.reconnect_delay = Duration::from_millis(self.reconnect_delay_ms);
        link
    }
}

impl PresenterConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = PresenterConfig::default();
        assert_eq!(config.mesh.service, "deckrocket");
        assert_eq!(config.mesh.discovery_port, 48_611);
        assert_eq!(config.mesh.invite_timeout_secs, 30);
        assert!(config.mesh.reinvite_on_loss);
        assert_eq!(config.companion.listen_address.port(), 48_612);
        assert!(config.store.data_dir.is_none());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[mesh]
display_name = "stage left"
discovery_port = 5000
beacon_port = 5001
beacon_address = "192.168.1.255"
invite_timeout_secs = 10
reinvite_on_loss = false

[companion]
listen_address = "127.0.0.1:7000"
request_timeout_ms = 250

[store]
data_dir = "/var/lib/deckrocket"
"#;

        let config: PresenterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.mesh.display_name, "stage left");
        assert_eq!(config.mesh.discovery_port, 5000);
        assert_eq!(config.mesh.beacon_port, 5001);
        assert_eq!(config.mesh.beacon_address.to_string(), "192.168.1.255");
        assert!(!config.mesh.reinvite_on_loss);
        assert_eq!(config.companion.listen_address.port(), 7000);
        assert_eq!(config.companion.request_timeout_ms, 250);
        assert_eq!(config.store.data_dir, Some(PathBuf::from("/var/lib/deckrocket")));
    }

    #[test]
    fn config_missing_sections_use_defaults() {
        let config: PresenterConfig = toml::from_str("").unwrap();
        assert_eq!(config, PresenterConfig::default());
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let toml = r#"
[mesh]
service = "rehearsal"
"#;
        let config: PresenterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.mesh.service, "rehearsal");
        assert_eq!(config.mesh.beacon_interval_ms, 2_000);
        assert!(config.store.cache_received_decks);
    }

    #[test]
    fn mesh_section_maps_to_transport_and_policy() {
        let mesh = MeshConfig {
            beacon_interval_ms: 500,
            invite_timeout_secs: 12,
            ..MeshConfig::default()
        };

        assert_eq!(mesh.transport().beacon_interval, Duration::from_millis(500));
        assert_eq!(mesh.policy().invite_timeout, Duration::from_secs(12));
        assert!(mesh.policy().reinvite_on_loss);
    }

    #[test]
    fn companion_section_maps_to_link() {
        let companion = CompanionConfig {
            request_timeout_ms: 100,
            ..CompanionConfig::default()
        };
        let addr: SocketAddr = "10.0.0.2:48612".parse().unwrap();

        let link = companion.connect(addr);
        assert_eq!(link.role, deckrocket_client::LinkRole::Connect(addr));
        assert_eq!(link.request_timeout, Duration::from_millis(100));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deckrocket.toml");
        std::fs::write(&path, "[mesh]\ndisplay_name = \"podium\"\n").unwrap();

        let config = PresenterConfig::from_file(&path).unwrap();
        assert_eq!(config.mesh.display_name, "podium");
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = PresenterConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn from_file_reports_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[mesh\n").unwrap();

        let result = PresenterConfig::from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
