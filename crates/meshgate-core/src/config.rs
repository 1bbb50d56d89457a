//! Configuration system for meshgate.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MESHGATE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/meshgate/config.toml
//!   3. ~/.config/meshgate/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::topic::{TopicRouter, TopicSegments, DEFAULT_BASE_PREFIX};

/// Denylist slots honoured; extra entries are ignored.
pub const DENYLIST_CAPACITY: usize = 16;

/// Client id used when the node name yields nothing usable.
pub const FALLBACK_CLIENT_ID: &str = "meshcore_gateway";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub repeater: RepeaterConfig,
    pub bus: BusConfig,
    pub radio: RadioConfig,
    pub access: AccessConfig,
    pub discovery: DiscoveryConfig,
    pub location: LocationConfig,
    pub relay: RelayConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeaterConfig {
    pub node_name: String,
    /// 0 = generate on first start.
    pub node_id: u32,
    /// 0 disables repeating.
    pub max_hops: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub enabled: bool,
    /// Empty = derive from the node name.
    pub client_id: String,
    pub base_prefix: String,
    pub country: String,
    pub region: String,
    /// Legacy combined `base/country/region`; used only while the segments are unset.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub topic_prefix: String,
    pub publish_raw: bool,
    pub publish_decoded: bool,
    pub subscribe_commands: bool,
    pub bridge_all: bool,
    pub stats_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// IPv4 multicast group standing in for the shared channel.
    pub multicast_group: String,
    pub port: u16,
    /// Signal quality reported for every received frame.
    pub rssi: i32,
    pub snr: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub deny_enabled: bool,
    /// Node ids as hex strings, e.g. "0000002A".
    pub denylist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub advert_enabled: bool,
    pub advert_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub dedup_window_ms: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for RepeaterConfig {
    fn default() -> Self {
        Self {
            node_name: "MQTT-Gateway".to_string(),
            node_id: 0,
            max_hops: 3,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: String::new(),
            base_prefix: DEFAULT_BASE_PREFIX.to_string(),
            country: String::new(),
            region: String::new(),
            topic_prefix: String::new(),
            publish_raw: true,
            publish_decoded: true,
            subscribe_commands: true,
            bridge_all: true,
            stats_interval_secs: 60,
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            multicast_group: "239.255.77.77".to_string(),
            port: 9477,
            rssi: -70,
            snr: 9.5,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            advert_enabled: false,
            advert_interval_secs: 300,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 2000,
            jitter_min_ms: 100,
            jitter_max_ms: 300,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 9011 }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("meshgate")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl GatewayConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            GatewayConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse TOML and fold a legacy combined prefix into its segments.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        let mut config: GatewayConfig = toml::from_str(text)?;
        config.migrate_legacy_prefix();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MESHGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            GatewayConfig::default().save_to(&path)?;
        }
        Ok(path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Only applies while the segments are still untouched defaults.
    fn migrate_legacy_prefix(&mut self) {
        let bus = &self.bus;
        let segments_unset = (bus.base_prefix.is_empty() || bus.base_prefix == DEFAULT_BASE_PREFIX)
            && bus.country.is_empty()
            && bus.region.is_empty();
        if segments_unset && !bus.topic_prefix.is_empty() {
            let legacy = TopicSegments::from_legacy_prefix(&self.bus.topic_prefix);
            self.bus.base_prefix = legacy.base;
            self.bus.country = legacy.country;
            self.bus.region = legacy.region;
            self.bus.topic_prefix.clear();
        }
    }

    /// Give the node a random non-zero id if it has none.
    ///
    /// Returns true when an id was generated and the config should be saved.
    pub fn ensure_node_id(&mut self) -> bool {
        if self.repeater.node_id != 0 {
            return false;
        }
        let mut id = 0;
        while id == 0 {
            id = rand::random::<u32>();
        }
        self.repeater.node_id = id;
        true
    }

    /// Identity this gateway puts in the `gateway` field and topic paths.
    pub fn gateway_id(&self) -> String {
        if self.bus.client_id.is_empty() {
            client_id_from_node_name(&self.repeater.node_name)
        } else {
            self.bus.client_id.clone()
        }
    }

    pub fn topic_segments(&self) -> TopicSegments {
        TopicSegments::new(
            self.bus.base_prefix.as_str(),
            self.bus.country.as_str(),
            self.bus.region.as_str(),
        )
    }

    pub fn topic_router(&self) -> TopicRouter {
        TopicRouter::new(self.topic_segments())
    }

    /// Parsed denylist, invalid entries skipped, capped at capacity.
    pub fn denied_node_ids(&self) -> Vec<u32> {
        self.access
            .denylist
            .iter()
            .filter_map(|s| {
                let s = s.trim();
                let s = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                match u32::from_str_radix(s, 16) {
                    Ok(id) => Some(id),
                    Err(_) => {
                        tracing::warn!(entry = %s, "ignoring invalid denylist entry");
                        None
                    }
                }
            })
            .take(DENYLIST_CAPACITY)
            .collect()
    }

    /// Apply MESHGATE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MESHGATE_REPEATER__NODE_NAME") {
            self.repeater.node_name = v;
        }
        if let Ok(v) = std::env::var("MESHGATE_REPEATER__MAX_HOPS") {
            if let Ok(n) = v.parse() {
                self.repeater.max_hops = n;
            }
        }
        if let Ok(v) = std::env::var("MESHGATE_BUS__ENABLED") {
            self.bus.enabled = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("MESHGATE_BUS__BASE_PREFIX") {
            self.bus.base_prefix = v;
        }
        if let Ok(v) = std::env::var("MESHGATE_BUS__COUNTRY") {
            self.bus.country = v;
        }
        if let Ok(v) = std::env::var("MESHGATE_BUS__REGION") {
            self.bus.region = v;
        }
        if let Ok(v) = std::env::var("MESHGATE_BUS__BRIDGE_ALL") {
            self.bus.bridge_all = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("MESHGATE_ACCESS__DENY_ENABLED") {
            self.access.deny_enabled = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("MESHGATE_API__PORT") {
            if let Ok(p) = v.parse() {
                self.api.port = p;
            }
        }
    }
}

/// Keep `[A-Za-z0-9_-]`, turn spaces into `_`, drop the rest.
pub fn client_id_from_node_name(node_name: &str) -> String {
    let id: String = node_name
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
            _ => None,
        })
        .collect();
    if id.is_empty() {
        FALLBACK_CLIENT_ID.to_string()
    } else {
        id
    }
}
