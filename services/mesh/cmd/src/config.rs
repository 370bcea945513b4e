//! Configuration handling for the gateway.
//!
//! Configuration comes from a TOML file, overridden by `BTMESH_*`
//! environment variables. The built-in defaults use the Mesh Profile sample
//! keys so a development gateway runs against test fixtures out of the box;
//! production deployments must provide provisioned key material.

use anyhow::{Context, Result};
use mesh_crypto::{ApplicationKey, Key, NetworkKey};
use mesh_storage::{NodeKeys, UnicastAddr};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Gateway configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// This node's unicast address
    pub unicast_addr: u16,
    /// Negotiated ATT MTU of the proxy link
    pub att_mtu: usize,
    /// Network key (32 hex chars)
    pub network_key: String,
    /// Application key (32 hex chars)
    pub application_key: String,
    /// IV Index to seed a fresh datastore with
    pub iv_index: u32,
    /// Path of the persisted state snapshot; in-memory store when absent
    pub state_file: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            unicast_addr: 0x0001,
            att_mtu: 23,
            // Mesh Profile v1.0 sample keys (8.2.2 / 8.3.22); dev only
            network_key: "7dd7364cd842ad18c17c2b820c84c3d6".to_string(),
            application_key: "63964771734fbd768e3e40bf7d27a193".to_string(),
            iv_index: 0,
            state_file: None,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file plus environment overrides
    pub fn load<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => {
                let path = path.as_ref();
                match std::fs::read_to_string(path) {
                    Ok(content) => {
                        let config = toml::from_str(&content)
                            .with_context(|| format!("parsing {}", path.display()))?;
                        info!(path = %path.display(), "loaded configuration");
                        config
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        warn!(path = %path.display(), "config file not found, using defaults");
                        Self::default()
                    }
                    Err(err) => {
                        return Err(err).with_context(|| format!("reading {}", path.display()))
                    }
                }
            }
            None => Self::default(),
        };

        config.apply_environment_overrides();
        info!(
            unicast_addr = format_args!("{:#06x}", config.unicast_addr),
            att_mtu = config.att_mtu,
            iv_index = config.iv_index,
            state_file = ?config.state_file,
            "gateway configuration"
        );
        Ok(config)
    }

    fn apply_environment_overrides(&mut self) {
        if let Some(addr) = env_override("BTMESH_UNICAST_ADDR", parse_u16) {
            self.unicast_addr = addr;
        }
        if let Some(mtu) = env_override("BTMESH_ATT_MTU", parse_u32) {
            self.att_mtu = mtu as usize;
        }
        if let Ok(key) = std::env::var("BTMESH_NETWORK_KEY") {
            self.network_key = key;
        }
        if let Ok(key) = std::env::var("BTMESH_APPLICATION_KEY") {
            self.application_key = key;
        }
        if let Some(iv) = env_override("BTMESH_IV_INDEX", parse_u32) {
            self.iv_index = iv;
        }
        if let Ok(path) = std::env::var("BTMESH_STATE_FILE") {
            self.state_file = Some(PathBuf::from(path));
        }
    }

    /// Parse the configured key material into provisioning constants
    pub fn node_keys(&self) -> Result<NodeKeys> {
        let network = NetworkKey(
            Key::from_hex(&self.network_key).context("network_key is not 16 bytes of hex")?,
        );
        let application = ApplicationKey(
            Key::from_hex(&self.application_key)
                .context("application_key is not 16 bytes of hex")?,
        );
        Ok(NodeKeys::new(
            UnicastAddr(self.unicast_addr),
            &network,
            &application,
        ))
    }
}

fn env_override<T>(name: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match parse(&raw) {
        Some(value) => Some(value),
        None => {
            warn!(name, raw, "ignoring out-of-range or unparseable environment override");
            None
        }
    }
}

fn parse_u16(raw: &str) -> Option<u16> {
    match raw.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn parse_u32(raw: &str) -> Option<u32> {
    match raw.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_parse_into_node_keys() {
        let config = GatewayConfig::default();
        let keys = config.node_keys().unwrap();
        assert_eq!(keys.unicast, UnicastAddr(0x0001));
        // 8.2.2 sample data NetworkID
        assert_eq!(
            keys.network.network_id,
            [0x3e, 0xca, 0xff, 0x67, 0x2f, 0x67, 0x33, 0x70]
        );
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "unicast_addr = 66\natt_mtu = 69\niv_index = 7\n\
             network_key = \"f7a2a44f8e8a8029064f173ddc1e2b00\""
        )
        .unwrap();

        let config = GatewayConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.unicast_addr, 66);
        assert_eq!(config.att_mtu, 69);
        assert_eq!(config.iv_index, 7);
        // untouched field keeps its default
        assert_eq!(
            config.application_key,
            GatewayConfig::default().application_key
        );
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = GatewayConfig::load(Some("/nonexistent/btmesh.toml")).unwrap();
        assert_eq!(config.att_mtu, GatewayConfig::default().att_mtu);
    }

    #[test]
    fn unicast_override_rejects_values_above_u16() {
        assert_eq!(parse_u16("0x00ff"), Some(0x00ff));
        assert_eq!(parse_u16("255"), Some(255));
        assert_eq!(parse_u16("0xffff"), Some(0xffff));
        assert_eq!(parse_u16("0x10000"), None);
        assert_eq!(parse_u16("70000"), None);
        assert_eq!(parse_u16("garbage"), None);
    }

    #[test]
    fn bad_key_material_is_an_error() {
        let config = GatewayConfig {
            network_key: "not-hex".to_string(),
            ..GatewayConfig::default()
        };
        assert!(config.node_keys().is_err());
    }
}
