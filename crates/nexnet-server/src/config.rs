use std::net::SocketAddr;
use std::path::PathBuf;

use nexnet_crypto::{new_id, new_key, EncryptionKey};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Path-derivation strategy for the underlying store. `Cas` (SHA-1, the
/// reference transform) is the only implemented strategy; the field exists
/// so a future transform can be selected without an incompatible config
/// format change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathTransformKind {
    #[default]
    Cas,
}

/// Per-node configuration, loadable from a TOML file or built
/// programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub listen_addr: SocketAddr,
    #[serde(default)]
    pub bootstrap: Vec<SocketAddr>,
    pub root: PathBuf,
    /// Hex-encoded 32-byte key. Populated by [`NodeConfig::generate_missing`]
    /// when absent from a loaded file.
    #[serde(default)]
    pub encryption_key: Option<String>,
    /// 32-byte random hex string. Populated by
    /// [`NodeConfig::generate_missing`] when absent.
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub path_transform: PathTransformKind,
}

impl NodeConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ServerError> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Serialize this config to TOML text.
    pub fn to_toml(&self) -> Result<String, ServerError> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Fill in a fresh `encryption_key` and `node_id` if either is absent,
    /// matching the "generated if absent" lifetime in the data model.
    pub fn generate_missing(&mut self) {
        if self.encryption_key.is_none() {
            self.encryption_key = Some(hex::encode(new_key().as_bytes()));
        }
        if self.node_id.is_none() {
            self.node_id = Some(new_id());
        }
    }

    /// Decode `encryption_key`, failing if it is absent or malformed.
    pub fn encryption_key(&self) -> Result<EncryptionKey, ServerError> {
        let hex_str = self
            .encryption_key
            .as_deref()
            .ok_or_else(|| ServerError::Config("missing encryption_key".into()))?;
        let bytes = hex::decode(hex_str)
            .map_err(|e| ServerError::Config(format!("encryption_key: {e}")))?;
        EncryptionKey::from_slice(&bytes)
            .ok_or_else(|| ServerError::Config("encryption_key must be 32 bytes".into()))
    }

    /// `node_id`, failing if absent.
    pub fn node_id(&self) -> Result<String, ServerError> {
        self.node_id.clone().ok_or_else(|| ServerError::Config("missing node_id".into()))
    }
}
