//! Key material types and per-key derived security material.
//!
//! Keys are provisioning-time constants. Everything a key can derive
//! (NID, encryption/privacy keys, network ID, beacon key, identity key, AID)
//! is computed
//! once in a `derive` constructor and carried alongside the key, so the
//! derivation functions never need a memo table.

use crate::error::CryptoError;
use crate::kdf;
use std::fmt;
use tracing::debug;

/// An opaque 16-byte symmetric secret
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub [u8; 16]);

impl Key {
    /// Parse a key from a 32-character hex string
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(s).map_err(|_| CryptoError::InvalidKeyLength(s.len() / 2))?;
        Self::from_slice(&raw)
    }

    /// Build a key from a byte slice, which must be exactly 16 bytes
    pub fn from_slice(raw: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 16] = raw
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(raw.len()))?;
        Ok(Self(bytes))
    }

    /// Borrow the raw key bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// Secrets never reach logs in the clear.
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(****)")
    }
}

/// Network-wide symmetric secret (NetKey)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkKey(pub Key);

/// Application-scoped symmetric secret (AppKey)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationKey(pub Key);

/// Per-device symmetric secret (DevKey)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceKey(pub Key);

/// Security material derived from a [`NetworkKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkKeys {
    /// The network key itself
    pub key: NetworkKey,
    /// 7-bit network key identifier (k2)
    pub nid: u8,
    /// Network-layer encryption key (k2)
    pub encryption_key: Key,
    /// Network-layer privacy key (k2)
    pub privacy_key: Key,
    /// 8-byte public network identifier (k3)
    pub network_id: [u8; 8],
    /// Secure network beacon authentication key (k1)
    pub beacon_key: Key,
    /// Node identity advertising key (k1)
    pub identity_key: Key,
}

impl NetworkKeys {
    /// Derive all network security material from a network key.
    ///
    /// Master security credentials only (Mesh Profile 3.8.6.3.1); friendship
    /// credentials take a different k2 `P` argument and are out of scope.
    pub fn derive(key: &NetworkKey) -> Self {
        let n = key.0.as_bytes();
        let (nid, encryption_key, privacy_key) = kdf::k2(&key.0, &[0x00]);
        let beacon_key = Key(kdf::k1(n, &kdf::s1(b"nkbk"), b"id128\x01"));
        let identity_key = Key(kdf::k1(n, &kdf::s1(b"nkik"), b"id128\x01"));
        let network_id = kdf::k3(&key.0);
        debug!(
            nid = format_args!("{:#04x}", nid),
            network_id = %hex::encode(network_id),
            "derived network security material"
        );
        Self {
            key: *key,
            nid,
            encryption_key,
            privacy_key,
            network_id,
            beacon_key,
            identity_key,
        }
    }
}

/// Security material derived from an [`ApplicationKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationKeys {
    /// The application key itself
    pub key: ApplicationKey,
    /// 6-bit application key identifier (k4)
    pub aid: u8,
}

impl ApplicationKeys {
    /// Derive the AID from an application key
    pub fn derive(key: &ApplicationKey) -> Self {
        let aid = kdf::k4(&key.0);
        debug!(aid = format_args!("{:#04x}", aid), "derived application security material");
        Self { key: *key, aid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mesh Profile v1.0 sample data, 8.1.2 / 8.1.5 (master credentials)
    const NETKEY: &str = "f7a2a44f8e8a8029064f173ddc1e2b00";
    // 8.1.6 sample AppKey
    const APPKEY: &str = "3216d1509884b533248541792b877f98";

    #[test]
    fn network_keys_sample_data() {
        let netkey = NetworkKey(Key::from_hex(NETKEY).unwrap());
        let keys = NetworkKeys::derive(&netkey);

        assert_eq!(keys.nid, 0x7f);
        assert_eq!(
            keys.encryption_key.0,
            Key::from_hex("9f589181a0f50de73c8070c7a6d27f46").unwrap().0
        );
        assert_eq!(
            keys.privacy_key.0,
            Key::from_hex("4c715bd4a64b938f99b453351653124f").unwrap().0
        );
        assert_eq!(keys.network_id, hex::decode("ff046958233db014").unwrap()[..]);
    }

    #[test]
    fn identity_key_sample_data() {
        // Mesh Profile v1.0 sample data, 8.2.4 (node identity advertising)
        let netkey = NetworkKey(Key::from_hex("7dd7364cd842ad18c17c2b820c84c3d6").unwrap());
        let keys = NetworkKeys::derive(&netkey);
        assert_eq!(
            keys.identity_key.0,
            Key::from_hex("84396c435ac48560b5965385253e210c").unwrap().0
        );
        assert_ne!(keys.identity_key, keys.beacon_key);
    }

    #[test]
    fn application_keys_sample_data() {
        let appkey = ApplicationKey(Key::from_hex(APPKEY).unwrap());
        let keys = ApplicationKeys::derive(&appkey);
        assert_eq!(keys.aid, 0x38);
    }

    #[test]
    fn key_from_hex_rejects_bad_lengths() {
        assert!(Key::from_hex("00ff").is_err());
        assert!(Key::from_slice(&[0u8; 15]).is_err());
        assert!(Key::from_slice(&[0u8; 16]).is_ok());
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = Key::from_hex(NETKEY).unwrap();
        assert_eq!(format!("{:?}", key), "Key(****)");
    }
}
