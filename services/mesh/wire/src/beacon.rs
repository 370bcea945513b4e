//! Secure network beacon construction and validation.
//!
//! A secure network beacon announces the network's IV Index and the Key
//! Refresh / IV Update flags, authenticated with the beacon key derived from
//! the network key. Beacons are broadcast on a shared radio medium, so a
//! failed validation discards the beacon and nothing else.

use crate::error::WireError;
use bytes::{BufMut, Bytes, BytesMut};
use mesh_crypto::{aes_cmac, NetworkKeys};

/// Wire size of a secure network beacon
pub const BEACON_LEN: usize = 22;

/// Beacon type octet for secure network beacons
pub const BEACON_TYPE_SECURE_NETWORK: u8 = 0x01;

const FLAG_KEY_REFRESH: u8 = 1 << 0;
const FLAG_IV_UPDATE: u8 = 1 << 1;

/// Length of the authenticated region (flags through iv_index)
const AUTH_REGION: std::ops::Range<usize> = 1..14;

/// A decoded secure network beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureNetworkBeacon {
    /// Key Refresh procedure in progress (flags bit 0)
    pub key_refresh: bool,
    /// IV Update procedure in progress (flags bit 1)
    pub iv_update: bool,
    /// Current network IV Index
    pub iv_index: u32,
}

impl SecureNetworkBeacon {
    /// Encode to the 22-byte wire image, authenticated with `keys`.
    pub fn encode(&self, keys: &NetworkKeys) -> Bytes {
        let mut buf = BytesMut::with_capacity(BEACON_LEN);
        buf.put_u8(BEACON_TYPE_SECURE_NETWORK);
        buf.put_u8(self.flags());
        buf.put_slice(&keys.network_id);
        buf.put_u32(self.iv_index);

        let auth = aes_cmac(&keys.beacon_key, &buf[AUTH_REGION]);
        buf.put_slice(&auth[..8]);
        buf.freeze()
    }

    /// Decode and validate a 22-byte beacon PDU.
    ///
    /// The NetworkID must match `keys` and the authentication value must
    /// verify; anything else is a validation error the caller drops.
    pub fn decode(pdu: &[u8], keys: &NetworkKeys) -> Result<Self, WireError> {
        if pdu.len() != BEACON_LEN {
            return Err(WireError::BeaconLength(pdu.len()));
        }
        if pdu[0] != BEACON_TYPE_SECURE_NETWORK {
            return Err(WireError::BeaconType(pdu[0]));
        }

        let flags = pdu[1];
        if pdu[2..10] != keys.network_id {
            return Err(WireError::NetworkIdMismatch);
        }

        let auth = aes_cmac(&keys.beacon_key, &pdu[AUTH_REGION]);
        if pdu[14..22] != auth[..8] {
            return Err(WireError::BeaconAuth);
        }

        Ok(Self {
            key_refresh: flags & FLAG_KEY_REFRESH != 0,
            iv_update: flags & FLAG_IV_UPDATE != 0,
            iv_index: u32::from_be_bytes(pdu[10..14].try_into().unwrap()),
        })
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.key_refresh {
            flags |= FLAG_KEY_REFRESH;
        }
        if self.iv_update {
            flags |= FLAG_IV_UPDATE;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_crypto::{Key, NetworkKey};

    fn keys() -> NetworkKeys {
        NetworkKeys::derive(&NetworkKey(
            Key::from_hex("7dd7364cd842ad18c17c2b820c84c3d6").unwrap(),
        ))
    }

    #[test]
    fn roundtrip_all_flag_combinations() {
        let keys = keys();
        for key_refresh in [false, true] {
            for iv_update in [false, true] {
                for iv_index in [0u32, 1, 0x1234_5678, u32::MAX] {
                    let beacon = SecureNetworkBeacon {
                        key_refresh,
                        iv_update,
                        iv_index,
                    };
                    let pdu = beacon.encode(&keys);
                    assert_eq!(pdu.len(), BEACON_LEN);
                    assert_eq!(SecureNetworkBeacon::decode(&pdu, &keys).unwrap(), beacon);
                }
            }
        }
    }

    // Mesh Profile v1.0 sample data 8.2.2: NetworkID for this key.
    #[test]
    fn network_id_matches_sample_data() {
        let pdu = SecureNetworkBeacon {
            key_refresh: false,
            iv_update: false,
            iv_index: 0x1234_5678,
        }
        .encode(&keys());
        assert_eq!(&pdu[2..10], &hex::decode("3ecaff672f673370").unwrap()[..]);
    }

    #[test]
    fn tampered_auth_value_is_rejected() {
        let keys = keys();
        let pdu = SecureNetworkBeacon {
            key_refresh: false,
            iv_update: true,
            iv_index: 42,
        }
        .encode(&keys);

        // every single-bit flip in the auth value must be caught
        for byte in 14..22 {
            for bit in 0..8 {
                let mut bad = pdu.to_vec();
                bad[byte] ^= 1 << bit;
                assert_eq!(
                    SecureNetworkBeacon::decode(&bad, &keys),
                    Err(WireError::BeaconAuth)
                );
            }
        }
    }

    #[test]
    fn tampered_network_id_is_rejected() {
        let keys = keys();
        let pdu = SecureNetworkBeacon {
            key_refresh: true,
            iv_update: false,
            iv_index: 7,
        }
        .encode(&keys);

        for byte in 2..10 {
            let mut bad = pdu.to_vec();
            bad[byte] ^= 0x80;
            assert_eq!(
                SecureNetworkBeacon::decode(&bad, &keys),
                Err(WireError::NetworkIdMismatch)
            );
        }
    }

    #[test]
    fn tampered_flags_or_iv_index_fail_auth() {
        let keys = keys();
        let pdu = SecureNetworkBeacon {
            key_refresh: false,
            iv_update: false,
            iv_index: 7,
        }
        .encode(&keys);

        let mut bad = pdu.to_vec();
        bad[1] ^= FLAG_IV_UPDATE;
        assert_eq!(
            SecureNetworkBeacon::decode(&bad, &keys),
            Err(WireError::BeaconAuth)
        );

        let mut bad = pdu.to_vec();
        bad[12] ^= 0x01;
        assert_eq!(
            SecureNetworkBeacon::decode(&bad, &keys),
            Err(WireError::BeaconAuth)
        );
    }

    #[test]
    fn malformed_pdus_are_rejected() {
        let keys = keys();
        assert_eq!(
            SecureNetworkBeacon::decode(&[0x01; 21], &keys),
            Err(WireError::BeaconLength(21))
        );
        assert_eq!(
            SecureNetworkBeacon::decode(&[0x00; 22], &keys),
            Err(WireError::BeaconType(0x00))
        );
    }
}
