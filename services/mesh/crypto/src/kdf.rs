//! Security functions and key derivation (Mesh Profile 3.8.2).
//!
//! `s1`, `k1`, `k2`, `k3`, and `k4` are deterministic pure functions of
//! their inputs. Callers that need the same derivation repeatedly hold the
//! result in a [`crate::keys::NetworkKeys`] / [`crate::keys::ApplicationKeys`]
//! struct instead of re-deriving per message.

use crate::error::CryptoError;
use crate::keys::Key;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};

const ZERO_KEY: Key = Key([0u8; 16]);

/// Byte-wise XOR of two equal-length slices
pub fn xor(a: &[u8], b: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if a.len() != b.len() {
        return Err(CryptoError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| x ^ y).collect())
}

/// AES-CMAC (NIST SP 800-38B) over `msg` with a 128-bit key
pub fn aes_cmac(key: &Key, msg: &[u8]) -> [u8; 16] {
    let mut mac = <Cmac<Aes128> as Mac>::new(&key.0.into());
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

/// Security function `e` (Core Spec 2.2.1): single-block AES-128 encryption
pub fn e(key: &Key, block: [u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(&key.0.into());
    let mut block = block.into();
    cipher.encrypt_block(&mut block);
    block.into()
}

/// Slice-accepting form of [`e`] for callers without a fixed-size block
pub fn e_slice(key: &Key, block: &[u8]) -> Result<[u8; 16], CryptoError> {
    let block: [u8; 16] = block
        .try_into()
        .map_err(|_| CryptoError::InvalidBlockSize(block.len()))?;
    Ok(e(key, block))
}

/// SALT generation function: `s1(m) = cmac(ZERO, m)`
pub fn s1(m: &[u8]) -> [u8; 16] {
    aes_cmac(&ZERO_KEY, m)
}

/// `k1(n, salt, p) = cmac(cmac(salt, n), p)`
pub fn k1(n: &[u8], salt: &[u8; 16], p: &[u8]) -> [u8; 16] {
    let t = Key(aes_cmac(&Key(*salt), n));
    aes_cmac(&t, p)
}

/// `k2`: derive (NID, EncryptionKey, PrivacyKey) from a network key.
///
/// The concatenated tail `t1 || t2 || t3` is taken mod 2^263; in byte terms
/// the NID is the low 7 bits of `t1`'s final byte (the discarded top bit is
/// the pad), followed by `t2` and `t3` verbatim.
pub fn k2(n: &Key, p: &[u8]) -> (u8, Key, Key) {
    let t = Key(aes_cmac(&Key(s1(b"smk2")), n.as_bytes()));

    let t1 = aes_cmac(&t, &[p, &[0x01][..]].concat());
    let t2 = aes_cmac(&t, &[&t1[..], p, &[0x02][..]].concat());
    let t3 = aes_cmac(&t, &[&t2[..], p, &[0x03][..]].concat());

    (t1[15] & 0x7f, Key(t2), Key(t3))
}

/// `k3`: derive the 8-byte public NetworkID from a network key
pub fn k3(n: &Key) -> [u8; 8] {
    let t = Key(aes_cmac(&Key(s1(b"smk3")), n.as_bytes()));
    let out = aes_cmac(&t, b"id64\x01");
    out[8..16].try_into().unwrap()
}

/// `k4`: derive the 6-bit AID from an application key
pub fn k4(n: &Key) -> u8 {
    let t = Key(aes_cmac(&Key(s1(b"smk4")), n.as_bytes()));
    let out = aes_cmac(&t, b"id6\x01");
    out[15] & 0x3f
}
