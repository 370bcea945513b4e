//! AES-CCM authenticated encryption (Mesh Profile 3.8.2.3).
//!
//! Every nonce in this stack is 13 bytes and the MIC is 4, 8, or 16 bytes;
//! the three MIC sizes are the three `Ccm` instantiations below.

use crate::error::CryptoError;
use crate::keys::Key;
use aes::Aes128;
use ccm::aead::{Aead, KeyInit, Payload};
use ccm::consts::{U13, U16, U4, U8};
use ccm::Ccm;
use std::fmt;

/// Nonce length mandated for every CCM use in the mesh stack
pub const NONCE_LEN: usize = 13;

/// A 13-byte CCM nonce
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_LEN]);

impl Nonce {
    /// Borrow the raw nonce bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

// Nonces are public values, unlike key material they may appear in logs.
impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

type Aes128Ccm4 = Ccm<Aes128, U4, U13>;
type Aes128Ccm8 = Ccm<Aes128, U8, U13>;
type Aes128Ccm16 = Ccm<Aes128, U16, U13>;

/// Encrypt and authenticate. Returns `ciphertext || mic`.
pub fn ccm_encrypt(
    key: &Key,
    nonce: &Nonce,
    plaintext: &[u8],
    mic_len: usize,
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let result = match mic_len {
        4 => Aes128Ccm4::new(&key.0.into()).encrypt(&nonce.0.into(), payload),
        8 => Aes128Ccm8::new(&key.0.into()).encrypt(&nonce.0.into(), payload),
        16 => Aes128Ccm16::new(&key.0.into()).encrypt(&nonce.0.into(), payload),
        n => return Err(CryptoError::UnsupportedMicLength(n)),
    };
    // Encryption cannot fail once the parameters are in range.
    result.map_err(|_| CryptoError::AuthenticationFailed)
}

/// Verify and decrypt `ciphertext || mic`. Fails with
/// [`CryptoError::AuthenticationFailed`] when the MIC does not verify.
pub fn ccm_decrypt(
    key: &Key,
    nonce: &Nonce,
    ciphertext: &[u8],
    mic_len: usize,
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    let result = match mic_len {
        4 => Aes128Ccm4::new(&key.0.into()).decrypt(&nonce.0.into(), payload),
        8 => Aes128Ccm8::new(&key.0.into()).decrypt(&nonce.0.into(), payload),
        16 => Aes128Ccm16::new(&key.0.into()).decrypt(&nonce.0.into(), payload),
        n => return Err(CryptoError::UnsupportedMicLength(n)),
    };
    result.map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Key, Nonce) {
        let key = Key::from_hex("0953fa93e7caac9638f58820220a398e").unwrap();
        let nonce = Nonce([
            0x00, 0x07, 0x08, 0x0d, 0x12, 0x34, 0x97, 0x36, 0x00, 0x00, 0x00, 0x00, 0x12,
        ]);
        (key, nonce)
    }

    #[test]
    fn roundtrip_mic4_and_mic8() {
        let (key, nonce) = fixture();
        let plaintext = b"off with the lights";

        for mic_len in [4usize, 8] {
            let sealed = ccm_encrypt(&key, &nonce, plaintext, mic_len, b"").unwrap();
            assert_eq!(sealed.len(), plaintext.len() + mic_len);
            let opened = ccm_decrypt(&key, &nonce, &sealed, mic_len, b"").unwrap();
            assert_eq!(opened, plaintext);
        }
    }

    #[test]
    fn roundtrip_with_aad() {
        let (key, nonce) = fixture();
        let sealed = ccm_encrypt(&key, &nonce, b"payload", 8, b"label-uuid").unwrap();
        assert_eq!(
            ccm_decrypt(&key, &nonce, &sealed, 8, b"label-uuid").unwrap(),
            b"payload"
        );
        // Same ciphertext, different AAD: must not open.
        assert_eq!(
            ccm_decrypt(&key, &nonce, &sealed, 8, b"other-uuid"),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn tampered_mic_fails() {
        let (key, nonce) = fixture();
        let mut sealed = ccm_encrypt(&key, &nonce, b"payload", 4, b"").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(
            ccm_decrypt(&key, &nonce, &sealed, 4, b""),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn wrong_key_or_nonce_fails() {
        let (key, nonce) = fixture();
        let sealed = ccm_encrypt(&key, &nonce, b"payload", 8, b"").unwrap();

        let other_key = Key::from_hex("63964771734fbd768e3e40bf7d27a193").unwrap();
        assert_eq!(
            ccm_decrypt(&other_key, &nonce, &sealed, 8, b""),
            Err(CryptoError::AuthenticationFailed)
        );

        let mut other_nonce = nonce;
        other_nonce.0[12] ^= 0xff;
        assert_eq!(
            ccm_decrypt(&key, &other_nonce, &sealed, 8, b""),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn unsupported_mic_length() {
        let (key, nonce) = fixture();
        assert_eq!(
            ccm_encrypt(&key, &nonce, b"x", 12, b""),
            Err(CryptoError::UnsupportedMicLength(12))
        );
        assert_eq!(
            ccm_decrypt(&key, &nonce, b"xxxxxxxxxxxx", 3, b""),
            Err(CryptoError::UnsupportedMicLength(3))
        );
    }
}
