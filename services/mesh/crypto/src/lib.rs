//! Mesh Profile security toolbox.
//!
//! This crate implements the cryptographic primitives mandated by the
//! Bluetooth Mesh Profile: AES-CMAC, AES-CCM authenticated encryption, the
//! single-block security function `e`, and the key derivation functions
//! `s1`, `k1`, `k2`, `k3`, and `k4`. It also defines the key material types
//! shared by the rest of the stack and the 13-byte nonce constructions used
//! for network, application, and device message security.
//!
//! All functions here are pure, synchronous, and CPU-bound; no key material
//! ever leaves this crate except through the typed structs in [`keys`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod nonce;

// Re-export main types
pub use aead::{ccm_decrypt, ccm_encrypt, Nonce, NONCE_LEN};
pub use error::CryptoError;
pub use kdf::{aes_cmac, e, e_slice, k1, k2, k3, k4, s1, xor};
pub use keys::{ApplicationKey, ApplicationKeys, DeviceKey, Key, NetworkKey, NetworkKeys};
pub use nonce::{application_nonce, device_nonce, network_nonce, SeqAuth};
