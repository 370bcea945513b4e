//! Crypto error types.

use thiserror::Error;

/// Errors raised by the security toolbox
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// XOR operands have different lengths
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// Length of the left operand
        left: usize,
        /// Length of the right operand
        right: usize,
    },

    /// Block for function `e` is not exactly 16 bytes
    #[error("invalid block size: {0}")]
    InvalidBlockSize(usize),

    /// Key material is not exactly 16 bytes
    #[error("invalid key length: {0}")]
    InvalidKeyLength(usize),

    /// CCM MIC length outside the Mesh Profile set {4, 8, 16}
    #[error("unsupported mic length: {0}")]
    UnsupportedMicLength(usize),

    /// CCM tag did not verify
    #[error("authentication failed")]
    AuthenticationFailed,
}
