//! Access-layer opcode dispatch.
//!
//! A decrypted access message starts with a 1, 2, or 3 byte opcode selected
//! by the top two bits of its first byte. This crate parses that prefix,
//! keeps the opcode → model table built once at startup, and forwards model
//! state updates to an injected sink.
//!
//! Unknown opcodes are logged and dropped, never surfaced as errors: a
//! mixed-vendor mesh routinely carries models this gateway does not speak.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod model;
pub mod opcode;
pub mod router;

use thiserror::Error;

// Re-export main types
pub use model::{Model, ModelUpdate, UpdateSink};
pub use opcode::{opcode_len, parse_opcode, Opcode};
pub use router::AccessRouter;

/// Access-layer errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// Two models registered the same opcode
    #[error("duplicate opcode {0}")]
    DuplicateOpcode(Opcode),

    /// Message too short for its declared opcode length
    #[error("truncated access message: {0} bytes")]
    Truncated(usize),
}
