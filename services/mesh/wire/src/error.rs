//! Wire protocol error types.

use thiserror::Error;

/// Beacon and proxy protocol errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// PDU shorter than its fixed layout requires
    #[error("truncated pdu: {0} bytes")]
    Truncated(usize),

    /// Beacon is not the expected 22 bytes
    #[error("bad beacon length: {0}")]
    BeaconLength(usize),

    /// Unknown beacon type octet
    #[error("unknown beacon type {0:#04x}")]
    BeaconType(u8),

    /// Beacon NetworkID does not match the network key
    #[error("beacon network_id mismatch")]
    NetworkIdMismatch,

    /// Beacon authentication value did not verify
    #[error("beacon auth_value mismatch")]
    BeaconAuth,

    /// Unknown proxy message type
    #[error("unknown proxy message type {0:#04x}")]
    MessageType(u8),

    /// SAR segment arrived out of sequence
    #[error("sar sequence violation: {0}")]
    SarSequence(&'static str),

    /// ATT MTU leaves no room for proxy payload bytes
    #[error("att mtu too small: {0}")]
    Mtu(usize),
}
