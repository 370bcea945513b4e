//! Variable-length access opcodes.
//!
//! Opcode length is selected by the top two bits of the first byte:
//! `0b00`/`0b01` → 1 byte (SIG single-octet), `0b10` → 2 bytes (SIG
//! two-octet), `0b11` → 3 bytes (vendor). The opcode value is the big-endian
//! integer of those bytes.

use crate::AccessError;
use std::fmt;

/// An access-layer opcode (up to 3 bytes on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u32);

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Wire length of the opcode starting with `first_byte`
pub fn opcode_len(first_byte: u8) -> usize {
    match first_byte >> 6 {
        0b00 | 0b01 => 1,
        0b10 => 2,
        _ => 3,
    }
}

/// Split an access message into its opcode and payload
pub fn parse_opcode(message: &[u8]) -> Result<(Opcode, &[u8]), AccessError> {
    let first = *message.first().ok_or(AccessError::Truncated(0))?;
    let len = opcode_len(first);
    if message.len() < len {
        return Err(AccessError::Truncated(message.len()));
    }

    let value = message[..len]
        .iter()
        .fold(0u32, |acc, &byte| (acc << 8) | byte as u32);
    Ok((Opcode(value), &message[len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_table() {
        assert_eq!(opcode_len(0x00), 1);
        assert_eq!(opcode_len(0x40), 1);
        assert_eq!(opcode_len(0x80), 2);
        assert_eq!(opcode_len(0xc0), 3);
    }

    #[test]
    fn parse_single_byte() {
        let (opcode, payload) = parse_opcode(&[0x04, 0xaa, 0xbb]).unwrap();
        assert_eq!(opcode, Opcode(0x04));
        assert_eq!(payload, &[0xaa, 0xbb]);
    }

    #[test]
    fn parse_two_byte() {
        // Generic OnOff Set
        let (opcode, payload) = parse_opcode(&[0x82, 0x02, 0x01]).unwrap();
        assert_eq!(opcode, Opcode(0x8202));
        assert_eq!(payload, &[0x01]);
    }

    #[test]
    fn parse_three_byte_vendor() {
        let (opcode, payload) = parse_opcode(&[0xc0, 0x12, 0x34]).unwrap();
        assert_eq!(opcode, Opcode(0x00c0_1234));
        assert!(payload.is_empty());
    }

    #[test]
    fn truncated_messages() {
        assert_eq!(parse_opcode(&[]), Err(AccessError::Truncated(0)));
        assert_eq!(parse_opcode(&[0x80]), Err(AccessError::Truncated(1)));
        assert_eq!(parse_opcode(&[0xc0, 0x00]), Err(AccessError::Truncated(2)));
    }
}
