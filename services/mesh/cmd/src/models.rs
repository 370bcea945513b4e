//! Gateway-side client models.
//!
//! Only the status messages a cloud bridge cares about are understood here;
//! everything else a model opts out of by returning `None`. Opcodes are the
//! SIG-assigned two-octet values; multi-octet state fields are little-endian
//! per the access layer.

use mesh_access::{Model, ModelUpdate, Opcode};
use serde_json::json;
use tracing::debug;

const GENERIC_ONOFF_STATUS: Opcode = Opcode(0x8204);
const GENERIC_LEVEL_STATUS: Opcode = Opcode(0x8208);

/// Generic OnOff client: consumes OnOff Status messages
#[derive(Default)]
pub struct GenericOnOffClient;

impl Model for GenericOnOffClient {
    fn name(&self) -> &'static str {
        "generic_onoff"
    }

    fn opcodes(&self) -> &'static [Opcode] {
        &[GENERIC_ONOFF_STATUS]
    }

    fn handle(&mut self, src: u16, message: &[u8]) -> Option<ModelUpdate> {
        // opcode(2) | present(1) | [target(1) | remaining_time(1)]
        let present = *message.get(2)?;
        let target = message.get(3).copied();
        if present > 1 {
            debug!(src, present, "onoff status with out-of-range value");
            return None;
        }
        Some(ModelUpdate {
            src,
            model: self.name(),
            state: json!({ "on": present == 1, "target": target.map(|t| t == 1) }),
        })
    }
}

/// Generic Level client: consumes Level Status messages
#[derive(Default)]
pub struct GenericLevelClient;

impl Model for GenericLevelClient {
    fn name(&self) -> &'static str {
        "generic_level"
    }

    fn opcodes(&self) -> &'static [Opcode] {
        &[GENERIC_LEVEL_STATUS]
    }

    fn handle(&mut self, src: u16, message: &[u8]) -> Option<ModelUpdate> {
        // opcode(2) | present(2, LE) | [target(2, LE) | remaining_time(1)]
        let present = i16::from_le_bytes([*message.get(2)?, *message.get(3)?]);
        Some(ModelUpdate {
            src,
            model: self.name(),
            state: json!({ "level": present }),
        })
    }
}
