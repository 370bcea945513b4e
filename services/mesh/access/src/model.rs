//! The model contract consumed by the router.

use crate::opcode::Opcode;
use serde::Serialize;

/// A semantic state change produced by a model.
///
/// The payload stays schemaless (`serde_json::Value`) because the gateway
/// forwards it verbatim to the cloud/phone controller; model-specific shape
/// belongs to the model implementations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUpdate {
    /// Unicast address the message originated from
    pub src: u16,
    /// Name of the model that produced the update
    pub model: &'static str,
    /// Semantic state value (model-defined shape)
    pub state: serde_json::Value,
}

/// A client model: advertises the opcodes it handles and turns raw access
/// messages into semantic updates.
pub trait Model: Send {
    /// Stable model name used in updates and logs
    fn name(&self) -> &'static str;

    /// Opcodes this model wants routed to it. Claimed exactly once across
    /// the whole router; overlaps fail construction.
    fn opcodes(&self) -> &'static [Opcode];

    /// Handle a raw access message (opcode included). `None` means the
    /// message carried no externally visible state change.
    fn handle(&mut self, src: u16, message: &[u8]) -> Option<ModelUpdate>;
}

/// Receives updates the router extracts from inbound messages, in delivery
/// order.
pub trait UpdateSink: Send {
    /// Forward one semantic update
    fn update(&mut self, update: ModelUpdate);
}

impl<F: FnMut(ModelUpdate) + Send> UpdateSink for F {
    fn update(&mut self, update: ModelUpdate) {
        self(update)
    }
}
