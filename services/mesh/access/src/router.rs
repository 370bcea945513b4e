//! Opcode table and dispatch.

use crate::model::{Model, UpdateSink};
use crate::opcode::parse_opcode;
use crate::AccessError;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Routes decoded access messages to the model claiming their opcode.
///
/// The opcode table is built once at construction from each model's
/// declared opcode list and never changes afterwards.
pub struct AccessRouter<S: UpdateSink> {
    models: Vec<Box<dyn Model>>,
    table: HashMap<crate::Opcode, usize>,
    sink: S,
}

impl<S: UpdateSink> AccessRouter<S> {
    /// Build the opcode table. Fails if two models claim the same opcode.
    pub fn new(models: Vec<Box<dyn Model>>, sink: S) -> Result<Self, AccessError> {
        let mut table = HashMap::new();
        for (index, model) in models.iter().enumerate() {
            for &opcode in model.opcodes() {
                if table.insert(opcode, index).is_some() {
                    return Err(AccessError::DuplicateOpcode(opcode));
                }
            }
        }
        Ok(Self {
            models,
            table,
            sink,
        })
    }

    /// Dispatch one decrypted access message from `src`.
    ///
    /// Unknown opcodes are dropped silently (debug-logged); only a message
    /// too short for its own opcode is an error.
    pub fn dispatch(&mut self, src: u16, message: &[u8]) -> Result<(), AccessError> {
        let (opcode, _payload) = parse_opcode(message)?;

        let Some(&index) = self.table.get(&opcode) else {
            debug!(%opcode, src, "no model registered, dropping message");
            return Ok(());
        };

        let model = &mut self.models[index];
        trace!(%opcode, src, model = model.name(), "dispatching access message");
        if let Some(update) = model.handle(src, message) {
            self.sink.update(update);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelUpdate;
    use crate::Opcode;
    use std::sync::{Arc, Mutex};

    const ONOFF_STATUS: Opcode = Opcode(0x8204);
    const LEVEL_STATUS: Opcode = Opcode(0x8208);

    struct StatusModel {
        name: &'static str,
        opcodes: &'static [Opcode],
        seen: Vec<(u16, Vec<u8>)>,
        emit: bool,
    }

    impl Model for StatusModel {
        fn name(&self) -> &'static str {
            self.name
        }
        fn opcodes(&self) -> &'static [Opcode] {
            self.opcodes
        }
        fn handle(&mut self, src: u16, message: &[u8]) -> Option<ModelUpdate> {
            self.seen.push((src, message.to_vec()));
            self.emit.then(|| ModelUpdate {
                src,
                model: self.name,
                state: serde_json::json!({ "raw": message.len() }),
            })
        }
    }

    fn onoff(emit: bool) -> Box<dyn Model> {
        Box::new(StatusModel {
            name: "onoff",
            opcodes: &[ONOFF_STATUS],
            seen: vec![],
            emit,
        })
    }

    type SharedUpdates = Arc<Mutex<Vec<ModelUpdate>>>;

    fn sink() -> (SharedUpdates, impl FnMut(ModelUpdate) + Send) {
        let updates: SharedUpdates = Arc::default();
        let clone = updates.clone();
        (updates, move |u| clone.lock().unwrap().push(u))
    }

    #[test]
    fn dispatch_forwards_update() {
        let (updates, sink) = sink();
        let mut router = AccessRouter::new(vec![onoff(true)], sink).unwrap();

        router.dispatch(0x0042, &[0x82, 0x04, 0x01]).unwrap();

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].src, 0x0042);
        assert_eq!(updates[0].model, "onoff");
    }

    #[test]
    fn model_without_update_stays_silent() {
        let (updates, sink) = sink();
        let mut router = AccessRouter::new(vec![onoff(false)], sink).unwrap();

        router.dispatch(0x0042, &[0x82, 0x04, 0x01]).unwrap();
        assert!(updates.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_opcode_is_dropped_without_error() {
        let (updates, sink) = sink();
        let mut router = AccessRouter::new(vec![onoff(true)], sink).unwrap();

        // 0xFFFF decodes as a 3-byte vendor opcode; give it its third byte.
        router.dispatch(0x0001, &[0xff, 0xff, 0x00]).unwrap();
        // Unregistered 2-byte opcode.
        router.dispatch(0x0001, &[0x82, 0x08]).unwrap();
        assert!(updates.lock().unwrap().is_empty());
    }

    #[test]
    fn duplicate_opcode_fails_construction() {
        let dup = Box::new(StatusModel {
            name: "dup",
            opcodes: &[ONOFF_STATUS, LEVEL_STATUS],
            seen: vec![],
            emit: false,
        });
        let (_, sink) = sink();
        assert_eq!(
            AccessRouter::new(vec![onoff(true), dup], sink).err(),
            Some(AccessError::DuplicateOpcode(ONOFF_STATUS))
        );
    }

    #[test]
    fn truncated_message_is_an_error() {
        let (_, sink) = sink();
        let mut router = AccessRouter::new(vec![onoff(true)], sink).unwrap();
        assert_eq!(router.dispatch(1, &[]), Err(AccessError::Truncated(0)));
        assert_eq!(router.dispatch(1, &[0x82]), Err(AccessError::Truncated(1)));
    }
}
