//! Gateway wiring: proxy connections, beacon handling, access dispatch.
//!
//! One [`Connection`] owns the SAR bearer of one GATT proxy link. The
//! [`Gateway`] owns the node-wide pieces: the datastore, the access router,
//! and the event channel toward the cloud/phone controller. Validated
//! beacons drive the datastore's IV Index update machine; everything that
//! fails validation is dropped and logged, never propagated to the link.

use anyhow::Result;
use bytes::Bytes;
use mesh_access::{AccessRouter, Model, ModelUpdate, UpdateSink};
use mesh_storage::{IvState, MeshDatastore, UnicastAddr};
use mesh_wire::{ProxyBearer, ProxyHandler, ProxyMessageType, SecureNetworkBeacon, WireError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A complete message reassembled from one proxy connection
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Encrypted network PDU, for the network-layer decryptor
    NetworkPdu(Bytes),
    /// Raw mesh beacon, for [`Gateway::process_inbound`]
    Beacon(Bytes),
}

/// Events the gateway surfaces to its controller
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A network PDU awaiting network-layer decryption
    NetworkPdu(Bytes),
    /// A validated secure network beacon was applied
    Beacon {
        /// Announced IV Index
        iv_index: u32,
        /// IV Update procedure flag
        iv_update: bool,
        /// Key Refresh procedure flag
        key_refresh: bool,
    },
    /// A model produced a semantic state update
    Update(ModelUpdate),
}

/// Bearer handler: outbound segments go to the transport writer, complete
/// inbound messages queue for the gateway.
struct ConnectionHandler {
    outbound: mpsc::UnboundedSender<Bytes>,
    received: Vec<InboundMessage>,
}

impl ProxyHandler for ConnectionHandler {
    fn send_segment(&mut self, segment: Bytes) {
        if self.outbound.send(segment).is_err() {
            warn!("transport writer gone, dropping outbound segment");
        }
    }

    fn handle_network_pdu(&mut self, pdu: Bytes) {
        self.received.push(InboundMessage::NetworkPdu(pdu));
    }

    fn handle_beacon(&mut self, beacon: Bytes) {
        self.received.push(InboundMessage::Beacon(beacon));
    }
}

/// One GATT proxy link's segmentation state
pub struct Connection {
    bearer: ProxyBearer<ConnectionHandler>,
}

impl Connection {
    fn new(att_mtu: usize, outbound: mpsc::UnboundedSender<Bytes>) -> Result<Self, WireError> {
        let handler = ConnectionHandler {
            outbound,
            received: Vec::new(),
        };
        Ok(Self {
            bearer: ProxyBearer::new(att_mtu, handler)?,
        })
    }

    /// Feed one transport packet in; returns any completed messages.
    ///
    /// SAR sequence violations reset the bearer's buffer internally; the
    /// caller keeps the connection and moves on.
    pub fn receive_packet(&mut self, packet: &[u8]) -> Result<Vec<InboundMessage>, WireError> {
        self.bearer.receive(packet)?;
        Ok(std::mem::take(&mut self.bearer.handler_mut().received))
    }

    /// Queue a network PDU for this link, segmented as needed
    pub fn send_network_pdu(&mut self, pdu: &[u8]) {
        self.bearer.send(ProxyMessageType::NetworkPdu, pdu);
    }

    /// Queue a beacon for this link, segmented as needed
    pub fn send_beacon(&mut self, beacon: &[u8]) {
        self.bearer.send(ProxyMessageType::MeshBeacon, beacon);
    }
}

/// Forwards model updates into the gateway event channel
struct EventSink(mpsc::UnboundedSender<GatewayEvent>);

impl UpdateSink for EventSink {
    fn update(&mut self, update: ModelUpdate) {
        if self.0.send(GatewayEvent::Update(update)).is_err() {
            warn!("event consumer gone, dropping model update");
        }
    }
}

/// Node-wide gateway state
pub struct Gateway {
    datastore: Arc<dyn MeshDatastore>,
    router: AccessRouter<EventSink>,
    events_tx: mpsc::UnboundedSender<GatewayEvent>,
    att_mtu: usize,
}

impl Gateway {
    /// Build the gateway and the event stream its controller consumes
    pub fn new(
        datastore: Arc<dyn MeshDatastore>,
        models: Vec<Box<dyn Model>>,
        att_mtu: usize,
    ) -> Result<(Self, mpsc::UnboundedReceiver<GatewayEvent>)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let router = AccessRouter::new(models, EventSink(events_tx.clone()))?;
        Ok((
            Self {
                datastore,
                router,
                events_tx,
                att_mtu,
            },
            events_rx,
        ))
    }

    /// Open the bearer for a newly connected proxy link
    pub fn open_connection(
        &self,
        outbound: mpsc::UnboundedSender<Bytes>,
    ) -> Result<Connection, WireError> {
        Connection::new(self.att_mtu, outbound)
    }

    /// Handle one reassembled inbound message from a connection
    pub async fn process_inbound(&mut self, message: InboundMessage) -> Result<()> {
        match message {
            InboundMessage::NetworkPdu(pdu) => {
                debug!(len = pdu.len(), "forwarding network pdu to network layer");
                let _ = self.events_tx.send(GatewayEvent::NetworkPdu(pdu));
            }
            InboundMessage::Beacon(raw) => self.process_beacon(&raw).await?,
        }
        Ok(())
    }

    /// Dispatch a decrypted access message to the registered models.
    ///
    /// Called by the network-layer decryptor after MIC verification and the
    /// datastore replay check have both passed.
    pub async fn dispatch_access(&mut self, src: UnicastAddr, message: &[u8]) {
        if let Err(err) = self.router.dispatch(src.0, message) {
            warn!(%src, %err, "dropping malformed access message");
        }
    }

    /// Build the node's current secure network beacon for a link
    pub async fn current_beacon(&self) -> Result<Bytes> {
        let keys = self.datastore.network_keys().await?;
        let iv = self.datastore.iv_state().await?;
        let beacon = SecureNetworkBeacon {
            key_refresh: false,
            iv_update: iv.state == IvState::InUpdate,
            iv_index: iv.iv_index,
        };
        Ok(beacon.encode(&keys))
    }

    async fn process_beacon(&mut self, raw: &[u8]) -> Result<()> {
        let keys = self.datastore.network_keys().await?;
        let beacon = match SecureNetworkBeacon::decode(raw, &keys) {
            Ok(beacon) => beacon,
            Err(err) => {
                // Shared radio medium: invalid beacons are noise, not faults.
                warn!(%err, "discarding invalid secure network beacon");
                return Ok(());
            }
        };

        let iv = self.datastore.iv_state().await?;
        if beacon.iv_update && iv.state == IvState::Normal && beacon.iv_index > iv.iv_index {
            info!(iv_index = beacon.iv_index, "iv index update started by network");
            self.datastore.begin_iv_index_update(beacon.iv_index).await?;
        } else if !beacon.iv_update && iv.state == IvState::InUpdate && beacon.iv_index == iv.iv_index
        {
            info!(iv_index = beacon.iv_index, "iv index update completed");
            self.datastore.finish_iv_index_update().await?;
        }

        let _ = self.events_tx.send(GatewayEvent::Beacon {
            iv_index: beacon.iv_index,
            iv_update: beacon.iv_update,
            key_refresh: beacon.key_refresh,
        });
        Ok(())
    }
}
