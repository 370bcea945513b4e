//! Proxy PDU segmentation and reassembly.
//!
//! The proxy protocol carries logical messages of arbitrary length over a
//! GATT link whose usable payload is `att_mtu - 1` bytes per packet. A
//! message either fits in one `Complete` segment or travels as
//! `First`, `Continuation`*, `Last`.
//!
//! One [`ProxyBearer`] owns the reassembly state of one GATT connection;
//! at most one inbound message is in flight per bearer, and bearers are
//! never shared across connections.

use crate::error::WireError;
use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

/// Smallest ATT MTU that leaves room for payload bytes
pub const MIN_ATT_MTU: usize = 2;

/// Segmentation role of a proxy PDU (header bits 7..6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SarType {
    /// Complete message in a single segment
    Complete = 0b00,
    /// First segment of a segmented message
    First = 0b01,
    /// Interior segment
    Continuation = 0b10,
    /// Final segment
    Last = 0b11,
}

impl SarType {
    fn from_header(header: u8) -> Self {
        match header >> 6 {
            0b00 => SarType::Complete,
            0b01 => SarType::First,
            0b10 => SarType::Continuation,
            _ => SarType::Last,
        }
    }
}

/// Kind of message a proxy PDU carries (header bits 5..0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProxyMessageType {
    /// Encrypted network-layer PDU
    NetworkPdu = 0x00,
    /// Mesh beacon (secure network beacon here)
    MeshBeacon = 0x01,
    /// Proxy filter configuration
    ProxyConfiguration = 0x02,
    /// PB-GATT provisioning PDU
    ProvisioningPdu = 0x03,
}

impl TryFrom<u8> for ProxyMessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ProxyMessageType::NetworkPdu),
            0x01 => Ok(ProxyMessageType::MeshBeacon),
            0x02 => Ok(ProxyMessageType::ProxyConfiguration),
            0x03 => Ok(ProxyMessageType::ProvisioningPdu),
            other => Err(WireError::MessageType(other)),
        }
    }
}

/// Per-connection sink for outbound segments and reassembled inbound
/// messages.
///
/// `send_segment` must hand packets to the transport in call order; the
/// bearer emits a whole message's segments back to back and never batches.
pub trait ProxyHandler {
    /// Emit one outbound proxy PDU (header + payload, ready for the link)
    fn send_segment(&mut self, segment: Bytes);

    /// A complete network PDU arrived
    fn handle_network_pdu(&mut self, pdu: Bytes);

    /// A complete mesh beacon arrived
    fn handle_beacon(&mut self, beacon: Bytes);
}

/// Segmentation and reassembly bearer for one proxy connection
pub struct ProxyBearer<H: ProxyHandler> {
    att_mtu: usize,
    handler: H,
    reassembly: Option<(ProxyMessageType, BytesMut)>,
}

impl<H: ProxyHandler> ProxyBearer<H> {
    /// Create a bearer for a link with the negotiated ATT MTU
    pub fn new(att_mtu: usize, handler: H) -> Result<Self, WireError> {
        if att_mtu < MIN_ATT_MTU {
            return Err(WireError::Mtu(att_mtu));
        }
        Ok(Self {
            att_mtu,
            handler,
            reassembly: None,
        })
    }

    /// Usable payload bytes per segment
    pub fn data_mtu(&self) -> usize {
        self.att_mtu - 1
    }

    /// Access the handler (tests and event draining)
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Segment `message` and emit it to the transport in order.
    ///
    /// Messages up to `data_mtu` bytes (including empty ones) go out as a
    /// single `Complete` segment.
    pub fn send(&mut self, message_type: ProxyMessageType, message: &[u8]) {
        let data_mtu = self.data_mtu();
        if message.len() <= data_mtu {
            let segment = Self::segment(SarType::Complete, message_type, message);
            self.handler.send_segment(segment);
            return;
        }

        let mut chunks = message.chunks(data_mtu).peekable();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            let sar = if first {
                SarType::First
            } else if chunks.peek().is_some() {
                SarType::Continuation
            } else {
                SarType::Last
            };
            first = false;
            self.handler.send_segment(Self::segment(sar, message_type, chunk));
        }
    }

    /// Consume one inbound proxy PDU, delivering any completed message.
    ///
    /// Out-of-sequence segments clear the reassembly buffer and surface a
    /// [`WireError::SarSequence`]; the connection layer drops and logs,
    /// other traffic is unaffected.
    pub fn receive(&mut self, packet: &[u8]) -> Result<(), WireError> {
        let (&header, data) = packet
            .split_first()
            .ok_or(WireError::Truncated(packet.len()))?;
        let sar = SarType::from_header(header);
        let message_type = ProxyMessageType::try_from(header & 0x3f)?;

        match sar {
            SarType::Complete => {
                // Delivered as-is; an in-progress reassembly is untouched.
                self.deliver(message_type, Bytes::copy_from_slice(data));
            }
            SarType::First => {
                if let Some((pending, buf)) = self.reassembly.take() {
                    warn!(
                        ?pending,
                        buffered = buf.len(),
                        "discarding abandoned reassembly on new First segment"
                    );
                }
                self.reassembly = Some((message_type, BytesMut::from(data)));
            }
            SarType::Continuation => {
                let buf = self.continue_reassembly(message_type)?;
                buf.extend_from_slice(data);
            }
            SarType::Last => {
                self.continue_reassembly(message_type)?.extend_from_slice(data);
                if let Some((_, buf)) = self.reassembly.take() {
                    self.deliver(message_type, buf.freeze());
                }
            }
        }
        Ok(())
    }

    /// Validate that a Continuation/Last segment matches the pending
    /// reassembly, resetting the buffer when it does not.
    fn continue_reassembly(
        &mut self,
        message_type: ProxyMessageType,
    ) -> Result<&mut BytesMut, WireError> {
        let matches = match &self.reassembly {
            None => return Err(WireError::SarSequence("no reassembly in progress")),
            Some((pending, _)) => *pending == message_type,
        };
        if !matches {
            self.reassembly = None;
            return Err(WireError::SarSequence("message type changed mid-message"));
        }
        self.reassembly
            .as_mut()
            .map(|(_, buf)| buf)
            .ok_or(WireError::SarSequence("no reassembly in progress"))
    }

    fn deliver(&mut self, message_type: ProxyMessageType, message: Bytes) {
        match message_type {
            ProxyMessageType::NetworkPdu => self.handler.handle_network_pdu(message),
            ProxyMessageType::MeshBeacon => self.handler.handle_beacon(message),
            // Filtering and PB-GATT are not part of this gateway; dropping
            // them is defined behavior, not an error.
            ProxyMessageType::ProxyConfiguration | ProxyMessageType::ProvisioningPdu => {
                debug!(?message_type, len = message.len(), "unhandled proxy message");
            }
        }
    }

    fn segment(sar: SarType, message_type: ProxyMessageType, data: &[u8]) -> Bytes {
        let mut segment = BytesMut::with_capacity(1 + data.len());
        segment.extend_from_slice(&[(sar as u8) << 6 | message_type as u8]);
        segment.extend_from_slice(data);
        segment.freeze()
    }
}
