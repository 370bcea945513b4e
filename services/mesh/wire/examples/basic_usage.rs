//! Basic usage example for the mesh proxy wire layer.

use bytes::Bytes;
use mesh_crypto::{Key, NetworkKey, NetworkKeys};
use mesh_wire::{ProxyBearer, ProxyHandler, ProxyMessageType, SecureNetworkBeacon};

/// Collects everything the bearer emits so the example can print it.
#[derive(Default)]
struct Printer {
    segments: Vec<Bytes>,
    network_pdus: Vec<Bytes>,
    beacons: Vec<Bytes>,
}

impl ProxyHandler for Printer {
    fn send_segment(&mut self, segment: Bytes) {
        self.segments.push(segment);
    }

    fn handle_network_pdu(&mut self, pdu: Bytes) {
        self.network_pdus.push(pdu);
    }

    fn handle_beacon(&mut self, beacon: Bytes) {
        self.beacons.push(beacon);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Mesh Proxy Wire Example ===\n");

    // 1. Derive the network security material
    println!("1. Deriving network keys...");
    let netkey = NetworkKey(Key::from_hex("7dd7364cd842ad18c17c2b820c84c3d6")?);
    let keys = NetworkKeys::derive(&netkey);
    println!("   NID:        0x{:02x}", keys.nid);
    println!("   Network ID: {}", hex::encode(keys.network_id));

    // 2. Build and authenticate a secure network beacon
    println!("\n2. Encoding a secure network beacon...");
    let beacon = SecureNetworkBeacon {
        key_refresh: false,
        iv_update: true,
        iv_index: 0x1234_5678,
    };
    let pdu = beacon.encode(&keys);
    println!("   Beacon PDU ({} bytes): {}", pdu.len(), hex::encode(&pdu));

    let decoded = SecureNetworkBeacon::decode(&pdu, &keys)?;
    println!(
        "   Decoded: iv_index={:#010x} iv_update={}",
        decoded.iv_index, decoded.iv_update
    );

    // 3. Segment the beacon over a small ATT MTU
    println!("\n3. Segmenting over a proxy bearer (ATT MTU 8)...");
    let mut sender = ProxyBearer::new(8, Printer::default())?;
    sender.send(ProxyMessageType::MeshBeacon, &pdu);
    let segments = std::mem::take(&mut sender.handler_mut().segments);
    for (i, segment) in segments.iter().enumerate() {
        println!("   Segment {}: {}", i, hex::encode(segment));
    }

    // 4. Reassemble on the receiving side
    println!("\n4. Reassembling on the peer bearer...");
    let mut receiver = ProxyBearer::new(8, Printer::default())?;
    for segment in &segments {
        receiver.receive(segment)?;
    }
    let delivered = &receiver.handler_mut().beacons;
    println!(
        "   Delivered {} beacon ({} bytes), matches original: {}",
        delivered.len(),
        delivered[0].len(),
        delivered[0] == pdu
    );

    println!("\n=== Example completed successfully ===");
    Ok(())
}
