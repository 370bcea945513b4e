//! Secure network beacons and the proxy protocol bearer.
//!
//! This crate implements the two wire formats a GATT proxy client speaks:
//!
//! - **Secure Network Beacon** (22 bytes): authenticated announcements of
//!   the network's IV Index and Key Refresh state.
//! - **Proxy PDU** (1-byte header + payload): segmentation and reassembly
//!   framing that carries network PDUs, beacons, proxy configuration, and
//!   provisioning PDUs over a size-limited GATT link.
//!
//! ## Wire formats
//!
//! ```text
//! Secure Network Beacon
//! +---------+---------+------------------+----------------+--------------+
//! | u8 0x01 | u8 flags| network_id (8B)  | iv_index (u32) | auth (8B)    |
//! +---------+---------+------------------+----------------+--------------+
//!
//! Proxy PDU
//! +-----------------------------------+------------------------+
//! | 2-bit SAR | 6-bit message type    | payload (<= mtu - 1 B) |
//! +-----------------------------------+------------------------+
//! ```
//!
//! Everything here is pure and synchronous; delivery happens through the
//! [`ProxyHandler`] trait supplied per connection.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod beacon;
pub mod error;
pub mod proxy;

// Re-export main types
pub use beacon::{SecureNetworkBeacon, BEACON_LEN, BEACON_TYPE_SECURE_NETWORK};
pub use error::WireError;
pub use proxy::{ProxyBearer, ProxyHandler, ProxyMessageType, SarType, MIN_ATT_MTU};
