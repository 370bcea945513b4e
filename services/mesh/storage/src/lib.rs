//! Persisted mesh security state with pluggable backends.
//!
//! This crate defines the [`MeshDatastore`] contract the security layer
//! depends on: durable sequence-number reservation, the two-phase IV Index
//! update machine, key material access, and per-source replay windows.
//! Two backends ship here: in-memory (tests, development) and file-backed
//! (JSON snapshot with atomic replace).
//!
//! Durability rule: a mutating operation returns only after its effect is
//! persisted, so a sequence number can never be reused across a crash and a
//! replayed message can never be re-accepted after a restart.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;

use mesh_crypto::SeqAuth;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use backend::{FileDatastore, MemoryDatastore};
pub use mesh_crypto::{ApplicationKey, ApplicationKeys, DeviceKey, NetworkKey, NetworkKeys};

use async_trait::async_trait;

/// Largest representable 24-bit sequence number
pub const SEQ_MAX: u32 = 0x00ff_ffff;

/// A node's 16-bit unicast address
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnicastAddr(pub u16);

impl fmt::Display for UnicastAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State snapshot (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 24-bit sequence space used up under the current IV Index
    #[error("sequence number space exhausted")]
    SeqExhausted,

    /// Inbound message is not fresher than the stored maximum for its source
    #[error("replay from {src}: seq_auth {seq_auth:#016x} not fresh")]
    Replay {
        /// Originating unicast address
        src: UnicastAddr,
        /// Rejected packed SeqAuth value
        seq_auth: u64,
    },

    /// IV Index state machine misuse
    #[error("invalid iv index transition: {0}")]
    InvalidIvTransition(&'static str),
}

/// Phase of the IV Index update procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IvState {
    /// Normal operation, single active IV Index
    Normal,
    /// IV Update in progress, old and new IV Index both live
    InUpdate,
}

/// IV Index value plus update-machine bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvIndexState {
    /// Current IV Index
    pub iv_index: u32,
    /// Update machine phase
    pub state: IvState,
    /// When the last `begin_iv_index_update` happened (epoch ms)
    pub update_trigger_time_ms: Option<u64>,
    /// When the last update finished or was recovered (epoch ms)
    pub recovery_time_ms: Option<u64>,
}

/// The persisted security/state store the crypto layer depends on.
///
/// Implementations serialize mutations internally; `next_seq` in particular
/// is an atomic reserve-and-persist so concurrent senders can never observe
/// the same sequence number.
#[async_trait]
pub trait MeshDatastore: Send + Sync {
    /// Current (next unreserved) sequence number
    async fn seq(&self) -> Result<u32, StorageError>;

    /// Reserve the next sequence number, persisting the reservation before
    /// returning it. The returned value is safe to place in a nonce.
    async fn next_seq(&self) -> Result<u32, StorageError>;

    /// Current IV Index state
    async fn iv_state(&self) -> Result<IvIndexState, StorageError>;

    /// Enter the IV Update procedure, adopting `new_iv_index`.
    ///
    /// Only valid in `Normal` state and for a strictly greater index.
    async fn begin_iv_index_update(&self, new_iv_index: u32) -> Result<(), StorageError>;

    /// Leave the IV Update procedure. The sequence number restarts at zero
    /// for the now-active IV Index.
    async fn finish_iv_index_update(&self) -> Result<(), StorageError>;

    /// Network key material (derivations included)
    async fn network_keys(&self) -> Result<NetworkKeys, StorageError>;

    /// Application key material (derivations included)
    async fn application_keys(&self) -> Result<ApplicationKeys, StorageError>;

    /// Device key for a peer node, if known
    async fn device_key(&self, peer: UnicastAddr) -> Result<Option<DeviceKey>, StorageError>;

    /// This node's unicast address
    async fn unicast_addr(&self) -> Result<UnicastAddr, StorageError>;

    /// Accept `seq_auth` from `src` only if strictly greater than the stored
    /// maximum, then persist it as the new maximum. Call this only after the
    /// message authenticated; a failed MIC must not advance the window.
    async fn check_replay(&self, src: UnicastAddr, seq_auth: SeqAuth) -> Result<(), StorageError>;
}

/// Provisioning-time constants: address and key material.
#[derive(Debug, Clone)]
pub struct NodeKeys {
    /// This node's unicast address
    pub unicast: UnicastAddr,
    /// Network key material
    pub network: NetworkKeys,
    /// Application key material
    pub application: ApplicationKeys,
}

impl NodeKeys {
    /// Derive all key material from the provisioned secrets
    pub fn new(unicast: UnicastAddr, network: &NetworkKey, application: &ApplicationKey) -> Self {
        Self {
            unicast,
            network: NetworkKeys::derive(network),
            application: ApplicationKeys::derive(application),
        }
    }
}

/// The mutable security state shared by all backends.
///
/// Pure transition logic lives here so both backends behave identically and
/// the invariants are testable without I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityState {
    /// Next unreserved sequence number
    pub seq: u32,
    /// Current IV Index
    pub iv_index: u32,
    /// IV update machine phase
    pub iv_state: IvState,
    /// Last `begin_iv_index_update` time (epoch ms)
    pub iv_update_trigger_time_ms: Option<u64>,
    /// Last update completion/recovery time (epoch ms)
    pub iv_recovery_time_ms: Option<u64>,
    /// Per-source maximum observed SeqAuth (packed 56-bit values)
    pub replay: HashMap<u16, u64>,
}

impl SecurityState {
    /// Fresh state for a newly provisioned node
    pub fn new(iv_index: u32) -> Self {
        Self {
            seq: 0,
            iv_index,
            iv_state: IvState::Normal,
            iv_update_trigger_time_ms: None,
            iv_recovery_time_ms: None,
            replay: HashMap::new(),
        }
    }

    /// Reserve the next sequence number
    pub fn reserve_seq(&mut self) -> Result<u32, StorageError> {
        if self.seq > SEQ_MAX {
            return Err(StorageError::SeqExhausted);
        }
        let seq = self.seq;
        self.seq += 1;
        Ok(seq)
    }

    /// Normal → InUpdate, adopting a strictly greater IV Index
    pub fn begin_iv_update(&mut self, new_iv_index: u32, now_ms: u64) -> Result<(), StorageError> {
        if self.iv_state != IvState::Normal {
            return Err(StorageError::InvalidIvTransition("update already in progress"));
        }
        if new_iv_index <= self.iv_index {
            return Err(StorageError::InvalidIvTransition("iv index must increase"));
        }
        self.iv_index = new_iv_index;
        self.iv_state = IvState::InUpdate;
        self.iv_update_trigger_time_ms = Some(now_ms);
        Ok(())
    }

    /// InUpdate → Normal; the sequence number restarts for the new index
    pub fn finish_iv_update(&mut self, now_ms: u64) -> Result<(), StorageError> {
        if self.iv_state != IvState::InUpdate {
            return Err(StorageError::InvalidIvTransition("no update in progress"));
        }
        self.iv_state = IvState::Normal;
        self.iv_recovery_time_ms = Some(now_ms);
        self.seq = 0;
        Ok(())
    }

    /// Strictly-greater replay check, advancing the window on success
    pub fn check_replay(&mut self, src: UnicastAddr, seq_auth: SeqAuth) -> Result<(), StorageError> {
        let fresh = match self.replay.get(&src.0) {
            Some(&max) => seq_auth.value() > max,
            None => true,
        };
        if !fresh {
            return Err(StorageError::Replay {
                src,
                seq_auth: seq_auth.value(),
            });
        }
        self.replay.insert(src.0, seq_auth.value());
        Ok(())
    }

    /// Snapshot of the IV Index machine
    pub fn iv_index_state(&self) -> IvIndexState {
        IvIndexState {
            iv_index: self.iv_index,
            state: self.iv_state,
            update_trigger_time_ms: self.iv_update_trigger_time_ms,
            recovery_time_ms: self.iv_recovery_time_ms,
        }
    }
}

/// Milliseconds since the Unix epoch
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_reservation_is_monotonic() {
        let mut state = SecurityState::new(0);
        assert_eq!(state.reserve_seq().unwrap(), 0);
        assert_eq!(state.reserve_seq().unwrap(), 1);
        assert_eq!(state.seq, 2);
    }

    #[test]
    fn seq_exhaustion() {
        let mut state = SecurityState::new(0);
        state.seq = SEQ_MAX;
        assert_eq!(state.reserve_seq().unwrap(), SEQ_MAX);
        assert!(matches!(state.reserve_seq(), Err(StorageError::SeqExhausted)));
    }

    #[test]
    fn iv_update_two_phase() {
        let mut state = SecurityState::new(5);
        state.seq = 100;

        state.begin_iv_update(6, 1_000).unwrap();
        assert_eq!(state.iv_index, 6);
        assert_eq!(state.iv_state, IvState::InUpdate);
        assert_eq!(state.iv_update_trigger_time_ms, Some(1_000));
        // seq keeps running until the update completes
        assert_eq!(state.seq, 100);

        state.finish_iv_update(2_000).unwrap();
        assert_eq!(state.iv_state, IvState::Normal);
        assert_eq!(state.iv_recovery_time_ms, Some(2_000));
        assert_eq!(state.seq, 0);
    }

    #[test]
    fn iv_update_misuse_is_rejected() {
        let mut state = SecurityState::new(5);
        assert!(matches!(
            state.finish_iv_update(0),
            Err(StorageError::InvalidIvTransition(_))
        ));
        assert!(matches!(
            state.begin_iv_update(5, 0),
            Err(StorageError::InvalidIvTransition(_))
        ));
        state.begin_iv_update(6, 0).unwrap();
        assert!(matches!(
            state.begin_iv_update(7, 0),
            Err(StorageError::InvalidIvTransition(_))
        ));
    }

    #[test]
    fn replay_window_strictly_greater() {
        let mut state = SecurityState::new(0);
        let src = UnicastAddr(0x0042);

        state.check_replay(src, SeqAuth::new(1, 10)).unwrap();
        // equal is a replay
        assert!(matches!(
            state.check_replay(src, SeqAuth::new(1, 10)),
            Err(StorageError::Replay { .. })
        ));
        // smaller seq is a replay
        assert!(matches!(
            state.check_replay(src, SeqAuth::new(1, 9)),
            Err(StorageError::Replay { .. })
        ));
        // greater seq advances
        state.check_replay(src, SeqAuth::new(1, 11)).unwrap();
        // a fresh IV Index always outranks the old window
        state.check_replay(src, SeqAuth::new(2, 0)).unwrap();
        // and the old IV Index is dead afterwards
        assert!(matches!(
            state.check_replay(src, SeqAuth::new(1, 9999)),
            Err(StorageError::Replay { .. })
        ));
    }

    #[test]
    fn replay_windows_are_per_source() {
        let mut state = SecurityState::new(0);
        state.check_replay(UnicastAddr(1), SeqAuth::new(0, 50)).unwrap();
        // a different source starts its own window
        state.check_replay(UnicastAddr(2), SeqAuth::new(0, 1)).unwrap();
    }
}
