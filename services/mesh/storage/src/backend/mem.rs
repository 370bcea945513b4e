//! In-memory datastore backend for development and testing

use crate::{
    now_ms, ApplicationKeys, DeviceKey, IvIndexState, MeshDatastore, NetworkKeys, NodeKeys,
    SecurityState, StorageError, UnicastAddr,
};
use async_trait::async_trait;
use dashmap::DashMap;
use mesh_crypto::SeqAuth;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory [`MeshDatastore`]. "Durable" only for the process lifetime;
/// production gateways use [`crate::FileDatastore`].
pub struct MemoryDatastore {
    keys: NodeKeys,
    device_keys: DashMap<UnicastAddr, DeviceKey>,
    state: Mutex<SecurityState>,
}

impl MemoryDatastore {
    /// Create a store for a provisioned node at the given IV Index
    pub fn new(keys: NodeKeys, iv_index: u32) -> Self {
        Self {
            keys,
            device_keys: DashMap::new(),
            state: Mutex::new(SecurityState::new(iv_index)),
        }
    }

    /// Register a peer's device key (provisioning-time plumbing)
    pub fn add_device_key(&self, peer: UnicastAddr, key: DeviceKey) {
        debug!(%peer, "registered device key");
        self.device_keys.insert(peer, key);
    }
}

#[async_trait]
impl MeshDatastore for MemoryDatastore {
    async fn seq(&self) -> Result<u32, StorageError> {
        Ok(self.state.lock().await.seq)
    }

    async fn next_seq(&self) -> Result<u32, StorageError> {
        let mut state = self.state.lock().await;
        let seq = state.reserve_seq()?;
        debug!(seq, "reserved sequence number");
        Ok(seq)
    }

    async fn iv_state(&self) -> Result<IvIndexState, StorageError> {
        Ok(self.state.lock().await.iv_index_state())
    }

    async fn begin_iv_index_update(&self, new_iv_index: u32) -> Result<(), StorageError> {
        self.state.lock().await.begin_iv_update(new_iv_index, now_ms())
    }

    async fn finish_iv_index_update(&self) -> Result<(), StorageError> {
        self.state.lock().await.finish_iv_update(now_ms())
    }

    async fn network_keys(&self) -> Result<NetworkKeys, StorageError> {
        Ok(self.keys.network)
    }

    async fn application_keys(&self) -> Result<ApplicationKeys, StorageError> {
        Ok(self.keys.application)
    }

    async fn device_key(&self, peer: UnicastAddr) -> Result<Option<DeviceKey>, StorageError> {
        Ok(self.device_keys.get(&peer).map(|k| *k))
    }

    async fn unicast_addr(&self) -> Result<UnicastAddr, StorageError> {
        Ok(self.keys.unicast)
    }

    async fn check_replay(&self, src: UnicastAddr, seq_auth: SeqAuth) -> Result<(), StorageError> {
        self.state.lock().await.check_replay(src, seq_auth)
    }
}
