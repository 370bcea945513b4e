//! File-backed datastore: JSON snapshot with atomic replace.
//!
//! Every mutation rewrites the snapshot to a sibling temp file and renames
//! it over the live one before the call returns. Rename is atomic on the
//! filesystems this gateway targets, so a crash leaves either the old or the
//! new state, never a torn one.

use crate::{
    now_ms, ApplicationKeys, DeviceKey, IvIndexState, MeshDatastore, NetworkKeys, NodeKeys,
    SecurityState, StorageError, UnicastAddr,
};
use async_trait::async_trait;
use mesh_crypto::SeqAuth;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// On-disk snapshot. Device keys are keyed by unicast address; key bytes are
/// stored raw — the snapshot file carries secrets and must live on storage
/// with appropriate permissions (same assumption BlueZ meshd makes).
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    state: SecurityState,
    device_keys: HashMap<u16, [u8; 16]>,
}

/// File-backed [`MeshDatastore`]
pub struct FileDatastore {
    path: PathBuf,
    keys: NodeKeys,
    // One lock covers state *and* snapshot write: reserve-and-persist must
    // be atomic with respect to other mutators.
    inner: Mutex<Snapshot>,
}

impl FileDatastore {
    /// Open or create the snapshot at `path` for a provisioned node.
    ///
    /// `iv_index` seeds a fresh store and is ignored when a snapshot
    /// already exists (the persisted IV state wins).
    pub async fn open(
        path: impl AsRef<Path>,
        keys: NodeKeys,
        iv_index: u32,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(raw) => {
                let snapshot: Snapshot = serde_json::from_slice(&raw)?;
                info!(path = %path.display(), seq = snapshot.state.seq, "loaded mesh state");
                snapshot
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), iv_index, "creating fresh mesh state");
                let snapshot = Snapshot {
                    state: SecurityState::new(iv_index),
                    device_keys: HashMap::new(),
                };
                Self::write_snapshot(&path, &snapshot).await?;
                snapshot
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            keys,
            inner: Mutex::new(snapshot),
        })
    }

    /// Register a peer's device key, durably
    pub async fn add_device_key(
        &self,
        peer: UnicastAddr,
        key: DeviceKey,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner.device_keys.insert(peer.0, (key.0).0);
        Self::write_snapshot(&self.path, &inner).await
    }

    async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StorageError> {
        let raw = serde_json::to_vec_pretty(snapshot)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &raw).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), bytes = raw.len(), "persisted mesh state");
        Ok(())
    }

    /// Run a state mutation and persist it before releasing the lock.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut SecurityState) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut inner = self.inner.lock().await;
        let result = op(&mut inner.state)?;
        Self::write_snapshot(&self.path, &inner).await?;
        Ok(result)
    }
}

#[async_trait]
impl MeshDatastore for FileDatastore {
    async fn seq(&self) -> Result<u32, StorageError> {
        Ok(self.inner.lock().await.state.seq)
    }

    async fn next_seq(&self) -> Result<u32, StorageError> {
        self.mutate(|state| state.reserve_seq()).await
    }

    async fn iv_state(&self) -> Result<IvIndexState, StorageError> {
        Ok(self.inner.lock().await.state.iv_index_state())
    }

    async fn begin_iv_index_update(&self, new_iv_index: u32) -> Result<(), StorageError> {
        self.mutate(|state| state.begin_iv_update(new_iv_index, now_ms()))
            .await
    }

    async fn finish_iv_index_update(&self) -> Result<(), StorageError> {
        self.mutate(|state| state.finish_iv_update(now_ms())).await
    }

    async fn network_keys(&self) -> Result<NetworkKeys, StorageError> {
        Ok(self.keys.network)
    }

    async fn application_keys(&self) -> Result<ApplicationKeys, StorageError> {
        Ok(self.keys.application)
    }

    async fn device_key(&self, peer: UnicastAddr) -> Result<Option<DeviceKey>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .device_keys
            .get(&peer.0)
            .map(|raw| DeviceKey(mesh_crypto::Key(*raw))))
    }

    async fn unicast_addr(&self) -> Result<UnicastAddr, StorageError> {
        Ok(self.keys.unicast)
    }

    async fn check_replay(&self, src: UnicastAddr, seq_auth: SeqAuth) -> Result<(), StorageError> {
        self.mutate(|state| state.check_replay(src, seq_auth)).await
    }
}
