//! Bluetooth Mesh GATT proxy gateway.
//!
//! Boots the security datastore, the access router, and the gateway event
//! loop. The GATT transport (BlueZ/D-Bus) attaches through
//! [`gateway::Gateway::open_connection`]; until a transport is wired up the
//! binary serves as the integration shell for the library crates.

mod config;
mod gateway;
mod logging;
mod models;

use anyhow::Result;
use clap::Parser;
use config::GatewayConfig;
use gateway::{Gateway, GatewayEvent};
use mesh_access::Model;
use mesh_storage::{FileDatastore, MemoryDatastore, MeshDatastore};
use models::{GenericLevelClient, GenericOnOffClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "btmesh-gateway", about = "Bluetooth Mesh GATT proxy gateway")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the persisted state file from the config
    #[arg(long)]
    state_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");
    let args = Args::parse();

    let mut config = GatewayConfig::load(args.config.as_ref())?;
    if let Some(path) = args.state_file {
        config.state_file = Some(path);
    }
    let keys = config.node_keys()?;

    let datastore: Arc<dyn MeshDatastore> = match &config.state_file {
        Some(path) => Arc::new(FileDatastore::open(path, keys, config.iv_index).await?),
        None => Arc::new(MemoryDatastore::new(keys, config.iv_index)),
    };

    let models: Vec<Box<dyn Model>> = vec![
        Box::new(GenericOnOffClient),
        Box::new(GenericLevelClient),
    ];
    let (_gateway, mut events) = Gateway::new(datastore, models, config.att_mtu)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                GatewayEvent::NetworkPdu(pdu) => {
                    info!(len = pdu.len(), "network pdu ready for decryption")
                }
                GatewayEvent::Beacon {
                    iv_index,
                    iv_update,
                    key_refresh,
                } => info!(iv_index, iv_update, key_refresh, "beacon applied"),
                GatewayEvent::Update(update) => {
                    info!(src = update.src, model = update.model, state = %update.state, "state update")
                }
            }
        }
    });

    info!("gateway ready, waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
