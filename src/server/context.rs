// src/server/context.rs

//! The assembled application context: every collaborator wired together,
//! ready for the Orchestrator and the background tasks the spawner starts.
//! This struct is the composition root, built once by `initialization::setup`.

use crate::core::alerts::AlertPipeline;
use crate::core::autoheal::AutoHealExecutor;
use crate::core::deploy::DeployManager;
use crate::core::orchestrator::Orchestrator;
use crate::core::pool::ConnectionPool;
use crate::core::ssh::executor::{Inventory, RemoteExecutor};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything a running opsd process needs, composed once at startup and
/// shared across the background tasks the spawner starts.
pub struct ServerContext {
    pub pool: Arc<ConnectionPool>,
    pub inventory: Arc<Inventory>,
    pub executor: Arc<RemoteExecutor>,
    pub autoheal: Arc<AutoHealExecutor>,
    pub deploy: Arc<DeployManager>,
    pub alerts: Arc<Mutex<AlertPipeline>>,
    pub orchestrator: Arc<Orchestrator>,
    pub metrics_port: Option<u16>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl ServerContext {
    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}
