// src/core/pool/mod.rs

//! The SSH connection pool (C1): reusable keyed sessions, idle eviction,
//! and a concurrency cap. The sweep loop is driven by `tokio::time::interval`
//! and advisory lifecycle events are broadcast over a channel for anything
//! downstream that wants to observe pool state changes.

mod entry;

pub use entry::ConnectionEntry;

use crate::core::errors::{OpsError, OpsResult};
use crate::core::metrics;
use crate::core::ssh::{Connector, RealConnector};
use crate::core::types::Host;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

const DEFAULT_MAX_CONNECTIONS: usize = 50;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Advisory lifecycle events. Correctness never depends on a subscriber
/// actually receiving these; they exist for logging/metrics hooks.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    Connected(String),
    Closed(String),
    Error(String, String),
}

pub struct PoolConfig {
    pub max_connections: usize,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Exclusive owner of every `ConnectionEntry`. Callers never mutate an
/// entry directly; they acquire, use the session for one command, and
/// release.
pub struct ConnectionPool {
    entries: DashMap<String, Arc<Mutex<ConnectionEntry>>>,
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    events: broadcast::Sender<PoolEvent>,
    shutdown: broadcast::Sender<()>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Arc<Self> {
        Self::with_connector(config, Arc::new(RealConnector))
    }

    /// Constructs a pool against a custom `Connector`, used by tests to
    /// avoid dialing a real SSH server.
    pub fn with_connector(config: PoolConfig, connector: Arc<dyn Connector>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let (shutdown, _) = broadcast::channel(1);
        Arc::new(Self {
            entries: DashMap::new(),
            config,
            connector,
            events,
            shutdown,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    /// Spawns the idle-eviction sweep. Call `close_all` to stop it.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let pool = self.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => pool.sweep_idle().await,
                    _ = shutdown_rx.recv() => {
                        debug!("connection pool sweeper stopping");
                        break;
                    }
                }
            }
        })
    }

    async fn sweep_idle(&self) {
        let idle_timeout = self.config.idle_timeout;
        let mut evicted = Vec::new();
        for item in self.entries.iter() {
            let key = item.key().clone();
            let entry = item.value().lock().await;
            if !entry.in_use && entry.last_used.elapsed() > idle_timeout {
                evicted.push(key);
            }
        }
        for key in evicted {
            self.entries.remove(&key);
            info!(host = %key, "evicted idle connection");
            let _ = self.events.send(PoolEvent::Closed(key));
        }
        metrics::POOL_SIZE.set(self.entries.len() as f64);
    }

    /// Acquires a session for `host`, reusing an idle entry when one
    /// exists, otherwise dialing a new one subject to `max_connections`.
    pub async fn acquire(&self, host: &Host) -> OpsResult<Arc<Mutex<ConnectionEntry>>> {
        let key = host.key();

        if let Some(existing) = self.entries.get(&key) {
            let mut entry = existing.lock().await;
            if !entry.in_use {
                entry.in_use = true;
                entry.last_used = Instant::now();
                drop(entry);
                return Ok(existing.clone());
            }
        }

        if self.entries.len() >= self.config.max_connections {
            return Err(OpsError::PoolExhausted(key));
        }

        let session = self.connector.connect(host).await.inspect_err(|e| {
            let _ = self
                .events
                .send(PoolEvent::Error(key.clone(), e.to_string()));
        })?;
        let entry = Arc::new(Mutex::new(ConnectionEntry::new(key.clone(), session)));
        self.entries.insert(key.clone(), entry.clone());
        metrics::POOL_SIZE.set(self.entries.len() as f64);
        let _ = self.events.send(PoolEvent::Connected(key));
        Ok(entry)
    }

    /// Releases an entry back to the pool, making it reusable again.
    pub async fn release(&self, host: &str) {
        let key = host.to_lowercase();
        if let Some(entry) = self.entries.get(&key) {
            let mut guard = entry.lock().await;
            guard.in_use = false;
            guard.last_used = Instant::now();
        }
    }

    /// Explicitly closes a single host's entry.
    pub async fn close(&self, host: &str) {
        let key = host.to_lowercase();
        if self.entries.remove(&key).is_some() {
            let _ = self.events.send(PoolEvent::Closed(key));
            metrics::POOL_SIZE.set(self.entries.len() as f64);
        }
    }

    /// Tears down every entry and stops the sweep.
    pub async fn close_all(&self) {
        let _ = self.shutdown.send(());
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        self.entries.clear();
        for key in keys {
            let _ = self.events.send(PoolEvent::Closed(key));
        }
        metrics::POOL_SIZE.set(0.0);
        warn!("connection pool closed");
    }

    pub fn status(&self) -> PoolStatus {
        let in_use = self
            .entries
            .iter()
            .filter(|e| e.try_lock().map(|g| g.in_use).unwrap_or(false))
            .count();
        PoolStatus {
            size: self.entries.len(),
            in_use,
            max_connections: self.config.max_connections,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub size: usize,
    pub in_use: usize,
    pub max_connections: usize,
}
