// src/core/ssh/mod.rs

//! SSH transport: a single-command session abstraction (`session`), the
//! connector used to dial new sessions (`Connector`), the fleet executor
//! (`executor`), and the command allow/deny policy (`policy`).

pub mod executor;
pub mod policy;
pub mod session;

use crate::core::errors::OpsResult;
use crate::core::types::Host;
use session::{ExecSession, SshSession};

/// Dials a new session for `host`. Implemented for real SSH via `russh`;
/// tests substitute a fake connector so the pool and executor can be
/// exercised without a live server.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &Host) -> OpsResult<Box<dyn ExecSession>>;
}

/// The production connector: dials a real SSH session via `russh`.
pub struct RealConnector;

#[async_trait::async_trait]
impl Connector for RealConnector {
    async fn connect(&self, host: &Host) -> OpsResult<Box<dyn ExecSession>> {
        let session = SshSession::connect(host).await?;
        Ok(Box::new(session))
    }
}
