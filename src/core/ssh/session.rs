// src/core/ssh/session.rs

//! A thin wrapper around a single `russh` SSH session: connect, run one
//! command to completion, and collect its exit code/stdout/stderr. Connect,
//! write, and read each get their own bounded timeout rather than one
//! global one.

use crate::core::errors::{OpsError, OpsResult};
use crate::core::types::Host;
use russh::client::{self, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

struct NoopHandler;

impl client::Handler for NoopHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Fleet hosts are addressed by an operator-provided inventory, not
        // discovered, so there is no known-hosts file to check against
        // here; callers that need strict host-key pinning should wrap this
        // with their own `Handler`.
        Ok(true)
    }
}

/// What the connection pool needs from a live session: run one command to
/// completion, and report whether the transport is still alive. Abstracted
/// behind a trait so the pool can be exercised in tests without dialing a
/// real SSH server.
#[async_trait::async_trait]
pub trait ExecSession: Send {
    async fn exec(&mut self, command: &str) -> OpsResult<(Option<i32>, String, String)>;
    fn is_closed(&self) -> bool;
}

/// One live SSH session to a host, used for exactly one command at a time
/// by the pool's exclusive-ownership contract.
pub struct SshSession {
    handle: Handle<NoopHandler>,
}

#[async_trait::async_trait]
impl ExecSession for SshSession {
    async fn exec(&mut self, command: &str) -> OpsResult<(Option<i32>, String, String)> {
        SshSession::exec(self, command).await
    }

    fn is_closed(&self) -> bool {
        SshSession::is_closed(self)
    }
}

impl SshSession {
    /// Dials and authenticates a new session, bounded by `CONNECT_TIMEOUT`.
    pub async fn connect(host: &Host) -> OpsResult<Self> {
        let config = Arc::new(client::Config::default());
        let addr = (host.address.as_str(), host.port);
        let handle = timeout(CONNECT_TIMEOUT, client::connect(config, addr, NoopHandler))
            .await
            .map_err(|_| OpsError::Timeout(format!("connect to {}", host.id)))?
            .map_err(|e| OpsError::Ssh(e.to_string()))?;

        let mut session = Self { handle };
        session.authenticate(host).await?;
        Ok(session)
    }

    async fn authenticate(&mut self, host: &Host) -> OpsResult<()> {
        let key_pair = russh::keys::decode_secret_key(&host.private_key, None)
            .map_err(|e| OpsError::Ssh(format!("invalid private key for {}: {e}", host.id)))?;
        let auth = self
            .handle
            .authenticate_publickey(
                host.user.clone(),
                PrivateKeyWithHashAlg::new(Arc::new(key_pair), None),
            )
            .await
            .map_err(|e| OpsError::Ssh(e.to_string()))?;
        if !auth.success() {
            return Err(OpsError::Ssh(format!(
                "authentication rejected for {}@{}",
                host.user, host.id
            )));
        }
        Ok(())
    }

    /// Runs `command` to completion and collects exit status plus stdout
    /// and stderr. The caller is responsible for applying an overall exec
    /// per-exec timeout around this call.
    pub async fn exec(&mut self, command: &str) -> OpsResult<(Option<i32>, String, String)> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| OpsError::Ssh(e.to_string()))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| OpsError::Ssh(e.to_string()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        loop {
            let Some(msg) = channel.wait().await else {
                break;
            };
            match msg {
                russh::ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                russh::ChannelMsg::ExtendedData { data, ext: 1 } => {
                    stderr.extend_from_slice(&data);
                }
                russh::ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = Some(exit_status as i32);
                }
                russh::ChannelMsg::Eof | russh::ChannelMsg::Close => break,
                _ => {}
            }
        }

        Ok((
            exit_code,
            String::from_utf8_lossy(&stdout).into_owned(),
            String::from_utf8_lossy(&stderr).into_owned(),
        ))
    }

    /// Whether the underlying transport is still alive.
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}
