// src/core/pool/entry.rs

//! The pool's internal per-host record. Owned exclusively by
//! `ConnectionPool`; callers only ever see it through a borrowed
//! `Arc<Mutex<ConnectionEntry>>` for the duration of one command.

use crate::core::ssh::session::ExecSession;
use std::fmt;
use std::time::Instant;

pub struct ConnectionEntry {
    pub host: String,
    pub session: Box<dyn ExecSession>,
    pub created_at: Instant,
    pub last_used: Instant,
    pub in_use: bool,
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("host", &self.host)
            .field("created_at", &self.created_at)
            .field("last_used", &self.last_used)
            .field("in_use", &self.in_use)
            .finish()
    }
}

impl ConnectionEntry {
    pub fn new(host: String, session: Box<dyn ExecSession>) -> Self {
        let now = Instant::now();
        Self {
            host,
            session,
            created_at: now,
            last_used: now,
            in_use: true,
        }
    }
}
