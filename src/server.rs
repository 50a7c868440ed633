//! Listener loop and the process-wide shared state (session counter and
//! session-ID generator).

use std::sync::Arc;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::engine::SessionEngine;
use crate::utils::Logger;

/// Counters shared by all sessions; injected into each engine instance.
pub struct Shared {
    sessions: Mutex<u64>,
    next_id: Mutex<u64>,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(0),
            next_id: Mutex::new(0),
        }
    }

    /// Bumps the concurrent-session count; returns the new value.
    pub fn add_session(&self) -> u64 {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        *sessions += 1;
        *sessions
    }

    /// Drops the concurrent-session count; never goes below zero.
    pub fn remove_session(&self) -> u64 {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        *sessions = sessions.saturating_sub(1);
        *sessions
    }

    /// Time-based + sequential session token, collision-free within the
    /// process lifetime; the sequence wraps at its ceiling.
    pub fn session_id(&self) -> String {
        let mut next_id = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
        if *next_id == u64::MAX {
            *next_id = 0;
        }
        *next_id += 1;
        let ticks = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{:X}{:X}", ticks, *next_id)
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Server {
    cfg: Arc<Config>,
    shared: Arc<Shared>,
    logger: Arc<Logger>,
}

impl Server {
    pub fn new(cfg: Config) -> Result<Self> {
        let logger = Logger::new(cfg.log_dir.clone(), cfg.verbose)?;
        Ok(Self {
            cfg: Arc::new(cfg),
            shared: Arc::new(Shared::new()),
            logger: Arc::new(logger),
        })
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Binds the configured address and serves until the process dies.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr = format!("{}:{}", self.cfg.listen_address, self.cfg.listen_port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        self.logger
            .message(&format!("Listening for connections on {}", addr))
            .await;
        self.serve(listener).await
    }

    /// Accept loop: one spawned engine per connection.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let engine = SessionEngine::new(
                        self.cfg.clone(),
                        self.shared.clone(),
                        self.logger.clone(),
                        stream,
                        peer,
                    );
                    tokio::spawn(engine.run());
                }
                Err(e) => {
                    self.logger.message(&format!("Accept error: {}", e)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_count_round_trip() {
        let shared = Shared::new();
        assert_eq!(shared.add_session(), 1);
        assert_eq!(shared.add_session(), 2);
        assert_eq!(shared.remove_session(), 1);
        assert_eq!(shared.remove_session(), 0);
        assert_eq!(shared.remove_session(), 0);
    }

    #[test]
    fn session_ids_are_unique() {
        let shared = Shared::new();
        let a = shared.session_id();
        let b = shared.session_id();
        assert_ne!(a, b);
    }
}
