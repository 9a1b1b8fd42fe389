//! Cache/session client: one long-lived Redis connection for the whole process.
//!
//! `main` connects once at startup, hands clones of the handle to dependents,
//! and disconnects once after the HTTP server has drained. There is no pool
//! and no reconnect logic; a dropped connection surfaces as `CacheError`.

pub mod session;

use redis::aio::MultiplexedConnection;
use thiserror::Error;
use tracing::info;

pub use session::{RedisSessionStore, SessionStore};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt session entry for key '{0}'")]
    CorruptSession(String),
}

/// Owner of the process-wide Redis connection.
pub struct CacheClient {
    conn: MultiplexedConnection,
}

impl CacheClient {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        info!("Connecting to Redis...");
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis connection established");
        Ok(Self { conn })
    }

    /// Raw connection handle. Clones share the same underlying socket.
    pub fn handle(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    /// Closes the connection. Outstanding clones held elsewhere keep the
    /// socket alive until they are dropped too, so call this after the
    /// server has shut down.
    pub fn disconnect(self) {
        drop(self.conn);
        info!("Redis connection closed");
    }
}
