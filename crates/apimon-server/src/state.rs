//! Shared application state for the monitoring server.

use apimon_core::store::DbPool;
use tokio_util::sync::CancellationToken;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// SQLite connection pool.
    pub db: DbPool,
    /// Host address the server is bound to.
    pub bind_host: String,
    /// Port the server is listening on.
    pub bind_port: u16,
    /// Cancellation token shared with the in-process scheduler loop, so
    /// shutting down the server also stops the tick loop.
    pub cancel: CancellationToken,
}
