use thiserror::Error;
use uuid::Uuid;

/// Unified error types for the client.
///
/// Three families, per the recovery strategy applied to each:
/// - transport errors are retried automatically by the reconnect loop and only
///   surfaced to the caller of the specific request;
/// - server errors are surfaced verbatim so the UI can show them;
/// - validation errors never reach the network at all.
#[derive(Error, Debug)]
pub enum ClientError {
    // --- Transport ---
    #[error("not connected to the game server")]
    NotConnected,

    #[error("request {id} timed out")]
    RequestTimeout { id: Uuid },

    #[error("connection closed while request was pending")]
    ConnectionClosed,

    // --- Protocol ---
    #[error("server rejected request: {0}")]
    Server(String),

    #[error("malformed server envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    // --- Validation (local, never sent) ---
    #[error("turn plan is locked")]
    PlanLocked,

    #[error("no active game in the current snapshot")]
    NoActiveGame,

    #[error("local seat is not assigned in the current game")]
    SeatUnassigned,
}

impl ClientError {
    /// True for errors the reconnect loop recovers from on its own. Callers
    /// holding an optimistic lock (e.g. a sent commit) release it and retry.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::NotConnected
                | ClientError::RequestTimeout { .. }
                | ClientError::ConnectionClosed
        )
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
