//! Upload transport boundary toward the coordinator

pub mod http;

pub use http::HttpUploader;

use async_trait::async_trait;
use thiserror::Error;

/// Associates a replayed frame with the trigger event it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTag {
    pub time: u64,
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The send did not complete within the configured deadline.
    #[error("upload timed out")]
    Timeout,
    #[error("coordinator answered {0}")]
    Status(u16),
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Sends one opaque frame payload to the coordinator. `event` tags a
/// replayed frame with the trigger timestamp it documents.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send_frame(&self, payload: &[u8], event: Option<EventTag>)
        -> Result<(), TransportError>;
}
