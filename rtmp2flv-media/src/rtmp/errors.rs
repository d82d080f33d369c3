use std::io;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RtmpClientError {
    #[error("invalid rtmp url: {0}")]
    InvalidUrl(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("handshake error: {0}")]
    Handshake(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("connection rejected: {0}")]
    Rejected(String),
    #[error("chunk decode error: {0}")]
    Chunk(String),
    #[error("dial timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed by peer")]
    ConnectionClosed,
}
