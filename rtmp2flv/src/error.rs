use rtmp2flv_media::flv::errors::FlvMuxerError;
use rtmp2flv_media::RtmpClientError;
use thiserror::Error;

/// Failure to turn the `rtmp` query value into a dialable address.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The value is not a URL. Displays the parser message only.
    #[error("{0}")]
    Malformed(#[from] url::ParseError),

    /// The redirector produced no usable `Location`.
    #[error("Invalid url")]
    Unresolved,
}

/// Why a relay session ended once streaming had started.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("source error: {0}")]
    Source(#[from] RtmpClientError),

    #[error("client disconnected")]
    SinkClosed,

    #[error("flv mux error: {0}")]
    Mux(#[from] FlvMuxerError),
}

pub type RelayResult<T> = Result<T, RelayError>;
