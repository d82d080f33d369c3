pub mod client;
pub mod demux;
pub mod errors;
pub mod url;

/// Default RTMP port when the URL carries none.
pub const DEFAULT_RTMP_PORT: u16 = 1935;
