// rtmp2flv - HTTP-FLV relay for remote RTMP streams
//
// Request flow:
//   GET /flv -> gate -> resolver -> source (RTMP dial) -> relay loop
//   (RTMP packets -> FLV sink -> chunked HTTP body)
//
// Every request owns its own upstream connection; nothing is shared between
// requests except the read-only `Config`.

pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod relay;
pub mod resolver;
pub mod server;
pub mod sink;
pub mod source;

pub use config::Config;
pub use error::{RelayError, ResolveError};
pub use server::{create_router, serve, AppState};
