pub mod errors;
pub mod muxer;
