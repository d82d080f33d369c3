// rtmp2flv-media - protocol building blocks for the relay
//
// - packet  - decoded media unit handed from the RTMP side to the FLV side
// - flv/    - FLV container writer (file header, tags, previous tag sizes)
// - rtmp/   - outbound RTMP play client on top of rml_rtmp

pub mod flv;
pub mod packet;
pub mod rtmp;

pub use flv::muxer::FlvMuxer;
pub use packet::{MediaPacket, PacketKind};
pub use rtmp::client::{DialOptions, RtmpClient, RtmpConnection};
pub use rtmp::errors::RtmpClientError;
pub use rtmp::url::RtmpUrl;
