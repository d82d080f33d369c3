// Media tap on the inbound RTMP chunk stream
//
// The client session parses the same bytes for negotiation, but it reduces
// script data to a fixed set of known metadata fields. This decoder keeps
// audio, video and onMetaData messages as the server sent them, bodies and
// timestamps untouched, in arrival order.

use bytes::Bytes;
use rml_rtmp::chunk_io::ChunkDeserializer;
use rml_rtmp::messages::MessagePayload;
use tracing::trace;

use super::errors::RtmpClientError;
use crate::packet::{MediaPacket, TAG_TYPE_AUDIO, TAG_TYPE_SCRIPT_DATA_AMF, TAG_TYPE_VIDEO};

/// RTMP protocol control message: Set Chunk Size.
const MESSAGE_TYPE_SET_CHUNK_SIZE: u8 = 1;
const AMF0_STRING_MARKER: u8 = 0x02;
const SET_DATA_FRAME: &[u8] = b"@setDataFrame";
const ON_METADATA: &[u8] = b"onMetaData";

pub struct MediaDemuxer {
    deserializer: ChunkDeserializer,
}

impl Default for MediaDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaDemuxer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            deserializer: ChunkDeserializer::new(),
        }
    }

    /// Feeds raw socket bytes; returns the media messages they complete.
    pub fn demux(&mut self, bytes: &[u8]) -> Result<Vec<MediaPacket>, RtmpClientError> {
        let mut packets = Vec::new();
        let mut input = bytes;

        while let Some(payload) = self
            .deserializer
            .get_next_message(input)
            .map_err(|e| RtmpClientError::Chunk(format!("{e:?}")))?
        {
            input = &[];
            if let Some(packet) = self.handle_message(payload)? {
                packets.push(packet);
            }
        }

        Ok(packets)
    }

    fn handle_message(
        &mut self,
        payload: MessagePayload,
    ) -> Result<Option<MediaPacket>, RtmpClientError> {
        let timestamp = payload.timestamp.value;

        match payload.type_id {
            TAG_TYPE_AUDIO => Ok(Some(MediaPacket::audio(timestamp, payload.data))),
            TAG_TYPE_VIDEO => Ok(Some(MediaPacket::video(timestamp, payload.data))),
            TAG_TYPE_SCRIPT_DATA_AMF => match on_metadata_body(payload.data) {
                Some(body) => Ok(Some(MediaPacket::metadata(timestamp, body))),
                None => {
                    trace!(timestamp, "skipping script data other than onMetaData");
                    Ok(None)
                }
            },
            MESSAGE_TYPE_SET_CHUNK_SIZE => {
                self.follow_chunk_size(&payload.data)?;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn follow_chunk_size(&mut self, data: &[u8]) -> Result<(), RtmpClientError> {
        let raw: [u8; 4] = data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| RtmpClientError::Chunk("short set chunk size message".to_string()))?;
        // top bit is reserved
        let size = u32::from_be_bytes(raw) & 0x7FFF_FFFF;

        self.deserializer
            .set_max_chunk_size(size as usize)
            .map_err(|e| RtmpClientError::Chunk(format!("{e:?}")))
    }
}

/// The `onMetaData` body of a data message with any `@setDataFrame` wrapper
/// removed. `None` for other script data.
fn on_metadata_body(data: Bytes) -> Option<Bytes> {
    let (name, consumed) = amf0_string(&data)?;
    if name == SET_DATA_FRAME {
        on_metadata_body(data.slice(consumed..))
    } else if name == ON_METADATA {
        Some(data)
    } else {
        None
    }
}

/// Leading AMF0 string of `data` and the number of bytes it occupies.
fn amf0_string(data: &[u8]) -> Option<(&[u8], usize)> {
    let (&marker, rest) = data.split_first()?;
    if marker != AMF0_STRING_MARKER {
        return None;
    }
    let len = usize::from(u16::from_be_bytes([*rest.first()?, *rest.get(1)?]));
    let name = rest.get(2..2 + len)?;
    Some((name, 3 + len))
}
