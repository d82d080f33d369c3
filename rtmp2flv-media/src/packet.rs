use bytes::Bytes;

/// FLV tag type for audio data
pub const TAG_TYPE_AUDIO: u8 = 8;
/// FLV tag type for video data
pub const TAG_TYPE_VIDEO: u8 = 9;
/// FLV tag type for AMF0 script data
pub const TAG_TYPE_SCRIPT_DATA_AMF: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Audio,
    Video,
    Metadata,
}

impl PacketKind {
    #[must_use]
    pub const fn tag_type(self) -> u8 {
        match self {
            Self::Audio => TAG_TYPE_AUDIO,
            Self::Video => TAG_TYPE_VIDEO,
            Self::Metadata => TAG_TYPE_SCRIPT_DATA_AMF,
        }
    }
}

/// One decoded unit received from an RTMP session.
///
/// `data` is the FLV tag body as-is: codec headers included for audio and
/// video, an AMF0 `onMetaData` script body for metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPacket {
    pub kind: PacketKind,
    /// Milliseconds, as carried on the RTMP message.
    pub timestamp: u32,
    pub data: Bytes,
}

impl MediaPacket {
    #[must_use]
    pub fn audio(timestamp: u32, data: Bytes) -> Self {
        Self {
            kind: PacketKind::Audio,
            timestamp,
            data,
        }
    }

    #[must_use]
    pub fn video(timestamp: u32, data: Bytes) -> Self {
        Self {
            kind: PacketKind::Video,
            timestamp,
            data,
        }
    }

    #[must_use]
    pub fn metadata(timestamp: u32, data: Bytes) -> Self {
        Self {
            kind: PacketKind::Metadata,
            timestamp,
            data,
        }
    }
}
