use bytes::{BufMut, BytesMut};

use super::errors::{FlvMuxerError, MuxerErrorValue};

/// Size of an FLV tag header; added to the body length for `PreviousTagSize`.
pub const HEADER_LENGTH: u32 = 11;

/// Size of the FLV file header.
pub const FILE_HEADER_LENGTH: u32 = 9;

const MAX_TAG_DATA_SIZE: usize = 0x00FF_FFFF;

const FLAG_AUDIO: u8 = 0x04;
const FLAG_VIDEO: u8 = 0x01;

/// Writes FLV structures into an in-memory buffer.
///
/// Callers assemble one unit (file header, or one tag), then take the bytes
/// with [`FlvMuxer::extract_current_bytes`] and hand them to the transport.
#[derive(Debug, Default)]
pub struct FlvMuxer {
    writer: BytesMut,
    header_written: bool,
}

impl FlvMuxer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Writes the 9-byte file header. Fails if called a second time.
    pub fn write_flv_header(&mut self, has_audio: bool, has_video: bool) -> Result<(), FlvMuxerError> {
        if self.header_written {
            return Err(MuxerErrorValue::HeaderAlreadyWritten.into());
        }

        let mut flags = 0u8;
        if has_audio {
            flags |= FLAG_AUDIO;
        }
        if has_video {
            flags |= FLAG_VIDEO;
        }

        self.writer.put_slice(b"FLV");
        self.writer.put_u8(1);
        self.writer.put_u8(flags);
        self.writer.put_u32(FILE_HEADER_LENGTH);
        self.header_written = true;

        Ok(())
    }

    pub fn write_previous_tag_size(&mut self, size: u32) -> Result<(), FlvMuxerError> {
        self.writer.put_u32(size);
        Ok(())
    }

    pub fn write_flv_tag_header(
        &mut self,
        tag_type: u8,
        data_size: u32,
        timestamp: u32,
    ) -> Result<(), FlvMuxerError> {
        if data_size as usize > MAX_TAG_DATA_SIZE {
            return Err(MuxerErrorValue::TagTooLarge(data_size as usize).into());
        }

        self.writer.put_u8(tag_type);
        self.writer.put_uint(u64::from(data_size), 3);
        // lower 24 bits, then the extended high byte
        self.writer.put_uint(u64::from(timestamp & 0x00FF_FFFF), 3);
        self.writer.put_u8((timestamp >> 24) as u8);
        // stream id, always 0
        self.writer.put_uint(0, 3);

        Ok(())
    }

    pub fn write_flv_tag_body(&mut self, body: &[u8]) -> Result<(), FlvMuxerError> {
        if body.len() > MAX_TAG_DATA_SIZE {
            return Err(MuxerErrorValue::TagTooLarge(body.len()).into());
        }
        self.writer.put_slice(body);
        Ok(())
    }

    /// Header, body and trailing `PreviousTagSize` of one tag.
    pub fn write_flv_tag(&mut self, tag_type: u8, timestamp: u32, body: &[u8]) -> Result<(), FlvMuxerError> {
        if body.len() > MAX_TAG_DATA_SIZE {
            return Err(MuxerErrorValue::TagTooLarge(body.len()).into());
        }
        let data_len = body.len() as u32;

        self.write_flv_tag_header(tag_type, data_len, timestamp)?;
        self.write_flv_tag_body(body)?;
        self.write_previous_tag_size(data_len + HEADER_LENGTH)
    }

    /// Takes everything written so far, leaving the buffer empty.
    pub fn extract_current_bytes(&mut self) -> BytesMut {
        self.writer.split()
    }
}
