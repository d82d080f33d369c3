// Output side of a relay: FLV tags assembled by `FlvPacketSink`, handed one
// chunk at a time to a `ChunkSink` that feeds the HTTP response body.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use rtmp2flv_media::flv::muxer::FlvMuxer;
use rtmp2flv_media::MediaPacket;
use tokio::sync::mpsc;

use crate::error::{RelayError, RelayResult};

/// Body chunks sent to the HTTP layer.
pub type BodyChunk = Result<Bytes, io::Error>;

/// Streaming response body of unknown length.
#[async_trait]
pub trait ChunkSink: Send {
    /// Hands `chunk` to the transport. Resolves once the transport accepted
    /// it; fails once the client is gone.
    async fn write_chunk(&mut self, chunk: Bytes) -> RelayResult<()>;
}

/// `ChunkSink` over a bounded channel whose receiver is the response body.
pub struct ChannelSink {
    tx: mpsc::Sender<BodyChunk>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: mpsc::Sender<BodyChunk>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> RelayResult<()> {
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| RelayError::SinkClosed)
    }
}

/// FLV container output.
#[async_trait]
pub trait FlvSink: Send {
    /// Writes the file header. Later calls are no-ops.
    async fn write_file_header(&mut self) -> RelayResult<()>;

    /// Writes one packet as one tag, header first if still pending.
    async fn write_packet(&mut self, packet: MediaPacket) -> RelayResult<()>;
}

/// `FlvSink` that muxes into a `ChunkSink`, one chunk per header or tag.
pub struct FlvPacketSink<S> {
    muxer: FlvMuxer,
    sink: S,
}

impl<S: ChunkSink> FlvPacketSink<S> {
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            muxer: FlvMuxer::new(),
            sink,
        }
    }

    async fn flush_muxer(&mut self) -> RelayResult<()> {
        let chunk = self.muxer.extract_current_bytes().freeze();
        self.sink.write_chunk(chunk).await
    }
}

#[async_trait]
impl<S: ChunkSink> FlvSink for FlvPacketSink<S> {
    async fn write_file_header(&mut self) -> RelayResult<()> {
        if self.muxer.header_written() {
            return Ok(());
        }
        // stream contents are unknown up front, so advertise both
        self.muxer.write_flv_header(true, true)?;
        self.muxer.write_previous_tag_size(0)?;
        self.flush_muxer().await
    }

    async fn write_packet(&mut self, packet: MediaPacket) -> RelayResult<()> {
        self.write_file_header().await?;

        self.muxer
            .write_flv_tag(packet.kind.tag_type(), packet.timestamp, &packet.data)?;
        self.flush_muxer().await
    }
}
