// Outbound RTMP play client
//
// Drives rml_rtmp's sans-io handshake and client session over a tokio
// TcpStream: connect(app) -> play(stream) -> a sequence of media packets.
// Media is taken from the chunk stream by the demuxer; the session handles
// negotiation, control messages and acknowledgements.

use std::collections::VecDeque;
use std::time::Duration;

use rml_rtmp::handshake::{Handshake, HandshakeProcessResult, PeerType};
use rml_rtmp::sessions::{
    ClientSession, ClientSessionConfig, ClientSessionEvent, ClientSessionResult,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::demux::MediaDemuxer;
use super::errors::RtmpClientError;
use super::url::RtmpUrl;
use crate::packet::MediaPacket;

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    /// Bound on TCP connect, handshake and connect/play negotiation.
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct RtmpClient {
    options: DialOptions,
}

impl RtmpClient {
    #[must_use]
    pub fn new(options: DialOptions) -> Self {
        Self { options }
    }

    /// Dials `addr` and negotiates playback. The returned connection is ready
    /// for [`RtmpConnection::read_packet`].
    pub async fn dial(&self, addr: &str) -> Result<RtmpConnection, RtmpClientError> {
        let url = RtmpUrl::parse(addr)?;

        match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, RtmpConnection::establish(url))
                .await
                .map_err(|_| RtmpClientError::Timeout(limit))?,
            None => RtmpConnection::establish(url).await,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Connect,
    Play,
}

/// A playing RTMP connection. Dropping it closes the socket.
pub struct RtmpConnection {
    stream: TcpStream,
    session: ClientSession,
    demuxer: MediaDemuxer,
    pending: VecDeque<MediaPacket>,
    read_buf: Vec<u8>,
}

impl RtmpConnection {
    async fn establish(url: RtmpUrl) -> Result<Self, RtmpClientError> {
        let mut stream = TcpStream::connect((url.host.as_str(), url.port)).await?;
        stream.set_nodelay(true)?;

        let remaining = client_handshake(&mut stream).await?;
        debug!(host = %url.host, port = url.port, "rtmp handshake completed");

        let mut config = ClientSessionConfig::new();
        config.tc_url = Some(url.tc_url.clone());
        let (session, results) =
            ClientSession::new(config).map_err(|e| RtmpClientError::Session(format!("{e:?}")))?;

        let mut conn = Self {
            stream,
            session,
            demuxer: MediaDemuxer::new(),
            pending: VecDeque::new(),
            read_buf: vec![0; READ_BUFFER_SIZE],
        };
        conn.apply(results).await?;

        if !remaining.is_empty() {
            conn.feed(&remaining).await?;
        }

        let request = conn
            .session
            .request_connection(url.app.clone())
            .map_err(|e| RtmpClientError::Session(format!("{e:?}")))?;
        conn.apply(vec![request]).await?;
        conn.await_acceptance(Stage::Connect).await?;

        let request = conn
            .session
            .request_playback(url.stream.clone())
            .map_err(|e| RtmpClientError::Session(format!("{e:?}")))?;
        conn.apply(vec![request]).await?;
        conn.await_acceptance(Stage::Play).await?;

        debug!(app = %url.app, stream = %url.stream, "rtmp playback accepted");
        Ok(conn)
    }

    /// Next media packet in receipt order.
    ///
    /// Fails when the peer closes the connection, on socket errors and on
    /// protocol errors; the connection is unusable afterwards.
    pub async fn read_packet(&mut self) -> Result<MediaPacket, RtmpClientError> {
        loop {
            if let Some(packet) = self.pending.pop_front() {
                return Ok(packet);
            }
            for event in self.fill().await? {
                trace!(?event, "ignoring rtmp session event");
            }
        }
    }

    /// Shuts the socket down. Errors are irrelevant at this point.
    pub async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }

    async fn await_acceptance(&mut self, stage: Stage) -> Result<(), RtmpClientError> {
        loop {
            for event in self.fill().await? {
                match event {
                    ClientSessionEvent::ConnectionRequestAccepted if stage == Stage::Connect => {
                        return Ok(());
                    }
                    ClientSessionEvent::PlaybackRequestAccepted if stage == Stage::Play => {
                        return Ok(());
                    }
                    rejected @ ClientSessionEvent::ConnectionRequestRejected { .. } => {
                        return Err(RtmpClientError::Rejected(format!("{rejected:?}")));
                    }
                    other => trace!(?other, ?stage, "rtmp event during negotiation"),
                }
            }
        }
    }

    /// Reads one chunk from the socket and feeds it through.
    async fn fill(&mut self) -> Result<Vec<ClientSessionEvent>, RtmpClientError> {
        let n = self.stream.read(&mut self.read_buf).await?;
        if n == 0 {
            return Err(RtmpClientError::ConnectionClosed);
        }

        let buf = std::mem::take(&mut self.read_buf);
        let events = self.feed(&buf[..n]).await;
        self.read_buf = buf;
        events
    }

    /// Queues the media completed by `input`, then lets the session react to it.
    async fn feed(&mut self, input: &[u8]) -> Result<Vec<ClientSessionEvent>, RtmpClientError> {
        self.pending.extend(self.demuxer.demux(input)?);

        let results = self
            .session
            .handle_input(input)
            .map_err(|e| RtmpClientError::Session(format!("{e:?}")))?;
        self.apply(results).await
    }

    /// Sends outbound protocol packets and returns negotiation events.
    async fn apply(
        &mut self,
        results: Vec<ClientSessionResult>,
    ) -> Result<Vec<ClientSessionEvent>, RtmpClientError> {
        let mut events = Vec::new();

        for result in results {
            match result {
                ClientSessionResult::OutboundResponse(packet) => {
                    self.stream.write_all(&packet.bytes).await?;
                }
                ClientSessionResult::RaisedEvent(event) => match event {
                    // already queued by the demuxer
                    ClientSessionEvent::AudioDataReceived { .. }
                    | ClientSessionEvent::VideoDataReceived { .. }
                    | ClientSessionEvent::StreamMetadataReceived { .. } => {}
                    other => events.push(other),
                },
                _ => {}
            }
        }

        Ok(events)
    }
}

/// Runs the client side of the handshake; returns bytes received past its end.
async fn client_handshake(stream: &mut TcpStream) -> Result<Vec<u8>, RtmpClientError> {
    let mut handshake = Handshake::new(PeerType::Client);
    let c0_c1 = handshake
        .generate_outbound_p0_and_p1()
        .map_err(|e| RtmpClientError::Handshake(format!("{e:?}")))?;
    stream.write_all(&c0_c1).await?;

    let mut buf = vec![0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(RtmpClientError::ConnectionClosed);
        }

        match handshake
            .process_bytes(&buf[..n])
            .map_err(|e| RtmpClientError::Handshake(format!("{e:?}")))?
        {
            HandshakeProcessResult::InProgress { response_bytes } => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                }
            }
            HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            } => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                }
                return Ok(remaining_bytes);
            }
        }
    }
}
