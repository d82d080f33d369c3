use tracing::{info, warn};

use crate::error::RelayError;
use crate::sink::FlvSink;
use crate::source::RtmpSource;

/// How a relay session ended.
#[derive(Debug)]
pub struct RelayOutcome {
    /// Packets written to the sink.
    pub packets: u64,
    pub reason: RelayError,
}

/// Pumps packets from `source` into `sink` until either side fails.
///
/// The file header goes out before the first read. Packets are forwarded
/// one by one in receipt order; each write completes before the next read,
/// so a slow sink throttles the source. The source is closed on every exit.
pub async fn run_relay<K>(mut source: Box<dyn RtmpSource>, sink: &mut K) -> RelayOutcome
where
    K: FlvSink + ?Sized,
{
    let mut packets = 0u64;
    let reason = pump(source.as_mut(), sink, &mut packets).await;
    source.close().await;

    match &reason {
        RelayError::Source(e) => info!(packets, error = %e, "stream ended with error"),
        RelayError::SinkClosed => info!(packets, "client disconnected, closing upstream"),
        RelayError::Mux(e) => warn!(packets, error = %e, "failed to mux packet"),
    }

    RelayOutcome { packets, reason }
}

async fn pump<K>(source: &mut dyn RtmpSource, sink: &mut K, packets: &mut u64) -> RelayError
where
    K: FlvSink + ?Sized,
{
    if let Err(e) = sink.write_file_header().await {
        return e;
    }

    loop {
        let packet = match source.read_packet().await {
            Ok(packet) => packet,
            Err(e) => return e.into(),
        };
        if let Err(e) = sink.write_packet(packet).await {
            return e;
        }
        *packets += 1;
    }
}
