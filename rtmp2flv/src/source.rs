use async_trait::async_trait;
use rtmp2flv_media::{DialOptions, MediaPacket, RtmpClient, RtmpClientError, RtmpConnection};

/// A live upstream producing media packets in order.
#[async_trait]
pub trait RtmpSource: Send {
    /// Next packet, or the reason the source is finished.
    async fn read_packet(&mut self) -> Result<MediaPacket, RtmpClientError>;

    /// Releases the upstream connection.
    async fn close(&mut self);
}

/// Opens a playing upstream for a resolved address.
#[async_trait]
pub trait RtmpDialer: Send + Sync {
    async fn dial(&self, addr: &str) -> Result<Box<dyn RtmpSource>, RtmpClientError>;
}

#[async_trait]
impl RtmpSource for RtmpConnection {
    async fn read_packet(&mut self) -> Result<MediaPacket, RtmpClientError> {
        RtmpConnection::read_packet(self).await
    }

    async fn close(&mut self) {
        RtmpConnection::close(self).await;
    }
}

/// Dials real RTMP servers with `rtmp2flv-media`.
#[derive(Debug, Clone, Default)]
pub struct RtmpClientDialer {
    client: RtmpClient,
}

impl RtmpClientDialer {
    #[must_use]
    pub fn new(options: DialOptions) -> Self {
        Self {
            client: RtmpClient::new(options),
        }
    }
}

#[async_trait]
impl RtmpDialer for RtmpClientDialer {
    async fn dial(&self, addr: &str) -> Result<Box<dyn RtmpSource>, RtmpClientError> {
        let connection = self.client.dial(addr).await?;
        Ok(Box::new(connection))
    }
}
