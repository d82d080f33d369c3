// HTTP surface:
// - GET /flv?rtmp=<url>&appkey=<key> - live FLV relay of an RTMP source
// - GET /health                      - liveness check
//
// Every failure before the relay starts maps to a status code; once the 200
// is committed, failures only end the body.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use rtmp2flv_media::DialOptions;

use crate::config::Config;
use crate::error::ResolveError;
use crate::gate::AccessGate;
use crate::relay::run_relay;
use crate::resolver::{HttpRedirectLookup, SourceResolver};
use crate::sink::{ChannelSink, FlvPacketSink};
use crate::source::{RtmpClientDialer, RtmpDialer};

/// One slot: the relay cannot read ahead of what the client has taken.
const BODY_CHANNEL_CAPACITY: usize = 1;

/// Shared, read-only request handling state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    gate: AccessGate,
    resolver: SourceResolver,
    dialer: Arc<dyn RtmpDialer>,
}

impl AppState {
    /// State wired to the real redirector client and RTMP dialer.
    pub fn from_config(config: Arc<Config>) -> anyhow::Result<Self> {
        let lookup = HttpRedirectLookup::new(&config.user_agent, config.resolve_timeout())?;
        let dialer = RtmpClientDialer::new(DialOptions {
            timeout: config.dial_timeout(),
        });

        Ok(Self::new(
            config,
            SourceResolver::new(Arc::new(lookup)),
            Arc::new(dialer),
        ))
    }

    #[must_use]
    pub fn new(config: Arc<Config>, resolver: SourceResolver, dialer: Arc<dyn RtmpDialer>) -> Self {
        let gate = AccessGate::new(config.appkey.clone());
        Self {
            config,
            gate,
            resolver,
            dialer,
        }
    }
}

/// `/flv` parameters. Repeated keys are not an error: the first value wins,
/// and a missing `rtmp` is the empty string.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FlvQuery {
    pub rtmp: String,
    pub appkey: Option<String>,
}

impl FlvQuery {
    /// Never fails, so nothing can reject a request ahead of the access gate.
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        let mut rtmp = None;
        let mut appkey = None;
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "rtmp" if rtmp.is_none() => rtmp = Some(value.into_owned()),
                "appkey" if appkey.is_none() => appkey = Some(value.into_owned()),
                _ => {}
            }
        }

        Self {
            rtmp: rtmp.unwrap_or_default(),
            appkey,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/flv", get(serve_flv))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let listen = state.config.listen.clone();
    let listener = TcpListener::bind(&listen)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {listen}: {e}"))?;
    info!("HTTP-FLV listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

async fn health_check() -> &'static str {
    "ok"
}

async fn serve_flv(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Response {
    let query = FlvQuery::from_raw(raw.as_deref());
    if !state.gate.permits(query.appkey.as_deref()) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let rtmp_addr = match state.resolver.resolve(&query.rtmp).await {
        Ok(addr) => addr,
        Err(e @ ResolveError::Malformed(_)) => {
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
        Err(e @ ResolveError::Unresolved) => {
            warn!(rtmp = %query.rtmp, "could not resolve rtmp address");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    info!(rtmp_addr = %rtmp_addr, "Forwarding");
    let source = match state.dialer.dial(&rtmp_addr).await {
        Ok(source) => source,
        Err(e) => {
            warn!(rtmp_addr = %rtmp_addr, error = %e, "rtmp dial failed");
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };

    let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut sink = FlvPacketSink::new(ChannelSink::new(tx));
        let outcome = run_relay(source, &mut sink).await;
        info!(rtmp_addr = %rtmp_addr, packets = outcome.packets, "relay finished");
    });

    // No content length: hyper sends the body chunked.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/x-flv")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|e| {
            error!("Failed to build FLV response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::resolver::RedirectLookup;
    use crate::source::RtmpSource;
    use async_trait::async_trait;
    use rtmp2flv_media::{MediaPacket, RtmpClientError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    #[derive(Default)]
    struct Calls {
        lookups: AtomicUsize,
        dials: AtomicUsize,
    }

    struct FakeLookup {
        calls: Arc<Calls>,
        location: Option<String>,
    }

    #[async_trait]
    impl RedirectLookup for FakeLookup {
        async fn location(&self, _url: &Url) -> Option<String> {
            self.calls.lookups.fetch_add(1, Ordering::SeqCst);
            self.location.clone()
        }
    }

    struct EmptySource;

    #[async_trait]
    impl RtmpSource for EmptySource {
        async fn read_packet(&mut self) -> Result<MediaPacket, RtmpClientError> {
            Err(RtmpClientError::ConnectionClosed)
        }

        async fn close(&mut self) {}
    }

    struct FakeDialer {
        calls: Arc<Calls>,
        fail: bool,
    }

    #[async_trait]
    impl RtmpDialer for FakeDialer {
        async fn dial(&self, _addr: &str) -> Result<Box<dyn RtmpSource>, RtmpClientError> {
            self.calls.dials.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RtmpClientError::Rejected("NetConnection.Connect.Rejected".to_string()))
            } else {
                Ok(Box::new(EmptySource))
            }
        }
    }

    fn router(appkey: &str, location: Option<&str>, dial_fails: bool) -> (Router, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let config = Arc::new(Config {
            appkey: appkey.to_string(),
            ..Config::default()
        });
        let lookup = FakeLookup {
            calls: calls.clone(),
            location: location.map(str::to_string),
        };
        let dialer = FakeDialer {
            calls: calls.clone(),
            fail: dial_fails,
        };
        let state = AppState::new(
            config,
            SourceResolver::new(Arc::new(lookup)),
            Arc::new(dialer),
        );
        (create_router(state), calls)
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_wrong_appkey_is_not_found() {
        let (router, calls) = router("secret", Some("rtmp://x/live/s"), false);
        let (status, body) = get(router, "/flv?rtmp=http%3A%2F%2Fr.example%2Fa&appkey=nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
        assert_eq!(calls.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(calls.dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_keys_with_wrong_appkey_are_not_found() {
        for uri in [
            "/flv?appkey=x&appkey=y&rtmp=a",
            "/flv?rtmp=a&rtmp=b&appkey=wrong",
            "/flv?appkey=wrong&appkey=secret&rtmp=rtmp%3A%2F%2Forigin%2Flive%2Fs",
        ] {
            let (router, calls) = router("secret", Some("rtmp://x/live/s"), false);
            let (status, body) = get(router, uri).await;

            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert!(body.is_empty(), "{uri}");
            assert_eq!(calls.lookups.load(Ordering::SeqCst), 0, "{uri}");
            assert_eq!(calls.dials.load(Ordering::SeqCst), 0, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_repeated_keys_take_first_value() {
        let (router, calls) = router("k", Some("rtmp://x/live/s"), false);
        let (status, _) = get(
            router,
            "/flv?appkey=k&rtmp=rtmp%3A%2F%2Forigin%2Flive%2Fs&appkey=other&rtmp=http%3A%2F%2Fr.example%2Fa",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        // the first rtmp value is an rtmp url, so no redirect lookup happens
        assert_eq!(calls.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(calls.dials.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_parsing() {
        assert_eq!(FlvQuery::from_raw(None), FlvQuery::default());
        assert_eq!(
            FlvQuery::from_raw(Some("rtmp=a%20b&rtmp=c&appkey=&appkey=k&x=1")),
            FlvQuery {
                rtmp: "a b".to_string(),
                appkey: Some(String::new()),
            }
        );
        // undecodable escapes pass through rather than rejecting the request
        assert_eq!(FlvQuery::from_raw(Some("rtmp=%zz")).rtmp, "%zz");
    }

    #[tokio::test]
    async fn test_missing_appkey_is_not_found_when_gated() {
        let (router, calls) = router("secret", None, false);
        let (status, _) = get(router, "/flv?rtmp=%3A%3A%3A%3Anot").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(calls.dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_url_is_bad_request() {
        let (router, calls) = router("", None, false);
        let (status, body) = get(router, "/flv?rtmp=%3A%3A%3A%3Anot%20a%20url").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let expected = Url::parse("::::not a url").unwrap_err().to_string();
        assert_eq!(String::from_utf8(body).unwrap(), expected);
        assert_eq!(calls.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(calls.dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unresolved_redirect_is_invalid_url() {
        let (router, calls) = router("", None, false);
        let (status, body) = get(router, "/flv?rtmp=https%3A%2F%2Fr.example%2Froom%2F1").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"Invalid url");
        assert_eq!(calls.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(calls.dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dial_failure_is_bad_gateway() {
        let (router, _) = router("", None, true);
        let (status, body) = get(router, "/flv?rtmp=rtmp%3A%2F%2Forigin%2Flive%2Fs").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "connection rejected: NetConnection.Connect.Rejected"
        );
    }

    #[tokio::test]
    async fn test_success_streams_flv() {
        let (router, calls) = router("k", Some("rtmp://origin/live/s"), false);
        let response = router
            .oneshot(
                Request::get("/flv?rtmp=http%3A%2F%2Fr.example%2Fa&appkey=k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/x-flv");
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], &[b'F', b'L', b'V', 1, 5, 0, 0, 0, 9, 0, 0, 0, 0]);
        assert_eq!(calls.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(calls.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = router("", None, false);
        let (status, body) = get(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }
}
