// Source resolution: rtmp:// addresses pass through, anything else is treated
// as a redirector and asked once for its Location header.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use tracing::{debug, warn};
use url::Url;

use crate::error::ResolveError;

/// One non-following HTTP request against a redirector.
#[async_trait]
pub trait RedirectLookup: Send + Sync {
    /// The `Location` header of the first response, if any.
    async fn location(&self, url: &Url) -> Option<String>;
}

/// `RedirectLookup` over reqwest with redirects disabled.
pub struct HttpRedirectLookup {
    client: reqwest::Client,
}

impl HttpRedirectLookup {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RedirectLookup for HttpRedirectLookup {
    async fn location(&self, url: &Url) -> Option<String> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "redirect lookup failed");
                return None;
            }
        };

        let location = response
            .headers()
            .get(LOCATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        debug!(url = %url, status = %response.status(), location = ?location, "redirect lookup");

        location
    }
}

#[derive(Clone)]
pub struct SourceResolver {
    lookup: Arc<dyn RedirectLookup>,
}

impl SourceResolver {
    #[must_use]
    pub fn new(lookup: Arc<dyn RedirectLookup>) -> Self {
        Self { lookup }
    }

    /// Resolves the user-supplied value to an RTMP address.
    ///
    /// `rtmp` URLs come back unchanged with no network activity. Other URLs
    /// get exactly one lookup; its `Location` value is returned verbatim,
    /// whatever the response status.
    pub async fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
        let url = Url::parse(raw)?;

        if url.scheme().eq_ignore_ascii_case("rtmp") {
            return Ok(raw.to_string());
        }

        match self.lookup.location(&url).await {
            Some(location) if !location.is_empty() => Ok(location),
            _ => Err(ResolveError::Unresolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::DEFAULT_USER_AGENT;

    struct CountingLookup {
        calls: AtomicUsize,
        answer: Option<String>,
    }

    #[async_trait]
    impl RedirectLookup for CountingLookup {
        async fn location(&self, _url: &Url) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    fn counting(answer: Option<&str>) -> Arc<CountingLookup> {
        Arc::new(CountingLookup {
            calls: AtomicUsize::new(0),
            answer: answer.map(str::to_string),
        })
    }

    fn http_resolver() -> SourceResolver {
        let lookup = HttpRedirectLookup::new(DEFAULT_USER_AGENT, Duration::from_secs(10)).unwrap();
        SourceResolver::new(Arc::new(lookup))
    }

    #[tokio::test]
    async fn test_rtmp_scheme_passes_through_without_lookup() {
        let lookup = counting(Some("rtmp://elsewhere/live/x"));
        let resolver = SourceResolver::new(lookup.clone());

        for raw in [
            "rtmp://live.example.com/live/room1",
            "RTMP://live.example.com/live/room1?token=a",
            "Rtmp://10.1.1.1:1936/app/key",
        ] {
            assert_eq!(resolver.resolve(raw).await.unwrap(), raw);
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_url_without_lookup() {
        let lookup = counting(Some("rtmp://elsewhere/live/x"));
        let resolver = SourceResolver::new(lookup.clone());

        let err = resolver.resolve("::::not a url").await.unwrap_err();
        assert!(matches!(err, ResolveError::Malformed(_)));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_location_is_unresolved() {
        let lookup = counting(Some(""));
        let resolver = SourceResolver::new(lookup.clone());

        let err = resolver.resolve("https://redirector.example.com/r").await.unwrap_err();
        assert!(matches!(err, ResolveError::Unresolved));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_redirect_location_returned_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live/123"))
            .and(header("user-agent", DEFAULT_USER_AGENT))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "rtmp://origin.example.com/live/123?sign=abc"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resolved = http_resolver()
            .resolve(&format!("{}/live/123", server.uri()))
            .await
            .unwrap();
        assert_eq!(resolved, "rtmp://origin.example.com/live/123?sign=abc");
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hop1"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("{}/hop2", server.uri())),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/hop2"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "rtmp://never/live/x"),
            )
            .expect(0)
            .mount(&server)
            .await;

        let resolved = http_resolver()
            .resolve(&format!("{}/hop1", server.uri()))
            .await
            .unwrap();
        assert_eq!(resolved, format!("{}/hop2", server.uri()));
    }

    #[tokio::test]
    async fn test_location_used_regardless_of_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Location", "rtmp://origin/live/s"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resolved = http_resolver().resolve(&server.uri()).await.unwrap();
        assert_eq!(resolved, "rtmp://origin/live/s");
    }

    #[tokio::test]
    async fn test_non_ascii_location_is_kept() {
        let location = reqwest::header::HeaderValue::from_bytes(
            "rtmp://origin.example.com/直播/房间1".as_bytes(),
        )
        .unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", location))
            .expect(1)
            .mount(&server)
            .await;

        let resolved = http_resolver().resolve(&server.uri()).await.unwrap();
        assert_eq!(resolved, "rtmp://origin.example.com/直播/房间1");
    }

    #[tokio::test]
    async fn test_missing_location_is_unresolved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("no redirect here"))
            .expect(1)
            .mount(&server)
            .await;

        let err = http_resolver().resolve(&server.uri()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unresolved));
    }

    #[tokio::test]
    async fn test_unreachable_redirector_is_unresolved() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = http_resolver()
            .resolve(&format!("http://127.0.0.1:{port}/redirect"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Unresolved));
    }
}
