use super::errors::RtmpClientError;
use super::DEFAULT_RTMP_PORT;

/// Dial target derived from an `rtmp://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    pub host: String,
    pub port: u16,
    pub app: String,
    /// Stream key passed to `play`, query string included.
    pub stream: String,
    pub tc_url: String,
}

impl RtmpUrl {
    /// Parses an RTMP address.
    ///
    /// The request path is split into app and stream key: one segment is the
    /// app alone, two are app and stream, and with more segments the first two
    /// form the app and the remainder the stream key.
    pub fn parse(raw: &str) -> Result<Self, RtmpClientError> {
        let parsed = ::url::Url::parse(raw)
            .map_err(|e| RtmpClientError::InvalidUrl(format!("{raw}: {e}")))?;

        if !parsed.scheme().eq_ignore_ascii_case("rtmp") {
            return Err(RtmpClientError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RtmpClientError::InvalidUrl(format!("{raw}: missing host")))?
            .to_string();
        let port = parsed.port().unwrap_or(DEFAULT_RTMP_PORT);

        let mut request_uri = parsed.path().to_string();
        if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
            request_uri.push('?');
            request_uri.push_str(query);
        }

        let segments: Vec<&str> = request_uri.split('/').collect();
        let (app, stream) = match segments.len() {
            0 | 1 => (String::new(), String::new()),
            2 => (segments[1].to_string(), String::new()),
            3 => (segments[1].to_string(), segments[2].to_string()),
            _ => (segments[1..3].join("/"), segments[3..].join("/")),
        };

        if app.is_empty() {
            return Err(RtmpClientError::InvalidUrl(format!("{raw}: missing app name")));
        }

        let authority = match parsed.port() {
            Some(p) => format!("{host}:{p}"),
            None => host.clone(),
        };
        let tc_url = format!("rtmp://{authority}/{app}");

        Ok(Self {
            host,
            port,
            app,
            stream,
            tc_url,
        })
    }
}
