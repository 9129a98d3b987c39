//! Stream relay: resolves an upstream stream target and forwards its bytes.
//!
//! One relay invocation issues exactly one authenticated upstream request and
//! hands back a lazy chunk stream. Nothing is retried, cached, or buffered
//! beyond the transport's own chunking; dropping the handle releases the
//! upstream connection.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use tracing::debug;

use crate::auth::{AUTHORIZATION_HEADER, ClientIdentity, Credential, authorization_value};
use crate::config::UpstreamConfig;

/// Content type reported downstream when the upstream omits one.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// How the caller wants the media delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Original file bytes, unmodified ("Static" delivery)
    Direct,
    /// Upstream re-encodes into a browser-friendly container first
    Transcode,
}

impl DeliveryMode {
    /// Only the exact string `direct` selects direct delivery; every other
    /// value requests a transcode.
    pub fn parse(raw: &str) -> Self {
        if raw == "direct" {
            DeliveryMode::Direct
        } else {
            DeliveryMode::Transcode
        }
    }
}

/// Media category of the item being streamed, as reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Audio,
    /// Live-TV program
    Program,
    Video,
    /// Unrecognized category; streams through the video endpoint
    Other,
}

impl ItemType {
    /// Case-insensitive categorization. Anything containing `audio`
    /// (e.g. `Audio`, `MusicAudio`) is audio; `program` is live TV;
    /// `movie`, `episode` and friends are video; the rest is `Other`.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.contains("audio") {
            ItemType::Audio
        } else if lower == "program" {
            ItemType::Program
        } else if matches!(lower.as_str(), "video" | "movie" | "episode" | "channel") {
            ItemType::Video
        } else {
            ItemType::Other
        }
    }
}

/// One relay invocation's inputs. Constructed per request, never reused.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub item_id: String,
    pub item_type: ItemType,
    pub mode: DeliveryMode,
}

impl StreamRequest {
    /// Builds a request from the raw path segments of the inbound URL.
    pub fn new(item_id: impl Into<String>, item_type: &str, mode: &str) -> Self {
        Self {
            item_id: item_id.into(),
            item_type: ItemType::parse(item_type),
            mode: DeliveryMode::parse(mode),
        }
    }
}

/// Upstream endpoint and query parameters resolved from a [`StreamRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub endpoint_path: String,
    pub query: Vec<(&'static str, &'static str)>,
}

/// Maps (item type, delivery mode) to the upstream endpoint and parameters.
///
/// Resolution always succeeds: unrecognized item types fall back to the
/// video endpoint, matching upstream behavior for generic media items.
pub fn resolve_target(request: &StreamRequest) -> UpstreamTarget {
    let endpoint_path = match request.item_type {
        ItemType::Audio => format!("/Audio/{}/stream", request.item_id),
        ItemType::Program => format!("/LiveTv/Channels/{}/MediaStream", request.item_id),
        ItemType::Video | ItemType::Other => format!("/Videos/{}/stream", request.item_id),
    };

    let query = match (request.mode, request.item_type) {
        (DeliveryMode::Direct, _) => vec![("Static", "true")],
        (DeliveryMode::Transcode, ItemType::Audio) => vec![
            ("Container", "mp3"),
            ("AudioCodec", "mp3"),
            ("EnableAutoStreamCopy", "false"),
        ],
        (DeliveryMode::Transcode, _) => vec![
            ("Container", "mp4"),
            ("VideoCodec", "h264"),
            ("AudioCodec", "aac"),
            ("EnableAutoStreamCopy", "false"),
        ],
    };

    UpstreamTarget {
        endpoint_path,
        query,
    }
}

/// Errors from one relay invocation. All are terminal for that invocation;
/// the caller decides what to surface downstream.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream unavailable")]
    UpstreamUnavailable {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("upstream rejected stream request with status {status}")]
    UpstreamRejected { status: StatusCode },

    #[error("upstream stream interrupted")]
    StreamInterrupted {
        #[source]
        source: reqwest::Error,
    },
}

/// Live upstream response: content type plus a lazy, consumed-once, in-order
/// sequence of body chunks. Chunk boundaries carry no semantic meaning.
pub struct UpstreamStream {
    content_type: Option<String>,
    chunks: Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>,
}

impl UpstreamStream {
    /// Content type to report downstream; falls back to a generic binary
    /// type when the upstream did not send one.
    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(FALLBACK_CONTENT_TYPE)
    }

    /// Consumes the handle, yielding the body chunk stream. Chunks arrive in
    /// network order; a mid-body transport failure ends the stream with
    /// [`RelayError::StreamInterrupted`].
    pub fn into_chunks(self) -> impl Stream<Item = Result<Bytes, RelayError>> + Send {
        self.chunks
    }
}

impl fmt::Debug for UpstreamStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamStream")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Issues authenticated stream requests against the upstream server.
///
/// Stateless across invocations; safe to clone and share between concurrent
/// relay operations.
#[derive(Clone)]
pub struct StreamRelay {
    client: reqwest::Client,
    config: UpstreamConfig,
    identity: ClientIdentity,
}

impl StreamRelay {
    /// Creates a relay with its own HTTP client.
    ///
    /// The client deliberately sets no total-request timeout: live streams
    /// have unbounded transfer duration. [`StreamRelay::open_stream`] bounds
    /// the connect and header exchange instead.
    pub fn new(config: UpstreamConfig, identity: ClientIdentity) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.stream_connect_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .expect("HTTP client creation should not fail");

        Self {
            client,
            config,
            identity,
        }
    }

    /// Opens the upstream stream for one relay invocation.
    ///
    /// Issues exactly one `GET` against the resolved target. The connect and
    /// header exchange must complete within the configured stream connect
    /// timeout; the body transfer afterwards is unbounded. The returned
    /// handle holds the only reference to the upstream connection; dropping
    /// it (e.g. when the downstream client disconnects) releases the
    /// connection without draining the body.
    ///
    /// # Errors
    /// - `RelayError::UpstreamUnavailable` - Connect failure, or no response
    ///   headers within the stream connect timeout
    /// - `RelayError::UpstreamRejected` - Upstream answered with a non-2xx
    ///   status; no body is consumed
    pub async fn open_stream(
        &self,
        request: &StreamRequest,
        credential: &Credential,
    ) -> Result<UpstreamStream, RelayError> {
        let target = resolve_target(request);
        let url = format!("{}{}", self.config.base(), target.endpoint_path);

        debug!(
            item_id = %request.item_id,
            endpoint = %target.endpoint_path,
            mode = ?request.mode,
            "opening upstream stream"
        );

        let send = self
            .client
            .get(&url)
            .query(&target.query)
            .header(
                AUTHORIZATION_HEADER,
                authorization_value(&self.identity, Some(credential)),
            )
            .send();

        // An upstream that accepts the connection but never answers must not
        // hang the invocation; the connect timeout alone does not cover the
        // header exchange.
        let response = tokio::time::timeout(self.config.stream_connect_timeout, send)
            .await
            .map_err(|elapsed| RelayError::UpstreamUnavailable {
                source: Box::new(elapsed),
            })?
            .map_err(|source| RelayError::UpstreamUnavailable {
                source: Box::new(source),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::UpstreamRejected { status });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|source| RelayError::StreamInterrupted { source }));

        Ok(UpstreamStream {
            content_type,
            chunks: Box::pin(chunks),
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn request(item_type: &str, mode: &str) -> StreamRequest {
        StreamRequest::new("item42", item_type, mode)
    }

    #[test]
    fn test_audio_resolves_audio_endpoint_regardless_of_mode() {
        for mode in ["direct", "transcode", "anything"] {
            let target = resolve_target(&request("Audio", mode));
            assert_eq!(target.endpoint_path, "/Audio/item42/stream");
        }
        // Case-insensitive, substring match
        let target = resolve_target(&request("MUSICAUDIO", "direct"));
        assert_eq!(target.endpoint_path, "/Audio/item42/stream");
    }

    #[test]
    fn test_program_resolves_live_tv_endpoint() {
        let target = resolve_target(&request("Program", "transcode"));
        assert_eq!(target.endpoint_path, "/LiveTv/Channels/item42/MediaStream");
        assert_eq!(
            target.query,
            vec![
                ("Container", "mp4"),
                ("VideoCodec", "h264"),
                ("AudioCodec", "aac"),
                ("EnableAutoStreamCopy", "false"),
            ]
        );
    }

    #[test]
    fn test_unrecognized_types_fall_back_to_video_endpoint() {
        for item_type in ["Movie", "Episode", "Series", "Photo", ""] {
            let target = resolve_target(&request(item_type, "direct"));
            assert_eq!(target.endpoint_path, "/Videos/item42/stream");
        }
    }

    #[test]
    fn test_direct_mode_params_are_static_only() {
        for item_type in ["Audio", "Program", "Movie"] {
            let target = resolve_target(&request(item_type, "direct"));
            assert_eq!(target.query, vec![("Static", "true")]);
        }
    }

    #[test]
    fn test_audio_transcode_params() {
        let target = resolve_target(&request("audio", "transcode"));
        assert_eq!(
            target.query,
            vec![
                ("Container", "mp3"),
                ("AudioCodec", "mp3"),
                ("EnableAutoStreamCopy", "false"),
            ]
        );
    }

    #[test]
    fn test_movie_direct_scenario() {
        let target = resolve_target(&request("Movie", "direct"));
        assert_eq!(target.endpoint_path, "/Videos/item42/stream");
        assert_eq!(target.query, vec![("Static", "true")]);
    }

    #[test]
    fn test_mode_parse_is_strict_about_direct() {
        assert_eq!(DeliveryMode::parse("direct"), DeliveryMode::Direct);
        assert_eq!(DeliveryMode::parse("Direct"), DeliveryMode::Transcode);
        assert_eq!(DeliveryMode::parse("transcode"), DeliveryMode::Transcode);
        assert_eq!(DeliveryMode::parse(""), DeliveryMode::Transcode);
    }

    #[test]
    fn test_upstream_stream_debug_elides_chunks() {
        let stream = UpstreamStream {
            content_type: Some("video/mp4".to_string()),
            chunks: Box::pin(futures::stream::empty::<Result<Bytes, RelayError>>()),
        };
        let rendered = format!("{stream:?}");
        assert!(rendered.contains("video/mp4"));
        assert!(rendered.contains(".."));
    }

    #[test]
    fn test_item_type_parse_cases() {
        assert_eq!(ItemType::parse("AUDIO"), ItemType::Audio);
        assert_eq!(ItemType::parse("pRoGrAm"), ItemType::Program);
        assert_eq!(ItemType::parse("Movie"), ItemType::Video);
        assert_eq!(ItemType::parse("Widget"), ItemType::Other);
    }

    proptest! {
        /// Any item type that is not audio-like and not "program" must take
        /// the video endpoint.
        #[test]
        fn prop_non_audio_non_program_uses_video_endpoint(raw in "[A-Za-z]{0,16}") {
            let lower = raw.to_ascii_lowercase();
            prop_assume!(!lower.contains("audio") && lower != "program");

            let target = resolve_target(&request(&raw, "direct"));
            prop_assert_eq!(target.endpoint_path, "/Videos/item42/stream".to_string());
        }
    }
}
