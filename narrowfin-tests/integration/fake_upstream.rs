//! Minimal in-process stand-in for the upstream media server.
//!
//! Records every request it receives and serves canned chunked bodies.
//! Special item ids select behaviors: `missing` answers 404, `untyped`
//! omits the content type, `truncated` fails the connection mid-body,
//! `endless` streams forever and signals when its body is dropped (i.e.
//! when the relay released the connection).

use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::Notify;

/// One request as seen by the fake upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

#[derive(Clone, Default)]
pub struct Recorded {
    inner: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Recorded {
    fn push(&self, request: RecordedRequest) {
        self.inner.lock().unwrap().push(request);
    }

    pub fn last(&self) -> RecordedRequest {
        self.inner.lock().unwrap().last().cloned().unwrap()
    }
}

#[derive(Clone)]
struct UpstreamState {
    recorded: Recorded,
    released: Arc<Notify>,
}

/// Handle to a running fake upstream.
pub struct FakeUpstream {
    pub base_url: String,
    pub recorded: Recorded,
    /// Notified when the endless stream body is dropped server-side
    pub released: Arc<Notify>,
}

/// The known media payload, split into the chunks the upstream emits.
pub fn media_chunks() -> Vec<Bytes> {
    (0u8..8).map(|i| Bytes::from(vec![i; 1024])).collect()
}

/// The known media payload as one contiguous byte string.
pub fn media_bytes() -> Vec<u8> {
    media_chunks().concat()
}

pub async fn spawn() -> FakeUpstream {
    let recorded = Recorded::default();
    let released = Arc::new(Notify::new());
    let state = UpstreamState {
        recorded: recorded.clone(),
        released: released.clone(),
    };

    let app = Router::new()
        .route("/Users/AuthenticateByName", post(authenticate))
        .route("/Videos/{id}/stream", get(video_stream))
        .route("/Audio/{id}/stream", get(audio_stream))
        .route("/LiveTv/Channels/{id}/MediaStream", get(live_stream))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeUpstream {
        base_url: format!("http://{addr}"),
        recorded,
        released,
    }
}

fn record(
    state: &UpstreamState,
    path: String,
    query: HashMap<String, String>,
    headers: &HeaderMap,
) {
    state.recorded.push(RecordedRequest {
        path,
        query,
        authorization: headers
            .get("X-Emby-Authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned),
    });
}

fn chunked_media_response(content_type: &'static str) -> Response {
    let chunks = futures::stream::iter(media_chunks().into_iter().map(Ok::<_, Infallible>));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from_stream(chunks))
        .unwrap()
}

/// Serves the first three media chunks, then aborts the connection without
/// terminating the chunked body.
fn truncated_media_response() -> Response {
    let good = futures::stream::iter(media_chunks().into_iter().take(3).map(Ok));
    // Yield before failing so hyper flushes the headers and the good chunks
    // to the wire instead of discarding the whole buffered response.
    let failure = futures::stream::once(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "upstream gave up",
        ))
    });
    let chunks = good.chain(failure);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .body(Body::from_stream(chunks))
        .unwrap()
}

async fn authenticate(
    State(state): State<UpstreamState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    record(
        &state,
        "/Users/AuthenticateByName".to_string(),
        HashMap::new(),
        &headers,
    );

    if body["Pw"] == "open-sesame" {
        Json(serde_json::json!({
            "AccessToken": "tok123",
            "User": { "Id": "user9" }
        }))
        .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn video_stream(
    State(state): State<UpstreamState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&state, format!("/Videos/{id}/stream"), query, &headers);

    match id.as_str() {
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "untyped" => Response::builder()
            .status(StatusCode::OK)
            .body(Body::from(media_bytes()))
            .unwrap(),
        "truncated" => truncated_media_response(),
        "endless" => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "video/mp4")
            .body(Body::from_stream(EndlessBody::new(state.released.clone())))
            .unwrap(),
        _ => chunked_media_response("video/mp4"),
    }
}

async fn audio_stream(
    State(state): State<UpstreamState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&state, format!("/Audio/{id}/stream"), query, &headers);
    chunked_media_response("audio/mpeg")
}

async fn live_stream(
    State(state): State<UpstreamState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(
        &state,
        format!("/LiveTv/Channels/{id}/MediaStream"),
        query,
        &headers,
    );
    chunked_media_response("video/mp4")
}

static ENDLESS_CHUNK: [u8; 1024] = [7u8; 1024];

/// Body that yields chunks forever and notifies on drop.
struct EndlessBody {
    released: Arc<Notify>,
    interval: tokio::time::Interval,
}

impl EndlessBody {
    fn new(released: Arc<Notify>) -> Self {
        Self {
            released,
            interval: tokio::time::interval(Duration::from_millis(5)),
        }
    }
}

impl Stream for EndlessBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.interval.poll_tick(cx) {
            Poll::Ready(_) => Poll::Ready(Some(Ok(Bytes::from_static(&ENDLESS_CHUNK)))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for EndlessBody {
    fn drop(&mut self) {
        self.released.notify_one();
    }
}
