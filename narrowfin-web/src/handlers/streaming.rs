//! Stream relay endpoint.
//!
//! `/proxy_stream/{item_id}/{mode}/{item_type}` opens one upstream stream
//! and forwards its bytes as the response body. Failures before the first
//! byte map to a terse 500; once streaming has begun a failure just ends the
//! body (one-way streaming has no rollback for flushed bytes).

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use narrowfin_core::StreamRequest;
use tracing::{info, warn};

use super::pages::session_from_jar;
use crate::server::AppState;

/// GET /proxy_stream/{item_id}/{mode}/{item_type}
pub async fn proxy_stream(
    State(state): State<AppState>,
    jar: CookieJar,
    Path((item_id, mode, item_type)): Path<(String, String, String)>,
) -> Response {
    let Some(session) = session_from_jar(&state, &jar).await else {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    };

    let request = StreamRequest::new(item_id, &item_type, &mode);
    info!(
        item_id = %request.item_id,
        item_type = ?request.item_type,
        mode = ?request.mode,
        "relaying stream"
    );

    match state.relay.open_stream(&request, &session.access_token).await {
        Ok(stream) => {
            // Upstream may report a content type that is not a valid header
            // value; fall back rather than fail the whole stream.
            let content_type = header::HeaderValue::from_str(stream.content_type())
                .unwrap_or(header::HeaderValue::from_static("application/octet-stream"));

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from_stream(stream.into_chunks()))
                .unwrap()
        }
        Err(err) => {
            warn!(item_id = %request.item_id, error = %err, "stream relay failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Streaming error: {err}"),
            )
                .into_response()
        }
    }
}
