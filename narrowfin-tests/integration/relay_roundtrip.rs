//! Relay-level integration tests against the fake upstream.

use std::time::Duration;

use futures::StreamExt;
use narrowfin_core::config::UpstreamConfig;
use narrowfin_core::{ClientIdentity, Credential, RelayError, StreamRelay, StreamRequest};

use crate::fake_upstream::{self, FakeUpstream, media_bytes};

fn relay_for(upstream: &FakeUpstream) -> StreamRelay {
    let config = UpstreamConfig {
        base_url: upstream.base_url.clone(),
        ..UpstreamConfig::default()
    };
    StreamRelay::new(config, ClientIdentity::default())
}

#[tokio::test]
async fn test_round_trip_preserves_bytes_in_order() {
    let upstream = fake_upstream::spawn().await;
    let relay = relay_for(&upstream);

    let request = StreamRequest::new("item1", "Movie", "direct");
    let stream = relay
        .open_stream(&request, &Credential::new("tok"))
        .await
        .unwrap();

    assert_eq!(stream.content_type(), "video/mp4");

    let mut received = Vec::new();
    let mut chunks = Box::pin(stream.into_chunks());
    while let Some(chunk) = chunks.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(received, media_bytes());

    let seen = upstream.recorded.last();
    assert_eq!(seen.path, "/Videos/item1/stream");
    assert_eq!(seen.query.get("Static").map(String::as_str), Some("true"));
    assert_eq!(seen.query.len(), 1);
    let auth = seen.authorization.unwrap();
    assert!(auth.contains(r#"Token="tok""#));
    assert!(auth.starts_with("MediaBrowser Client="));
}

#[tokio::test]
async fn test_audio_transcode_params_reach_upstream() {
    let upstream = fake_upstream::spawn().await;
    let relay = relay_for(&upstream);

    let request = StreamRequest::new("song7", "Audio", "transcode");
    let stream = relay
        .open_stream(&request, &Credential::new("tok"))
        .await
        .unwrap();
    assert_eq!(stream.content_type(), "audio/mpeg");

    let seen = upstream.recorded.last();
    assert_eq!(seen.path, "/Audio/song7/stream");
    assert_eq!(seen.query.get("Container").map(String::as_str), Some("mp3"));
    assert_eq!(
        seen.query.get("AudioCodec").map(String::as_str),
        Some("mp3")
    );
    assert_eq!(
        seen.query.get("EnableAutoStreamCopy").map(String::as_str),
        Some("false")
    );
}

#[tokio::test]
async fn test_program_transcode_uses_live_tv_endpoint() {
    let upstream = fake_upstream::spawn().await;
    let relay = relay_for(&upstream);

    let request = StreamRequest::new("ch3", "Program", "transcode");
    relay
        .open_stream(&request, &Credential::new("tok"))
        .await
        .unwrap();

    let seen = upstream.recorded.last();
    assert_eq!(seen.path, "/LiveTv/Channels/ch3/MediaStream");
    assert_eq!(seen.query.get("Container").map(String::as_str), Some("mp4"));
    assert_eq!(
        seen.query.get("VideoCodec").map(String::as_str),
        Some("h264")
    );
    assert_eq!(
        seen.query.get("AudioCodec").map(String::as_str),
        Some("aac")
    );
}

#[tokio::test]
async fn test_upstream_404_maps_to_rejected() {
    let upstream = fake_upstream::spawn().await;
    let relay = relay_for(&upstream);

    let request = StreamRequest::new("missing", "Movie", "direct");
    let err = relay
        .open_stream(&request, &Credential::new("tok"))
        .await
        .unwrap_err();

    match err {
        RelayError::UpstreamRejected { status } => assert_eq!(status.as_u16(), 404),
        other => panic!("expected UpstreamRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_upstream_maps_to_unavailable() {
    let config = UpstreamConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        stream_connect_timeout: Duration::from_millis(500),
        ..UpstreamConfig::default()
    };
    let relay = StreamRelay::new(config, ClientIdentity::default());

    let request = StreamRequest::new("item1", "Movie", "direct");
    let err = relay
        .open_stream(&request, &Credential::new("tok"))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::UpstreamUnavailable { .. }));
}

#[tokio::test]
async fn test_silent_upstream_times_out_within_bound() {
    // Accepts connections but never writes a byte of response.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            held.push(socket);
        }
    });

    let config = UpstreamConfig {
        base_url: format!("http://{addr}"),
        stream_connect_timeout: Duration::from_millis(200),
        ..UpstreamConfig::default()
    };
    let relay = StreamRelay::new(config, ClientIdentity::default());

    let request = StreamRequest::new("item1", "Movie", "direct");
    let started = std::time::Instant::now();
    let err = relay
        .open_stream(&request, &Credential::new("tok"))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::UpstreamUnavailable { .. }));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "header exchange should fail within the configured bound"
    );
}

#[tokio::test]
async fn test_mid_body_failure_yields_prefix_then_interruption() {
    let upstream = fake_upstream::spawn().await;
    let relay = relay_for(&upstream);

    let request = StreamRequest::new("truncated", "Movie", "direct");
    let stream = relay
        .open_stream(&request, &Credential::new("tok"))
        .await
        .unwrap();

    let mut received = Vec::new();
    let mut interrupted = false;
    let mut chunks = Box::pin(stream.into_chunks());
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(bytes) => received.extend_from_slice(&bytes),
            Err(err) => {
                assert!(matches!(err, RelayError::StreamInterrupted { .. }));
                interrupted = true;
                break;
            }
        }
    }

    assert!(interrupted, "stream should end with an interruption error");
    // Whatever arrived before the failure is an in-order prefix of the media.
    let expected = media_bytes();
    assert!(received.len() < expected.len());
    assert_eq!(received.as_slice(), &expected[..received.len()]);
}

#[tokio::test]
async fn test_missing_content_type_falls_back_to_binary() {
    let upstream = fake_upstream::spawn().await;
    let relay = relay_for(&upstream);

    let request = StreamRequest::new("untyped", "Movie", "direct");
    let stream = relay
        .open_stream(&request, &Credential::new("tok"))
        .await
        .unwrap();
    assert_eq!(stream.content_type(), "application/octet-stream");
}

#[tokio::test]
async fn test_dropping_stream_releases_upstream_connection() {
    let upstream = fake_upstream::spawn().await;
    let relay = relay_for(&upstream);

    let request = StreamRequest::new("endless", "Movie", "direct");
    let stream = relay
        .open_stream(&request, &Credential::new("tok"))
        .await
        .unwrap();

    // Consume a couple of chunks, then abandon the stream mid-body.
    let mut chunks = Box::pin(stream.into_chunks());
    chunks.next().await.unwrap().unwrap();
    chunks.next().await.unwrap().unwrap();
    drop(chunks);

    tokio::time::timeout(Duration::from_secs(2), upstream.released.notified())
        .await
        .expect("upstream body should be dropped after downstream disconnect");
}
