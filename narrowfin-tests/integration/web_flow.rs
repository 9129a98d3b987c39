//! Web-layer integration tests: session gating, login flow, and the
//! `/proxy_stream` endpoint end to end through the router.

use narrowfin_core::config::{NarrowfinConfig, UpstreamConfig};
use narrowfin_core::{AuthSession, Credential};
use narrowfin_web::session::SESSION_COOKIE;
use narrowfin_web::{AppState, SessionStore, router};

use crate::fake_upstream::{self, media_bytes};

/// Spawns the web server wired to the given upstream; returns its base URL
/// and a handle to the session store for seeding sessions directly.
async fn spawn_web(upstream_base: &str) -> (String, SessionStore) {
    let config = NarrowfinConfig {
        upstream: UpstreamConfig {
            base_url: upstream_base.to_string(),
            ..UpstreamConfig::default()
        },
        ..NarrowfinConfig::default()
    };
    let state = AppState::new(config);
    let sessions = state.sessions.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), sessions)
}

async fn seeded_cookie(sessions: &SessionStore) -> String {
    let id = sessions
        .insert(AuthSession {
            user_id: "u1".to_string(),
            access_token: Credential::new("tok"),
        })
        .await;
    format!("{SESSION_COOKIE}={id}")
}

fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_proxy_stream_without_session_is_unauthorized() {
    let upstream = fake_upstream::spawn().await;
    let (web, _sessions) = spawn_web(&upstream.base_url).await;

    let response = reqwest::get(format!("{web}/proxy_stream/item1/direct/Movie"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_proxy_stream_relays_media_bytes() {
    let upstream = fake_upstream::spawn().await;
    let (web, sessions) = spawn_web(&upstream.base_url).await;
    let cookie = seeded_cookie(&sessions).await;

    let response = reqwest::Client::new()
        .get(format!("{web}/proxy_stream/item1/direct/Movie"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok()),
        Some("video/mp4")
    );
    let body = response.bytes().await.unwrap();
    assert_eq!(body.as_ref(), media_bytes().as_slice());
}

#[tokio::test]
async fn test_proxy_stream_upstream_404_yields_500_and_no_media() {
    let upstream = fake_upstream::spawn().await;
    let (web, sessions) = spawn_web(&upstream.base_url).await;
    let cookie = seeded_cookie(&sessions).await;

    let response = reqwest::Client::new()
        .get(format!("{web}/proxy_stream/missing/direct/Movie"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 500);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("Streaming error"));
    assert_ne!(body.as_bytes(), media_bytes().as_slice());
}

#[tokio::test]
async fn test_pages_redirect_to_login_without_session() {
    let upstream = fake_upstream::spawn().await;
    let (web, _sessions) = spawn_web(&upstream.base_url).await;

    let response = no_redirect_client()
        .get(format!("{web}/libraries"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|value| value.to_str().ok()),
        Some("/")
    );
}

#[tokio::test]
async fn test_login_flow_sets_session_cookie_and_streams() {
    let upstream = fake_upstream::spawn().await;
    let (web, _sessions) = spawn_web(&upstream.base_url).await;

    let response = no_redirect_client()
        .post(&web)
        .form(&[("username", "alice"), ("password", "open-sesame")])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|value| value.to_str().ok()),
        Some("/libraries")
    );

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .expect("login should set a session cookie");
    assert!(set_cookie.starts_with(SESSION_COOKIE));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    // The seeded session's upstream token must flow through to the relay.
    let stream_response = reqwest::Client::new()
        .get(format!("{web}/proxy_stream/item1/direct/Movie"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(stream_response.status().as_u16(), 200);

    let seen = upstream.recorded.last();
    assert!(seen.authorization.unwrap().contains(r#"Token="tok123""#));
}

#[tokio::test]
async fn test_login_with_bad_password_rerenders_form() {
    let upstream = fake_upstream::spawn().await;
    let (web, _sessions) = spawn_web(&upstream.base_url).await;

    let response = reqwest::Client::new()
        .post(&web)
        .form(&[("username", "alice"), ("password", "wrong")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("Invalid login."));
}
