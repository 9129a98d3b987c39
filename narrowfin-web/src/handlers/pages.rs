//! Page handlers: login, library browsing, search, and the player.
//!
//! Every page except the login form requires a session; without one the
//! browser is redirected back to the login page.

use axum::Form;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use narrowfin_core::AuthSession;
use narrowfin_core::api::{ApiError, ItemsQuery, LibraryType, SearchQuery};
use serde::Deserialize;
use tracing::error;
use urlencoding::encode;

use crate::server::AppState;
use crate::session::SESSION_COOKIE;
use crate::templates;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct BrowseParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub library_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// Resolves the session behind the request's cookie, if any.
pub(crate) async fn session_from_jar(state: &AppState, jar: &CookieJar) -> Option<AuthSession> {
    let cookie = jar.get(SESSION_COOKIE)?;
    state.sessions.get(cookie.value()).await
}

/// GET / - login form.
pub async fn login_form() -> Html<String> {
    Html(templates::login_page(None))
}

/// POST / - authenticate against the upstream server and start a session.
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state
        .api
        .authenticate_by_name(&form.username, &form.password)
        .await
    {
        Ok(session) => {
            let id = state.sessions.insert(session).await;
            let cookie = Cookie::build((SESSION_COOKIE, id))
                .path("/")
                .http_only(true)
                .build();
            (jar.add(cookie), Redirect::to("/libraries")).into_response()
        }
        Err(ApiError::InvalidCredentials) => {
            Html(templates::login_page(Some("Invalid login."))).into_response()
        }
        Err(err) => {
            error!(error = %err, "login failed against upstream");
            Html(templates::login_page(Some(
                "Login failed: media server unavailable.",
            )))
            .into_response()
        }
    }
}

/// GET /libraries - the user's library views.
pub async fn libraries_index(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(session) = session_from_jar(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };

    match state.api.user_views(&session).await {
        Ok(views) => Html(templates::libraries_page(&views)).into_response(),
        Err(err) => {
            error!(error = %err, "failed to fetch libraries");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error fetching libraries",
            )
                .into_response()
        }
    }
}

/// GET /items/{parent_id} - one page of a folder's children.
pub async fn browse_items(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(parent_id): Path<String>,
    Query(params): Query<BrowseParams>,
) -> Response {
    let Some(session) = session_from_jar(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };

    let page = params.page.unwrap_or(0);
    let page_size = params
        .page_size
        .unwrap_or(state.config.pages.default_page_size);
    let library_type = params.library_type.as_deref().and_then(LibraryType::parse);

    let query = ItemsQuery {
        parent_id: parent_id.clone(),
        start_index: page * page_size,
        limit: page_size,
        library_type,
    };

    let items_page = match state.api.items(&session, &query).await {
        Ok(items_page) => items_page,
        Err(err) => {
            error!(error = %err, %parent_id, "failed to fetch items");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error fetching items").into_response();
        }
    };

    // Only recognized library kinds round-trip through pager links;
    // anything else already fell back to the mixed listing above.
    let mut pager_base = format!("/items/{}?", encode(&parent_id));
    if let Some(kind) = library_type {
        pager_base.push_str(&format!("library_type={}&", kind.as_str()));
    }
    if let Some(size) = params.page_size {
        pager_base.push_str(&format!("page_size={size}&"));
    }

    let view = templates::ItemListView {
        heading: "Items".to_string(),
        items: &items_page.items,
        pager_base,
        page,
        has_prev: page > 0,
        has_next: items_page.items.len() == page_size,
    };
    Html(templates::item_list_page(&view)).into_response()
}

/// GET /search - search results across the whole library.
pub async fn search_items(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(session) = session_from_jar(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };

    let term = match params.query.as_deref() {
        Some(term) if !term.is_empty() => term.to_string(),
        _ => return Redirect::to("/libraries").into_response(),
    };

    let page = params.page.unwrap_or(0);
    let page_size = params
        .page_size
        .unwrap_or(state.config.pages.default_page_size);

    let query = SearchQuery {
        term: term.clone(),
        start_index: page * page_size,
        limit: page_size,
    };

    let items_page = match state.api.search(&session, &query).await {
        Ok(items_page) => items_page,
        Err(err) => {
            error!(error = %err, %term, "search failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error searching").into_response();
        }
    };

    let mut pager_base = format!("/search?query={}&", encode(&term));
    if let Some(size) = params.page_size {
        pager_base.push_str(&format!("page_size={size}&"));
    }

    let view = templates::ItemListView {
        heading: format!("Search: {term}"),
        items: &items_page.items,
        pager_base,
        page,
        has_prev: page > 0,
        has_next: items_page.items.len() == page_size,
    };
    Html(templates::item_list_page(&view)).into_response()
}

/// GET /play/{item_id}/{item_type} - player page with both delivery modes.
pub async fn play_item(
    State(state): State<AppState>,
    jar: CookieJar,
    Path((item_id, item_type)): Path<(String, String)>,
) -> Response {
    if session_from_jar(&state, &jar).await.is_none() {
        return Redirect::to("/").into_response();
    }
    Html(templates::player_page(&item_id, &item_type)).into_response()
}
