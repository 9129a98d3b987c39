//! Thin client for the upstream Jellyfin-compatible HTTP API.
//!
//! Authentication, library views, item listing, and search are direct
//! parameter-forwarding calls; the client owns request construction, the
//! authorization header, and typed response parsing. Streaming lives in
//! [`crate::relay`], not here.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::auth::{AUTHORIZATION_HEADER, ClientIdentity, Credential, authorization_value};
use crate::config::UpstreamConfig;

/// Errors from upstream API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("upstream API rejected {endpoint} with status {status}")]
    Rejected {
        endpoint: String,
        status: StatusCode,
    },

    #[error("upstream API request failed")]
    Http(#[from] reqwest::Error),
}

/// An authenticated upstream session: the user it belongs to and the bearer
/// token proving it.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
    pub access_token: Credential,
}

/// One media item as reported by the upstream `/Items` endpoints.
///
/// Only the fields the pages render are modeled; everything else in the
/// upstream payload is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediaItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub item_type: String,
    /// Library folder kind (`movies`, `tvshows`, `livetv`); set on views only
    pub collection_type: Option<String>,
    pub index_number: Option<i64>,
    pub parent_index_number: Option<i64>,
    pub premiere_date: Option<String>,
    pub channel_id: Option<String>,
}

impl MediaItem {
    /// Whether this item is playable media rather than a folder to descend
    /// into.
    pub fn is_playable(&self) -> bool {
        matches!(
            self.item_type.as_str(),
            "Movie" | "Episode" | "Audio" | "Channel" | "Program" | "Video"
        )
    }
}

/// One page of `/Items` results.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ItemsPage {
    pub items: Vec<MediaItem>,
    pub total_record_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthUser {
    id: String,
}

/// Library folder kind, used to pick which item types a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryType {
    Movies,
    TvShows,
    LiveTv,
}

impl LibraryType {
    /// Parses the upstream `CollectionType` value. Deliberately narrow:
    /// unknown kinds map to `None`, which selects the mixed default listing
    /// and is dropped from pager links rather than echoed back verbatim.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "movies" => Some(LibraryType::Movies),
            "tvshows" => Some(LibraryType::TvShows),
            "livetv" => Some(LibraryType::LiveTv),
            _ => None,
        }
    }

    /// Query-string value for round-tripping through page links.
    pub fn as_str(self) -> &'static str {
        match self {
            LibraryType::Movies => "movies",
            LibraryType::TvShows => "tvshows",
            LibraryType::LiveTv => "livetv",
        }
    }
}

/// Parameters for one `/Items` listing page.
#[derive(Debug, Clone)]
pub struct ItemsQuery {
    pub parent_id: String,
    pub start_index: usize,
    pub limit: usize,
    pub library_type: Option<LibraryType>,
}

/// Parameters for one search results page.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub term: String,
    pub start_index: usize,
    pub limit: usize,
}

/// Item types included when searching across the whole library.
const SEARCH_INCLUDE_TYPES: &str = "Movie,Series,Episode,Audio,Channel,Program";

/// Picks the `IncludeItemTypes` filter for a listing.
///
/// The library kind sets the default; the parent item's own type overrides it
/// so that opening a series shows seasons, a season shows episodes, and a
/// live-TV channel shows its programs.
fn include_item_types(library_type: Option<LibraryType>, parent_type: Option<&str>) -> &'static str {
    match parent_type {
        Some("Season") => return "Episode",
        Some("Channel") => return "Program",
        Some("Series") => return "Season",
        _ => {}
    }
    match library_type {
        Some(LibraryType::Movies) => "Movie",
        Some(LibraryType::TvShows) => "Series,Season",
        Some(LibraryType::LiveTv) => "Channel",
        None => "Series,Season,Episode,Movie,Audio,Channel,Program",
    }
}

/// Sorts library views case-insensitively by name.
fn sort_views(mut views: Vec<MediaItem>) -> Vec<MediaItem> {
    views.sort_by_key(|view| view.name.to_lowercase());
    views
}

/// Client for the upstream API. Cheap to clone; all methods take one round
/// trip and a bounded timeout.
#[derive(Clone)]
pub struct JellyfinClient {
    client: reqwest::Client,
    config: UpstreamConfig,
    identity: ClientIdentity,
}

impl JellyfinClient {
    /// Creates a client honoring the configured trust policy and timeouts.
    pub fn new(config: UpstreamConfig, identity: ClientIdentity) -> Self {
        let client = reqwest::Client::builder()
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

    /// Logs in with username and password.
    ///
    /// # Errors
    /// - `ApiError::InvalidCredentials` - Upstream answered 401
    /// - `ApiError::Rejected` - Any other non-2xx status
    /// - `ApiError::Http` - Transport failure or malformed response body
    pub async fn authenticate_by_name(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthSession, ApiError> {
        let endpoint = "/Users/AuthenticateByName";
        let response = self
            .client
            .post(format!("{}{}", self.config.base(), endpoint))
            .header(AUTHORIZATION_HEADER, authorization_value(&self.identity, None))
            .json(&serde_json::json!({ "Username": username, "Pw": password }))
            .timeout(self.config.search_timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::InvalidCredentials);
        }
        if !status.is_success() {
            warn!(%endpoint, %status, "upstream rejected login");
            return Err(ApiError::Rejected {
                endpoint: endpoint.to_string(),
                status,
            });
        }

        let body: AuthResponse = response.json().await?;
        Ok(AuthSession {
            user_id: body.user.id,
            access_token: Credential::new(body.access_token),
        })
    }

    /// Lists the user's library views, sorted by name.
    ///
    /// # Errors
    /// - `ApiError::Rejected` - Non-2xx upstream status
    /// - `ApiError::Http` - Transport failure or malformed response body
    pub async fn user_views(&self, session: &AuthSession) -> Result<Vec<MediaItem>, ApiError> {
        let endpoint = format!("/Users/{}/Views", session.user_id);
        let page: ItemsPage = self
            .get_json(
                &endpoint,
                &[],
                &session.access_token,
                self.config.items_timeout,
            )
            .await?;
        Ok(sort_views(page.items))
    }

    /// Fetches a single item by id. Used to auto-detect what a folder
    /// contains before listing it.
    ///
    /// # Errors
    /// - `ApiError::Rejected` - Non-2xx upstream status
    /// - `ApiError::Http` - Transport failure or malformed response body
    pub async fn item(&self, session: &AuthSession, item_id: &str) -> Result<MediaItem, ApiError> {
        let endpoint = format!("/Items/{item_id}");
        self.get_json(
            &endpoint,
            &[],
            &session.access_token,
            self.config.items_timeout,
        )
        .await
    }

    /// Lists one page of a library folder's children.
    ///
    /// The parent lookup is best-effort: if it fails the listing proceeds
    /// with the library-level type filter, matching upstream tolerance for
    /// virtual folders that have no item record.
    ///
    /// # Errors
    /// - `ApiError::Rejected` - Non-2xx upstream status on the listing call
    /// - `ApiError::Http` - Transport failure or malformed response body
    pub async fn items(
        &self,
        session: &AuthSession,
        query: &ItemsQuery,
    ) -> Result<ItemsPage, ApiError> {
        let parent = self.item(session, &query.parent_id).await.ok();
        let parent_type = parent.as_ref().map(|item| item.item_type.as_str());
        let include = include_item_types(query.library_type, parent_type);

        let params = [
            ("ParentId", query.parent_id.clone()),
            ("startIndex", query.start_index.to_string()),
            ("limit", query.limit.to_string()),
            ("Recursive", "false".to_string()),
            ("IncludeItemTypes", include.to_string()),
            ("SortBy", "SortName".to_string()),
            ("SortOrder", "Ascending".to_string()),
            (
                "Fields",
                "BasicSyncInfo,ParentIndexNumber,IndexNumber,PremiereDate,ChannelId".to_string(),
            ),
            ("ImageTypeLimit", "1".to_string()),
            ("UserId", session.user_id.clone()),
        ];

        self.get_json(
            "/Items",
            &params,
            &session.access_token,
            self.config.items_timeout,
        )
        .await
    }

    /// Searches the whole library for a term, one page at a time.
    ///
    /// # Errors
    /// - `ApiError::Rejected` - Non-2xx upstream status
    /// - `ApiError::Http` - Transport failure or malformed response body
    pub async fn search(
        &self,
        session: &AuthSession,
        query: &SearchQuery,
    ) -> Result<ItemsPage, ApiError> {
        let params = [
            ("searchTerm", query.term.clone()),
            ("SortBy", "SortName".to_string()),
            ("SortOrder", "Ascending".to_string()),
            ("Recursive", "true".to_string()),
            ("IncludeItemTypes", SEARCH_INCLUDE_TYPES.to_string()),
            ("startIndex", query.start_index.to_string()),
            ("limit", query.limit.to_string()),
            ("userId", session.user_id.clone()),
        ];

        self.get_json(
            "/Items",
            &params,
            &session.access_token,
            self.config.search_timeout,
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        credential: &Credential,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .get(format!("{}{}", self.config.base(), endpoint))
            .query(params)
            .header(
                AUTHORIZATION_HEADER,
                authorization_value(&self.identity, Some(credential)),
            )
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%endpoint, %status, "upstream API call rejected");
            return Err(ApiError::Rejected {
                endpoint: endpoint.to_string(),
                status,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_types_by_library_kind() {
        assert_eq!(include_item_types(Some(LibraryType::Movies), None), "Movie");
        assert_eq!(
            include_item_types(Some(LibraryType::TvShows), None),
            "Series,Season"
        );
        assert_eq!(
            include_item_types(Some(LibraryType::LiveTv), None),
            "Channel"
        );
        assert_eq!(
            include_item_types(None, None),
            "Series,Season,Episode,Movie,Audio,Channel,Program"
        );
    }

    #[test]
    fn test_parent_type_overrides_library_kind() {
        assert_eq!(
            include_item_types(Some(LibraryType::TvShows), Some("Season")),
            "Episode"
        );
        assert_eq!(
            include_item_types(Some(LibraryType::LiveTv), Some("Channel")),
            "Program"
        );
        assert_eq!(include_item_types(None, Some("Series")), "Season");
        // Unknown parent types defer to the library kind
        assert_eq!(
            include_item_types(Some(LibraryType::Movies), Some("Folder")),
            "Movie"
        );
    }

    #[test]
    fn test_library_type_parse() {
        assert_eq!(LibraryType::parse("movies"), Some(LibraryType::Movies));
        assert_eq!(LibraryType::parse("livetv"), Some(LibraryType::LiveTv));
        assert_eq!(LibraryType::parse("music"), None);
    }

    #[test]
    fn test_views_sorted_case_insensitively() {
        let views = vec![
            MediaItem {
                name: "shows".to_string(),
                ..MediaItem::default()
            },
            MediaItem {
                name: "Movies".to_string(),
                ..MediaItem::default()
            },
            MediaItem {
                name: "Live TV".to_string(),
                ..MediaItem::default()
            },
        ];
        let sorted = sort_views(views);
        let names: Vec<&str> = sorted.iter().map(|view| view.name.as_str()).collect();
        assert_eq!(names, vec!["Live TV", "Movies", "shows"]);
    }

    #[test]
    fn test_items_page_deserializes_upstream_payload() {
        let payload = serde_json::json!({
            "Items": [
                {
                    "Id": "abc",
                    "Name": "Some Movie",
                    "Type": "Movie",
                    "PremiereDate": "2001-01-01T00:00:00Z"
                },
                {
                    "Id": "def",
                    "Name": "Pilot",
                    "Type": "Episode",
                    "IndexNumber": 1,
                    "ParentIndexNumber": 1
                }
            ],
            "TotalRecordCount": 2
        });

        let page: ItemsPage = serde_json::from_value(payload).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].item_type, "Movie");
        assert!(page.items[0].is_playable());
        assert_eq!(page.items[1].index_number, Some(1));
        assert_eq!(page.total_record_count, Some(2));
    }

    #[test]
    fn test_auth_response_deserializes() {
        let payload = serde_json::json!({
            "AccessToken": "tok",
            "User": { "Id": "u1", "Name": "alice" }
        });
        let parsed: AuthResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.access_token, "tok");
        assert_eq!(parsed.user.id, "u1");
    }
}
