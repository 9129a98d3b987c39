//! Narrowfin Core - Upstream media-server client and stream relay
//!
//! Wraps a Jellyfin-compatible HTTP API: authentication, library and item
//! listing, search, and the streaming relay that forwards media bytes from
//! the upstream server without buffering full payloads.

pub mod api;
pub mod auth;
pub mod config;
pub mod relay;
pub mod tracing_setup;

pub use api::{ApiError, AuthSession, JellyfinClient};
pub use auth::{ClientIdentity, Credential};
pub use config::NarrowfinConfig;
pub use relay::{DeliveryMode, ItemType, RelayError, StreamRelay, StreamRequest};
