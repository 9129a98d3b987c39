//! Narrowfin Web - Browser-facing front end
//!
//! Server-rendered pages for login, library browsing and search, plus the
//! `/proxy_stream` endpoint that relays media bytes from the upstream server.

pub mod handlers;
pub mod server;
pub mod session;
pub mod templates;

pub use server::{AppState, router, run_server};
pub use session::SessionStore;
