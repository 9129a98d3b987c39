//! HTTP handlers for the Narrowfin web interface

pub mod pages;
pub mod streaming;

pub use pages::{browse_items, libraries_index, login_form, login_submit, play_item, search_items};
pub use streaming::proxy_stream;
