//! Integration tests for Narrowfin
//!
//! Exercise the stream relay and the web layer against an in-process fake
//! upstream server: byte-for-byte forwarding, parameter resolution on the
//! wire, failure mapping, and upstream connection release on disconnect.

#[path = "integration/fake_upstream.rs"]
mod fake_upstream;

#[path = "integration/relay_roundtrip.rs"]
mod relay_roundtrip;

#[path = "integration/web_flow.rs"]
mod web_flow;
