//! Authorization header construction for the upstream media server.
//!
//! The upstream API authenticates every request through a single structured
//! header value. Building that value is kept as a pure function so the wire
//! format can be tested without any network I/O.

use std::fmt;

/// Header name carrying the structured authorization value.
pub const AUTHORIZATION_HEADER: &str = "X-Emby-Authorization";

/// Identity reported to the upstream server for this client installation.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client: String,
    pub device: String,
    pub device_id: String,
    pub version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            client: "Narrowfin".to_string(),
            device: "Narrowfin Web".to_string(),
            device_id: "narrowfin".to_string(),
            version: "1.0".to_string(),
        }
    }
}

/// Opaque bearer token for an authenticated upstream session.
///
/// Held only for the lifetime of the session that owns it. The token value
/// never appears in `Debug` output or logs.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value, for embedding in the authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Serializes the `X-Emby-Authorization` header value.
///
/// Produces `MediaBrowser Client="..", Device="..", DeviceId="..",
/// Version=".."`, with a trailing `Token=".."` clause when a credential is
/// present (all requests after login carry one).
pub fn authorization_value(identity: &ClientIdentity, credential: Option<&Credential>) -> String {
    let mut value = format!(
        r#"MediaBrowser Client="{}", Device="{}", DeviceId="{}", Version="{}""#,
        identity.client, identity.device, identity.device_id, identity.version
    );
    if let Some(credential) = credential {
        value.push_str(&format!(r#", Token="{}""#, credential.expose()));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> ClientIdentity {
        ClientIdentity {
            client: "Narrowfin".to_string(),
            device: "Narrowfin Web".to_string(),
            device_id: "narrowfin".to_string(),
            version: "1.0".to_string(),
        }
    }

    #[test]
    fn test_header_value_without_token() {
        let value = authorization_value(&test_identity(), None);
        assert_eq!(
            value,
            r#"MediaBrowser Client="Narrowfin", Device="Narrowfin Web", DeviceId="narrowfin", Version="1.0""#
        );
    }

    #[test]
    fn test_header_value_with_token() {
        let credential = Credential::new("abc123");
        let value = authorization_value(&test_identity(), Some(&credential));
        assert!(value.ends_with(r#", Token="abc123""#));
        assert!(value.starts_with(r#"MediaBrowser Client="Narrowfin""#));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("secret-token"));
    }
}
