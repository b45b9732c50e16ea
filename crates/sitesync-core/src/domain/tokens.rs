//! Authentication token pair

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued by the auth server
///
/// Both tokens are opaque. `Debug` redacts them so a stray `?tokens` in a
/// log statement cannot leak credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// True when there is an access token to present
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}
