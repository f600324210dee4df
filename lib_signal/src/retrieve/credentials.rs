//! # Credentials
//!
//! The SPaT service wants a bearer token on every call. It hands those out
//! through a Keycloak-style client-credentials grant; for testing (or when a
//! token was obtained elsewhere) a fixed token can be configured instead.

use std::fmt;

use serde::Deserialize;

use super::ky_http::{ApiClient, ConnectionError};

/// Token endpoint, relative to the service base URL.
pub const TOKEN_PATH: &str = "/auth/realms/spat/protocol/openid-connect/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Where bearer tokens come from.
#[derive(Clone)]
pub enum Credentials {
    /// A token obtained out of band; used as-is.
    Static(String),
    /// OAuth2 client-credentials grant with HTTP Basic client authentication.
    ClientCredentials {
        /// OAuth client id.
        client_id: String,
        /// OAuth client secret.
        client_secret: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Static(_) => f.write_str("Credentials::Static(<redacted>)"),
            Credentials::ClientCredentials { client_id, .. } => f
                .debug_struct("Credentials::ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
        }
    }
}

impl Credentials {
    /// Fetches (or returns) a bearer token. Any failure is reported as
    /// [`ConnectionError::Auth`] so callers can tell it apart from the
    /// stream itself failing.
    pub async fn bearer(&self, api: &ApiClient) -> Result<String, ConnectionError> {
        match self {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::ClientCredentials { client_id, client_secret } => {
                let response = api
                    .post_form::<TokenResponse>(
                        TOKEN_PATH,
                        &[("grant_type", "client_credentials")],
                        Some((client_id.as_str(), client_secret.as_str())),
                    )
                    .await
                    .map_err(|e| ConnectionError::Auth(e.to_string()))?;

                match response.data {
                    Some(token) if response.success => {
                        log::debug!("Obtained access token for client {}", client_id);
                        Ok(token.access_token)
                    }
                    _ => Err(ConnectionError::Auth(format!(
                        "token endpoint answered {}: {}",
                        response.status,
                        response.error_body.unwrap_or_default()
                    ))),
                }
            }
        }
    }
}
