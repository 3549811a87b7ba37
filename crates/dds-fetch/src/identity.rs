//! Identity collaborator seam.
//!
//! Credential acquisition and token refresh live outside this crate; the
//! request layer only needs a bearer token and a way to issue an
//! authenticated GET.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};

use crate::{ClientConfig, FetchError};

/// Capability to perform authenticated requests against the catalog.
#[async_trait]
pub trait Identity: Send + Sync + std::fmt::Debug {
    /// Returns a bearer token valid for the next request.
    async fn access_token(&self) -> Result<String, FetchError>;

    /// Performs a GET with the given headers.
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<Response, FetchError>;
}

/// Identity backed by a token acquired elsewhere.
#[derive(Clone)]
pub struct BearerIdentity {
    client: Client,
    token: String,
}

impl BearerIdentity {
    /// Creates an identity from an HTTP client and a pre-acquired token.
    #[must_use]
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
        }
    }

    /// Creates an identity with an HTTP client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &ClientConfig, token: impl Into<String>) -> Result<Self, FetchError> {
        Ok(Self::new(config.http_client()?, token))
    }
}

impl std::fmt::Debug for BearerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerIdentity")
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Identity for BearerIdentity {
    async fn access_token(&self) -> Result<String, FetchError> {
        if self.token.is_empty() {
            return Err(FetchError::Auth("no access token configured".to_string()));
        }
        Ok(self.token.clone())
    }

    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<Response, FetchError> {
        Ok(self.client.get(url).headers(headers.clone()).send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_token_is_an_auth_error() {
        let identity = BearerIdentity::new(Client::new(), "");
        assert!(matches!(
            identity.access_token().await,
            Err(FetchError::Auth(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let identity = BearerIdentity::new(Client::new(), "secret-token");
        let rendered = format!("{identity:?}");
        assert!(!rendered.contains("secret-token"));
    }
}
