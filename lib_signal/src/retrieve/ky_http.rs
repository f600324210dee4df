//! # HTTP Retrieval Utilities
//!
//! A thin asynchronous client for the SPaT service built on `reqwest`, with
//! `reqwest-middleware` exponential-backoff retries, bearer injection and a
//! standardized response container. It also opens the long-lived streaming
//! GET the live ingestor reads server-sent events from.

use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Anything that can go wrong while talking to the service.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Base URL or joined path is not a valid URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    /// The request could not be sent (after retries).
    #[error("request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),
    /// Building the client or reading/decoding a body failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Could not serialize a request body.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    /// No bearer token could be obtained.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The server answered with a non-2xx status.
    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        /// Numeric status code.
        status: u16,
        /// Response body, if it could be read.
        body: String,
    },
}

/// A standardized container for API responses.
///
/// This struct wraps the deserialized data along with metadata about the
/// HTTP transaction, such as status codes and headers.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

impl<T> ApiResponse<T> {
    /// Turns a non-success response into [`ConnectionError::Status`] and
    /// returns the data otherwise.
    pub fn into_data(self) -> Result<T, ConnectionError> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err(ConnectionError::Status {
                status: self.status,
                body: self.error_body.unwrap_or_default(),
            }),
        }
    }
}

/// Retrying HTTP client bound to one base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a new `ApiClient` with an exponential-backoff retry policy
    /// (3 retries on transient failures).
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self, ConnectionError> {
        let url = Url::parse(base_url)?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        // No overall timeout: the live stream response stays open indefinitely.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent("signal2x/0.1")
            .build()?;
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
            auth_token,
        })
    }

    /// Same client, but sending `token` as bearer credential.
    pub fn with_auth_token(&self, token: String) -> Self {
        Self {
            inner: self.inner.clone(),
            base_url: self.base_url.clone(),
            auth_token: Some(token),
        }
    }

    /// The base URL every path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ConnectionError> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn authorize(&self, req: reqwest_middleware::RequestBuilder) -> reqwest_middleware::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => req,
        }
    }

    /// Performs a JSON request and captures the response.
    ///
    /// Non-2xx statuses are not errors here; they come back with
    /// `success == false` and the raw body in `error_body`.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        headers: Option<HeaderMap>,
        body: Option<B>,
    ) -> Result<ApiResponse<T>, ConnectionError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let mut req = self.inner.request(method, self.url(path, query)?);
        req = req.header(ACCEPT, "application/json");

        if let Some(h) = headers {
            req = req.headers(h);
        }
        req = self.authorize(req);

        if let Some(b) = body {
            let json_body = serde_json::to_string(&b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        Self::capture(req.send().await?).await
    }

    /// Posts an `application/x-www-form-urlencoded` body, optionally with HTTP
    /// Basic client authentication. Used for the token endpoint.
    pub async fn post_form<T>(
        &self,
        path: &str,
        form: &[(&str, &str)],
        basic_auth: Option<(&str, &str)>,
    ) -> Result<ApiResponse<T>, ConnectionError>
    where
        T: DeserializeOwned,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();

        let mut req = self
            .inner
            .post(self.url(path, &[])?)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encoded);

        req = match basic_auth {
            Some((user, password)) => req.basic_auth(user, Some(password)),
            None => self.authorize(req),
        };

        Self::capture(req.send().await?).await
    }

    /// Opens a long-lived `text/event-stream` GET. The body is left unread for
    /// the caller; a non-2xx status is returned as [`ConnectionError::Status`].
    pub async fn open_stream(&self, path: &str) -> Result<reqwest::Response, ConnectionError> {
        let req = self
            .authorize(self.inner.get(self.url(path, &[])?))
            .header(ACCEPT, "text/event-stream");

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn capture<T: DeserializeOwned>(response: reqwest::Response) -> Result<ApiResponse<T>, ConnectionError> {
        let status = response.status();
        let resp_headers = response.headers().clone();

        if status.is_success() {
            let data = response.json::<T>().await?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            // Capture the error body as a string for debugging
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_base_url_is_an_error() {
        assert!(matches!(ApiClient::new("not a url", None), Err(ConnectionError::Url(_))));
    }

    #[test]
    fn paths_and_query_are_joined_onto_base() {
        let api = ApiClient::new("https://spat.example.org", None).unwrap();
        assert_eq!(api.base_url().as_str(), "https://spat.example.org/");
        assert_eq!(api.with_auth_token("tok".into()).base_url(), api.base_url());
        let url = api
            .url("/spatmap/spat-ui-backend/v1/map-data/spatBoxes", &[("bbox", "8.6,49.7,8.7,49.9")])
            .unwrap();

        assert_eq!(url.path(), "/spatmap/spat-ui-backend/v1/map-data/spatBoxes");
        assert_eq!(url.query_pairs().next().unwrap().1, "8.6,49.7,8.7,49.9");
    }

    #[test]
    fn failed_response_converts_to_status_error() {
        let response: ApiResponse<serde_json::Value> = ApiResponse {
            data: None,
            error_body: Some("nope".into()),
            status: 403,
            success: false,
            headers: HeaderMap::new(),
        };
        match response.into_data() {
            Err(ConnectionError::Status { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "nope");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
