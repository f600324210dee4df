//! # Data Retrieval Module
//!
//! HTTP access to the SPaT service: the retrying `ApiClient` and the token
//! acquisition every authenticated call starts with.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: generic HTTP `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, with automatic retries and exponential backoff.
//! - **`credentials`**: yields the bearer token, either from the OAuth2
//!   client-credentials grant or a pre-issued token.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;
/// Bearer token acquisition.
pub mod credentials;

pub use credentials::{Credentials, TOKEN_PATH};
pub use ky_http::{ApiClient, ApiResponse, ConnectionError};
