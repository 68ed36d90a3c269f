//! `retryable-http` makes HTTP requests resilient to transient failures.
//!
//! [`RetryClient`] wraps a transport (`reqwest::Client` by default) and
//! drives each request through bounded attempts:
//! - the request body is buffered once so every attempt resends it verbatim
//! - every attempt is paced by a jittered request delay and bounded by a
//!   per-attempt timeout, and the whole call by a retry timeout
//! - failures are classified as retryable or fatal; retryable ones wait for
//!   the server's `Retry-After` or an exponential backoff
//! - responses are buffered in memory, so they stay readable after errors
//!
//! ```no_run
//! use retryable_http::RetryClient;
//!
//! # async fn run() -> retryable_http::Result<()> {
//! let client = RetryClient::new();
//! let response = client.get("https://example.com/").await?;
//! println!("{} {}", response.status(), response.text());
//! # Ok(())
//! # }
//! ```

mod body;
mod capture;
mod client;
pub mod delay;
mod error;
mod options;
mod request;
mod response;
mod retry_after;
mod scope;
pub mod status;
mod transport;
mod unwind;

pub use body::{Body, BodyFactory, BodyReader};
pub use client::RetryClient;
pub use error::{FailureCause, RetryError};
pub use options::{ClientPolicy, ConfigError};
pub use request::Request;
pub use response::Response;
pub use retry_after::retry_after;
pub use scope::{Interrupted, Scope};
pub use transport::{BoxError, Transport};

pub use reqwest::{header, Method, StatusCode, Url};
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, RetryError>;
