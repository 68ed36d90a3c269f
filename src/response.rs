use std::io::Cursor;

use bytes::Bytes;
use reqwest::{header::HeaderMap, StatusCode, Url, Version};
use serde::de::DeserializeOwned;

use crate::{capture::Capture, FailureCause, Result, RetryError, Scope};

/// Response whose body has been read fully into memory.
///
/// The body can be read any number of times, including from a response
/// attached to a [`RetryError`].
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    url: Url,
    body: Bytes,
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Length of the buffered body.
    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    /// Fresh reader over the buffered body.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.body.clone())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Reads `response` into memory and classifies it.
///
/// Up to `ceiling` bytes are kept (all when zero) and the rest is drained to
/// measure the full size. Classification, in order:
/// 1. body read failed: retryable
/// 2. status in `retry_status`: retryable
/// 3. status 400 or above: fatal
/// 4. body larger than `ceiling`: fatal
/// 5. otherwise success
///
/// A body read counts as failed when it errors, including one cut short by `scope`
/// ending. Every error carries the buffered response, so its headers stay
/// visible to the retry delay.
pub(crate) async fn capture(
    mut response: reqwest::Response,
    retry_status: &[u16],
    ceiling: u64,
    scope: &Scope,
) -> Result<Response> {
    let status = response.status();
    let mut capture = Capture::new(ceiling);
    let mut read_error = None;
    loop {
        match scope.run(response.chunk()).await {
            Ok(Ok(Some(chunk))) => capture.push(&chunk),
            Ok(Ok(None)) => break,
            Ok(Err(err)) => {
                read_error = Some(FailureCause::ReadResponseBody(err));
                break;
            }
            Err(interrupted) => {
                read_error = Some(FailureCause::ResponseBodyInterrupted(interrupted));
                break;
            }
        }
    }

    let exceeded = capture.exceeded();
    let size = capture.observed();
    let buffered = Box::new(Response {
        status,
        version: response.version(),
        headers: std::mem::take(response.headers_mut()),
        url: response.url().clone(),
        body: capture.finish(),
    });
    drop(response);

    let failure = if let Some(cause) = read_error {
        RetryError::retryable(cause)
    } else if retry_status.contains(&status.as_u16()) {
        RetryError::retryable(FailureCause::Status(status))
    } else if status.as_u16() >= 400 {
        RetryError::fatal(FailureCause::Status(status))
    } else if exceeded {
        RetryError::fatal(FailureCause::ResponseTooLarge { size })
    } else {
        return Ok(*buffered);
    };
    Err(failure.with_response(Some(buffered)))
}

#[cfg(test)]
mod tests {
    use std::{io, time::Duration};

    use bytes::Bytes;
    use futures_util::{stream, StreamExt};
    use reqwest::{header::RETRY_AFTER, StatusCode};
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    use super::capture;
    use crate::{scope::Interrupted, FailureCause, Scope};

    fn response(status: u16, body: &'static str) -> reqwest::Response {
        http::Response::builder()
            .status(status)
            .header(RETRY_AFTER, "3")
            .body(body)
            .expect("response must build")
            .into()
    }

    fn broken_response(status: u16) -> reqwest::Response {
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"par")),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection reset")),
        ]);
        http::Response::builder()
            .status(status)
            .body(reqwest::Body::wrap_stream(chunks))
            .expect("response must build")
            .into()
    }

    fn stalled_response(status: u16) -> reqwest::Response {
        let chunks = stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"par"))])
            .chain(stream::pending());
        http::Response::builder()
            .status(status)
            .header(RETRY_AFTER, "1")
            .body(reqwest::Body::wrap_stream(chunks))
            .expect("response must build")
            .into()
    }

    #[tokio::test]
    async fn success_buffers_body() {
        let response = capture(response(200, "xyz"), &[], 0, &Scope::new())
            .await
            .expect("capture must succeed");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_length(), 3);
        assert_eq!(response.text(), "xyz");
        assert_eq!(response.headers()[RETRY_AFTER], "3");

        let mut first = String::new();
        response
            .reader()
            .read_to_string(&mut first)
            .await
            .expect("read must succeed");
        assert_eq!(first, response.text());
    }

    #[tokio::test]
    async fn oversized_body_is_fatal_and_truncated() {
        let err = capture(response(200, "xyz"), &[], 1, &Scope::new())
            .await
            .expect_err("capture must fail");
        assert!(err.is_fatal());
        assert!(matches!(err.cause(), FailureCause::ResponseTooLarge { size: 3 }));
        assert!(err.to_string().contains('3'));

        let response = err.into_response().expect("response must be attached");
        assert_eq!(response.content_length(), 1);
        assert_eq!(&response.body()[..], b"x");
    }

    #[tokio::test]
    async fn client_error_is_fatal() {
        let err = capture(response(400, "bad"), &[], 0, &Scope::new())
            .await
            .expect_err("capture must fail");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("400"));
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.response().map(|r| r.text()), Some("bad".to_owned()));
    }

    #[tokio::test]
    async fn retry_set_wins_over_client_error() {
        let err = capture(response(400, "bad"), &[400], 0, &Scope::new())
            .await
            .expect_err("capture must fail");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn retry_set_can_include_success() {
        let err = capture(response(200, "ok"), &[200], 0, &Scope::new())
            .await
            .expect_err("capture must fail");
        assert!(err.is_retryable());
        assert_eq!(err.cause().to_string(), "invalid status code (200)");
    }

    #[tokio::test]
    async fn status_outranks_size_violation() {
        let err = capture(response(503, "unavailable"), &[503], 1, &Scope::new())
            .await
            .expect_err("capture must fail");
        assert!(err.is_retryable());
        assert!(matches!(err.cause(), FailureCause::Status(_)));
    }

    #[tokio::test]
    async fn body_read_failure_is_retryable() {
        let err = capture(broken_response(200), &[], 0, &Scope::new())
            .await
            .expect_err("capture must fail");
        assert!(err.is_retryable());
        assert!(matches!(err.cause(), FailureCause::ReadResponseBody(_)));

        let response = err.into_response().expect("partial response must be attached");
        assert_eq!(&response.body()[..], b"par");
    }

    #[tokio::test]
    async fn json_body_decodes() {
        let response = capture(response(200, r#"{"ok":true}"#), &[], 0, &Scope::new())
            .await
            .expect("capture must succeed");
        let value: serde_json::Value = response.json().expect("body must be json");
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn stalled_body_keeps_partial_response() {
        let scope = Scope::new().with_timeout(Duration::from_millis(20));
        let err = capture(stalled_response(503), &[503], 0, &scope)
            .await
            .expect_err("capture must fail");

        assert!(err.is_retryable());
        assert!(matches!(
            err.cause(),
            FailureCause::ResponseBodyInterrupted(Interrupted::DeadlineExceeded)
        ));
        let response = err.into_response().expect("partial response must be attached");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[RETRY_AFTER], "1");
        assert_eq!(&response.body()[..], b"par");
    }
}
