use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH},
    Method, Url,
};
use tokio::io::AsyncReadExt;

use crate::{capture::Capture, Body, FailureCause, Result, RetryError, Scope};

const READ_CHUNK: usize = 8 * 1024;

/// Outgoing request handled by [`RetryClient::execute`](crate::RetryClient::execute).
///
/// Carries the [`Scope`] that bounds the whole call; cancel the scope to
/// abandon the call between or during attempts.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
    content_length: Option<u64>,
    scope: Scope,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            content_length: None,
            scope: Scope::new(),
        }
    }

    /// Parses `url` and builds a request for it.
    ///
    /// # Errors
    ///
    /// Returns a fatal error when `url` cannot be parsed.
    pub fn parse(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(RetryError::fatal)?;
        Ok(Self::new(method, url))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body. In-memory bodies also fix the content length.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        let body = body.into();
        self.content_length = body.content_length();
        self.body = Some(body);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Makes the body resendable by buffering a one-shot reader in memory.
    ///
    /// Requests without a body, or whose body is already replayable, are
    /// left untouched. Otherwise up to `ceiling` bytes are kept (all of them
    /// when `ceiling` is zero), the reader is drained to its end and dropped,
    /// and the kept bytes become the body.
    ///
    /// # Errors
    ///
    /// Fails fatally when the reader errors, or when it yields more than
    /// `ceiling` bytes; in the latter case the truncated body is still
    /// installed.
    pub async fn prepare_body(&mut self, ceiling: u64) -> Result<()> {
        let Some(mut reader) = self.body.as_mut().and_then(Body::take_reader) else {
            return Ok(());
        };

        let mut capture = Capture::new(ceiling);
        let mut chunk = vec![0; READ_CHUNK];
        loop {
            let read = reader
                .read(&mut chunk)
                .await
                .map_err(|err| RetryError::fatal(FailureCause::ReadRequestBody(err)))?;
            if read == 0 {
                break;
            }
            capture.push(&chunk[..read]);
        }
        drop(reader);

        let exceeded = capture.exceeded();
        let size = capture.observed();
        let bytes = capture.finish();
        self.content_length = Some(bytes.len() as u64);
        self.body = Some(Body::from(bytes));

        if exceeded {
            return Err(RetryError::fatal(FailureCause::RequestTooLarge { size }));
        }
        Ok(())
    }

    /// Builds the `reqwest` request for one attempt, regenerating the body.
    pub(crate) fn to_transport(&self) -> Result<reqwest::Request> {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();

        if let Some(body) = &self.body {
            let body = body
                .to_transport()
                .map_err(|err| RetryError::fatal(FailureCause::ResetRequestBody(err)))?;
            if let Some(length) = self.content_length {
                request
                    .headers_mut()
                    .insert(CONTENT_LENGTH, HeaderValue::from(length));
            }
            *request.body_mut() = Some(body);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        pin::Pin,
        task::{Context, Poll},
    };

    use reqwest::{header::CONTENT_LENGTH, Method};
    use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

    use super::Request;
    use crate::{Body, BodyReader, FailureCause};

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended early",
            )))
        }
    }

    fn upload() -> Request {
        Request::parse(Method::POST, "http://localhost/upload").expect("url must parse")
    }

    async fn regenerate(request: &Request) -> Vec<u8> {
        let mut reader = request
            .body()
            .expect("body must be present")
            .regenerate()
            .expect("body must regenerate");
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.expect("read must succeed");
        out
    }

    #[tokio::test]
    async fn bodyless_request_is_untouched() {
        let mut request = upload();
        request.prepare_body(0).await.expect("prepare must succeed");
        assert!(request.body().is_none());
        assert_eq!(request.content_length(), None);
    }

    #[tokio::test]
    async fn reader_body_becomes_replayable() {
        let mut request = upload().with_body(Body::from_reader(&b"xyz"[..]));
        request.prepare_body(0).await.expect("prepare must succeed");

        assert_eq!(request.content_length(), Some(3));
        for _ in 0..5 {
            assert_eq!(regenerate(&request).await, b"xyz");
        }
    }

    #[tokio::test]
    async fn replay_factory_is_respected() {
        let mut request = upload().with_body(Body::replayable(|| {
            Ok(Box::new(&b"streamed"[..]) as BodyReader)
        }));
        request.prepare_body(1).await.expect("prepare must succeed");

        assert_eq!(request.content_length(), None);
        assert!(request.body().and_then(Body::as_bytes).is_none());
        assert_eq!(regenerate(&request).await, b"streamed");
    }

    #[tokio::test]
    async fn oversized_body_reports_observed_size() {
        let mut request = upload().with_body(Body::from_reader(&b"xyz"[..]));
        let err = request.prepare_body(1).await.expect_err("prepare must fail");

        assert!(err.is_fatal());
        assert!(matches!(err.cause(), FailureCause::RequestTooLarge { size: 3 }));
        assert!(err.to_string().contains('3'));
        assert_eq!(regenerate(&request).await, b"x");
    }

    #[tokio::test]
    async fn body_one_past_ceiling_fails() {
        let payload: &'static [u8] = b"0123456789";
        let mut request = upload().with_body(Body::from_reader(payload));
        let err = request.prepare_body(9).await.expect_err("prepare must fail");
        assert!(matches!(err.cause(), FailureCause::RequestTooLarge { size: 10 }));

        let mut request = upload().with_body(Body::from_reader(payload));
        request.prepare_body(10).await.expect("exact ceiling must pass");
    }

    #[tokio::test]
    async fn reader_failure_is_fatal() {
        let mut request = upload().with_body(Body::from_reader(FailingReader));
        let err = request.prepare_body(0).await.expect_err("prepare must fail");

        assert!(err.is_fatal());
        match err.cause() {
            FailureCause::ReadRequestBody(inner) => {
                assert_eq!(inner.kind(), io::ErrorKind::UnexpectedEof)
            }
            other => panic!("unexpected cause: {other:?}"),
        }
    }

    #[test]
    fn transport_request_carries_content_length() {
        let request = upload().with_body("payload");
        let outgoing = request.to_transport().expect("request must build");
        assert_eq!(outgoing.headers()[CONTENT_LENGTH], "7");
        let bytes = outgoing.body().and_then(reqwest::Body::as_bytes);
        assert_eq!(bytes, Some(&b"payload"[..]));
    }

    #[test]
    fn failing_factory_surfaces_reset_error() {
        let request = upload().with_body(Body::replayable(|| {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "gone"))
        }));
        let err = request.to_transport().expect_err("request must not build");
        assert!(err.is_fatal());
        assert!(matches!(err.cause(), FailureCause::ResetRequestBody(_)));
    }
}
