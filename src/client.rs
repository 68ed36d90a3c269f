use std::{fmt, panic::AssertUnwindSafe};

use futures_util::FutureExt;
use reqwest::{
    header::{HeaderValue, CONTENT_TYPE},
    Method,
};

use crate::{
    delay, response,
    retry_after::retry_after,
    scope::{Interrupted, Scope},
    unwind, Body, ClientPolicy, ConfigError, FailureCause, Request, Response, Result, RetryError,
    Transport,
};

/// HTTP client that retries transient failures.
///
/// Wraps a [`Transport`] (a plain `reqwest::Client` by default) and drives
/// every request through bounded, delayed, jittered attempts as configured
/// by its [`ClientPolicy`]. A single client can serve concurrent calls; the
/// policy is only read during a call.
#[derive(Clone)]
pub struct RetryClient<T = reqwest::Client> {
    transport: T,
    policy: ClientPolicy,
}

impl<T> fmt::Debug for RetryClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryClient {
    /// Creates a client over a fresh `reqwest::Client` with the default policy.
    pub fn new() -> Self {
        Self::with_transport(reqwest::Client::new())
    }

    /// Creates a client whose policy is read from `RETRYABLE_HTTP_*`
    /// environment variables.
    ///
    /// See [`ClientPolicy::from_env`] for the recognized variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable holds a malformed value.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Ok(Self::new().with_policy(ClientPolicy::from_env()?))
    }
}

impl Default for RetryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> RetryClient<T> {
    /// Creates a client over `transport` with the default policy.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            policy: ClientPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_policy(mut self, policy: ClientPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ClientPolicy {
        &self.policy
    }

    /// Mutable access to the policy between calls.
    pub fn policy_mut(&mut self) -> &mut ClientPolicy {
        &mut self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Forwards to [`Transport::close_idle_connections`].
    pub fn close_idle_connections(&self) {
        self.transport.close_idle_connections();
    }

    /// Issues a GET to `url`.
    ///
    /// # Errors
    ///
    /// See [`RetryClient::execute`]; an unparseable `url` is fatal.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.execute(Request::parse(Method::GET, url)?).await
    }

    /// Issues a HEAD to `url`.
    ///
    /// # Errors
    ///
    /// See [`RetryClient::execute`]; an unparseable `url` is fatal.
    pub async fn head(&self, url: &str) -> Result<Response> {
        self.execute(Request::parse(Method::HEAD, url)?).await
    }

    /// Issues a POST to `url` with the given content type and body.
    ///
    /// # Errors
    ///
    /// See [`RetryClient::execute`]; an unparseable `url` or content type is
    /// fatal.
    pub async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: impl Into<Body>,
    ) -> Result<Response> {
        let content_type = HeaderValue::from_str(content_type).map_err(|err| {
            RetryError::fatal(FailureCause::InvalidRequest(format!(
                "invalid content type: {err}"
            )))
        })?;
        let request = Request::parse(Method::POST, url)?
            .with_header(CONTENT_TYPE, content_type)
            .with_body(body);
        self.execute(request).await
    }

    /// Issues a POST to `url` with `form` URL-encoded as the body.
    ///
    /// # Errors
    ///
    /// See [`RetryClient::post`].
    pub async fn post_form<K, V>(&self, url: &str, form: &[(K, V)]) -> Result<Response>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
            .finish();
        self.post(url, "application/x-www-form-urlencoded", encoded)
            .await
    }

    /// Sends `request`, retrying transient failures.
    ///
    /// The body is buffered once up front so it can be resent on every
    /// attempt. Each attempt waits for the request delay, sends under the
    /// per-attempt timeout, and buffers the response. Transient failures are
    /// retried after a `Retry-After` delay or exponential backoff until
    /// `retry_count` retries are spent; the whole call is bounded by
    /// `retry_timeout` and by the request's [`Scope`].
    ///
    /// # Errors
    ///
    /// [`RetryError::Fatal`] for permanent failures, cancellation, deadline
    /// expiry, size violations and panics raised while executing;
    /// [`RetryError::Retryable`] carrying the last failure once retries are
    /// exhausted.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        match AssertUnwindSafe(self.execute_attempts(request))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = unwind::describe(payload);
                #[cfg(feature = "tracing")]
                tracing::warn!("request panicked: {}", message);
                Err(RetryError::fatal(FailureCause::Panicked(message)))
            }
        }
    }

    async fn execute_attempts(&self, mut request: Request) -> Result<Response> {
        request.prepare_body(self.policy.request_size).await?;

        let scope = if self.policy.retry_timeout.is_zero() {
            request.scope().clone()
        } else {
            request.scope().with_timeout(self.policy.retry_timeout)
        };

        let mut last_response = None;
        let mut attempt = 0;
        loop {
            delay::sleep_with_jitter(
                &scope,
                self.policy.request_delay,
                self.policy.request_jitter,
            )
            .await
            .map_err(|cause| RetryError::fatal(cause).with_response(last_response.take()))?;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "sending {} {} (attempt {})",
                request.method(),
                request.url(),
                attempt + 1
            );

            let mut err = match self.send_attempt(&scope, &request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            #[cfg(feature = "tracing")]
            tracing::debug!("attempt {} failed: {}", attempt + 1, err);

            if err.is_fatal() || attempt >= self.policy.retry_count {
                return Err(err);
            }

            last_response = err.take_response();
            self.apply_retry_delay(&scope, last_response.as_deref(), attempt)
                .await
                .map_err(|cause| RetryError::fatal(cause).with_response(last_response.take()))?;
            attempt += 1;
        }
    }

    /// Performs one exchange and classifies its outcome.
    async fn send_attempt(&self, scope: &Scope, request: &Request) -> Result<Response> {
        let outgoing = request.to_transport()?;
        let attempt_scope = if self.policy.request_timeout.is_zero() {
            scope.clone()
        } else {
            scope.with_timeout(self.policy.request_timeout)
        };

        // A body read cut short by the attempt scope keeps the response.
        let result = match attempt_scope.run(self.transport.send(outgoing)).await {
            Ok(Ok(response)) => {
                response::capture(
                    response,
                    &self.policy.retry_status,
                    self.policy.response_size,
                    &attempt_scope,
                )
                .await
            }
            Ok(Err(err)) => Err(RetryError::retryable(FailureCause::Send(err))),
            Err(_) => Err(RetryError::retryable(FailureCause::AttemptTimedOut(
                self.policy.request_timeout,
            ))),
        };

        // Anything that went wrong after the call-wide scope ended is final.
        match (result, scope.check()) {
            (Err(err), Err(interrupted)) if err.is_retryable() => {
                Err(interrupted_fatal(interrupted, err))
            }
            (result, _) => result,
        }
    }

    /// Sleeps before the next attempt, preferring a server-directed delay.
    async fn apply_retry_delay(
        &self,
        scope: &Scope,
        response: Option<&Response>,
        attempt: u32,
    ) -> std::result::Result<(), Interrupted> {
        if let Some(delay) = response.and_then(|response| retry_after(response.headers())) {
            #[cfg(feature = "tracing")]
            tracing::debug!("server requested retry after {:?}", delay);
            return delay::sleep_with_jitter(scope, delay, 0.0).await;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "retrying after exponential backoff from {:?} (retry {})",
            self.policy.retry_delay,
            attempt + 1
        );
        delay::sleep_exponential(
            scope,
            self.policy.retry_delay,
            self.policy.effective_multiplier(),
            self.policy.retry_jitter,
            attempt,
        )
        .await
    }
}

fn interrupted_fatal(interrupted: Interrupted, mut err: RetryError) -> RetryError {
    let response = err.take_response();
    RetryError::fatal(interrupted).with_response(response)
}
