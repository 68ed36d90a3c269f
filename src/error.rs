use std::{io, time::Duration};

use reqwest::StatusCode;

use crate::{scope::Interrupted, transport::BoxError, Response};

/// Error type returned by this crate.
///
/// Every failure is either worth retrying or final; the variant says which,
/// and [`FailureCause`] says why.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Transient failure. Surfaced only once retries are exhausted.
    #[error("retryable error: {cause}")]
    Retryable {
        #[source]
        cause: FailureCause,
        /// Last response received, with its body fully buffered.
        response: Option<Box<Response>>,
    },
    /// Permanent failure. Ends the call immediately.
    #[error("non-retryable error: {cause}")]
    Fatal {
        #[source]
        cause: FailureCause,
        /// Last response received, with its body fully buffered.
        response: Option<Box<Response>>,
    },
}

/// Underlying reason for a [`RetryError`].
#[derive(Debug, thiserror::Error)]
pub enum FailureCause {
    #[error("unable to construct request: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unable to construct request: {0}")]
    InvalidRequest(String),
    #[error("unable to read request body: {0}")]
    ReadRequestBody(#[source] io::Error),
    #[error("request size exceeded ({size})")]
    RequestTooLarge { size: u64 },
    #[error("unable to reset request body: {0}")]
    ResetRequestBody(#[source] io::Error),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error("unable to send request: {0}")]
    Send(#[source] BoxError),
    #[error("request attempt timed out after {0:?}")]
    AttemptTimedOut(Duration),
    #[error("unable to read response body: {0}")]
    ReadResponseBody(#[source] reqwest::Error),
    /// The attempt's scope ended while the body was still arriving.
    #[error("unable to read response body: {0}")]
    ResponseBodyInterrupted(#[source] Interrupted),
    #[error("invalid status code ({})", .0.as_u16())]
    Status(StatusCode),
    #[error("response size exceeded ({size})")]
    ResponseTooLarge { size: u64 },
    /// A panic escaped the retry loop; carries the payload and a backtrace.
    #[error("{0}")]
    Panicked(String),
}

impl RetryError {
    pub(crate) fn retryable(cause: impl Into<FailureCause>) -> Self {
        Self::Retryable {
            cause: cause.into(),
            response: None,
        }
    }

    pub(crate) fn fatal(cause: impl Into<FailureCause>) -> Self {
        Self::Fatal {
            cause: cause.into(),
            response: None,
        }
    }

    pub(crate) fn with_response(mut self, response: Option<Box<Response>>) -> Self {
        match &mut self {
            Self::Retryable { response: slot, .. } | Self::Fatal { response: slot, .. } => {
                *slot = response;
            }
        }
        self
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    pub fn cause(&self) -> &FailureCause {
        match self {
            Self::Retryable { cause, .. } | Self::Fatal { cause, .. } => cause,
        }
    }

    /// Response attached to the failure, if one was received.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Retryable { response, .. } | Self::Fatal { response, .. } => response.as_deref(),
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Retryable { response, .. } | Self::Fatal { response, .. } => {
                response.map(|response| *response)
            }
        }
    }

    pub(crate) fn take_response(&mut self) -> Option<Box<Response>> {
        match self {
            Self::Retryable { response, .. } | Self::Fatal { response, .. } => response.take(),
        }
    }

    /// Status code of the attached response.
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(Response::status)
    }

    /// Returns true when the call ended because its scope was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.cause(),
            FailureCause::Interrupted(Interrupted::Cancelled)
        )
    }

    /// Returns true when the call ended because its deadline passed.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(
            self.cause(),
            FailureCause::Interrupted(Interrupted::DeadlineExceeded)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use reqwest::StatusCode;

    use super::{FailureCause, RetryError};
    use crate::scope::Interrupted;

    #[test]
    fn display_names_kind_and_cause() {
        let err = RetryError::retryable(FailureCause::Status(StatusCode::OK));
        assert_eq!(err.to_string(), "retryable error: invalid status code (200)");

        let err = RetryError::fatal(FailureCause::RequestTooLarge { size: 3 });
        assert_eq!(err.to_string(), "non-retryable error: request size exceeded (3)");
    }

    #[test]
    fn source_chain_reaches_interruption() {
        let err = RetryError::fatal(Interrupted::DeadlineExceeded);
        assert!(err.is_fatal());
        assert!(err.is_deadline_exceeded());
        assert!(!err.is_cancelled());
        let source = err.source().expect("cause must be exposed");
        assert_eq!(source.to_string(), "deadline exceeded");
    }
}
