use std::{any::Any, backtrace::Backtrace};

/// Renders a caught panic payload with a backtrace.
///
/// The backtrace is taken where the panic was caught, after unwinding, so it
/// ends at the barrier in [`RetryClient::execute`](crate::RetryClient::execute)
/// rather than at the panicking frame; the installed panic hook still reports
/// the original location.
pub(crate) fn describe(payload: Box<dyn Any + Send>) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    };
    format!(
        "panic: {message}\ncaught at:\n{}",
        Backtrace::force_capture()
    )
}
