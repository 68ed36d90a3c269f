//! Jittered and exponential sleeps bounded by a [`Scope`].

use std::time::Duration;

use crate::scope::{Interrupted, Scope};

/// Scales `base` by a random factor in `1 ± jitter`.
///
/// `jitter` is clamped to `0.0..=1.0`; non-finite values disable jitter.
pub fn jittered(base: Duration, jitter: f64) -> Duration {
    let jitter = if jitter.is_finite() {
        jitter.clamp(0.0, 1.0)
    } else {
        0.0
    };
    if jitter == 0.0 || base.is_zero() {
        return base;
    }
    let factor = 1.0 + jitter * (fastrand::f64() * 2.0 - 1.0);
    saturating_secs(base.as_secs_f64() * factor)
}

/// Returns `base * multiplier^attempt`, saturating at [`Duration::MAX`].
pub fn exponential(base: Duration, multiplier: f64, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    saturating_secs(base.as_secs_f64() * multiplier.powi(exponent))
}

fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Sleeps for `base` with `jitter` applied.
///
/// Fails without sleeping when the scope has already ended, and completes
/// immediately for a zero duration otherwise.
pub async fn sleep_with_jitter(
    scope: &Scope,
    base: Duration,
    jitter: f64,
) -> Result<(), Interrupted> {
    scope.sleep(jittered(base, jitter)).await
}

/// Sleeps for an exponentially scaled, jittered duration.
pub async fn sleep_exponential(
    scope: &Scope,
    base: Duration,
    multiplier: f64,
    jitter: f64,
    attempt: u32,
) -> Result<(), Interrupted> {
    sleep_with_jitter(scope, exponential(base, multiplier, attempt), jitter).await
}
