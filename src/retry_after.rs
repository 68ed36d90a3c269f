use std::time::{Duration, SystemTime};

use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Reads a server-directed delay from the `Retry-After` header.
///
/// Accepts delta-seconds (`Retry-After: 120`) or an HTTP-date
/// (`Retry-After: Wed, 21 Oct 2015 07:28:00 GMT`). Returns `None` when the
/// header is missing, malformed, zero, or names a moment already past.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    retry_after_at(headers, SystemTime::now())
}

fn retry_after_at(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }

    let delay = if raw.bytes().all(|b| b.is_ascii_digit()) {
        Duration::from_secs(raw.parse::<u64>().ok()?)
    } else {
        let when = httpdate::parse_http_date(raw).ok()?;
        when.duration_since(now).ok()?
    };
    (!delay.is_zero()).then_some(delay)
}
