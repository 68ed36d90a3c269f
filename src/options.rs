use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::status::DEFAULT_RETRY_STATUS;

const GIB: u64 = 1024 * 1024 * 1024;

/// Configures retry, pacing, timeout and size behavior.
///
/// Zero timeouts and zero size ceilings mean "unbounded". Durations are
/// (de)serialized as integer milliseconds under `*_ms` keys; missing keys
/// keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientPolicy {
    /// Status codes that trigger a retry, even when 400 or above.
    pub retry_status: Vec<u16>,
    /// Maximum number of retries after the initial attempt.
    pub retry_count: u32,
    /// Base delay between retries.
    #[serde(rename = "retry_delay_ms", with = "duration_ms")]
    pub retry_delay: Duration,
    /// Exponential backoff multiplier. Values below 1.0 act as 1.0.
    pub retry_multiplier: f64,
    /// Random jitter fraction applied to the retry delay.
    pub retry_jitter: f64,
    /// Ceiling on the whole call, retries included.
    #[serde(rename = "retry_timeout_ms", with = "duration_ms")]
    pub retry_timeout: Duration,
    /// Fixed delay applied before every attempt.
    #[serde(rename = "request_delay_ms", with = "duration_ms")]
    pub request_delay: Duration,
    /// Random jitter fraction applied to the request delay.
    pub request_jitter: f64,
    /// Ceiling on a single attempt.
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
    /// Maximum request body size in bytes.
    pub request_size: u64,
    /// Maximum response body size in bytes.
    pub response_size: u64,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            retry_status: DEFAULT_RETRY_STATUS.to_vec(),
            retry_count: 20,
            retry_delay: Duration::from_millis(500),
            retry_multiplier: 1.5,
            retry_jitter: 0.5,
            retry_timeout: Duration::from_secs(60 * 60),
            request_delay: Duration::from_millis(10),
            request_jitter: 0.5,
            request_timeout: Duration::from_secs(5 * 60),
            request_size: 2 * GIB,
            response_size: 2 * GIB,
        }
    }
}

/// Invalid policy value read from the environment.
#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {name}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

impl ClientPolicy {
    /// Builds a policy from `RETRYABLE_HTTP_*` environment variables.
    ///
    /// Unset variables keep their defaults. Recognized variables:
    /// `RETRY_STATUS` (comma separated), `RETRY_COUNT`, `RETRY_DELAY_MS`,
    /// `RETRY_MULTIPLIER`, `RETRY_JITTER`, `RETRY_TIMEOUT_MS`,
    /// `REQUEST_DELAY_MS`, `REQUEST_JITTER`, `REQUEST_TIMEOUT_MS`,
    /// `REQUEST_SIZE`, `RESPONSE_SIZE`, each prefixed with `RETRYABLE_HTTP_`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first variable that fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut policy = Self::default();
        let var = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = var("RETRYABLE_HTTP_RETRY_STATUS") {
            policy.retry_status = value
                .split(',')
                .map(|code| code.trim().parse::<u16>())
                .collect::<Result<_, _>>()
                .map_err(|_| invalid("RETRYABLE_HTTP_RETRY_STATUS", &value))?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_RETRY_COUNT") {
            policy.retry_count = parse("RETRYABLE_HTTP_RETRY_COUNT", &value)?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_RETRY_DELAY_MS") {
            policy.retry_delay = parse_ms("RETRYABLE_HTTP_RETRY_DELAY_MS", &value)?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_RETRY_MULTIPLIER") {
            policy.retry_multiplier = parse("RETRYABLE_HTTP_RETRY_MULTIPLIER", &value)?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_RETRY_JITTER") {
            policy.retry_jitter = parse("RETRYABLE_HTTP_RETRY_JITTER", &value)?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_RETRY_TIMEOUT_MS") {
            policy.retry_timeout = parse_ms("RETRYABLE_HTTP_RETRY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_REQUEST_DELAY_MS") {
            policy.request_delay = parse_ms("RETRYABLE_HTTP_REQUEST_DELAY_MS", &value)?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_REQUEST_JITTER") {
            policy.request_jitter = parse("RETRYABLE_HTTP_REQUEST_JITTER", &value)?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_REQUEST_TIMEOUT_MS") {
            policy.request_timeout = parse_ms("RETRYABLE_HTTP_REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_REQUEST_SIZE") {
            policy.request_size = parse("RETRYABLE_HTTP_REQUEST_SIZE", &value)?;
        }
        if let Some(value) = var("RETRYABLE_HTTP_RESPONSE_SIZE") {
            policy.response_size = parse("RETRYABLE_HTTP_RESPONSE_SIZE", &value)?;
        }
        Ok(policy)
    }

    pub fn with_retry_status(mut self, status: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status = status.into_iter().collect();
        self
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Sets the backoff shape: base delay, multiplier and jitter fraction.
    pub fn with_backoff(mut self, delay: Duration, multiplier: f64, jitter: f64) -> Self {
        self.retry_delay = delay;
        self.retry_multiplier = multiplier;
        self.retry_jitter = jitter;
        self
    }

    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = timeout;
        self
    }

    /// Sets the pacing delay and jitter applied before every attempt.
    pub fn with_request_delay(mut self, delay: Duration, jitter: f64) -> Self {
        self.request_delay = delay;
        self.request_jitter = jitter;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_request_size(mut self, bytes: u64) -> Self {
        self.request_size = bytes;
        self
    }

    pub fn with_response_size(mut self, bytes: u64) -> Self {
        self.response_size = bytes;
        self
    }

    /// Backoff multiplier actually applied.
    pub(crate) fn effective_multiplier(&self) -> f64 {
        self.retry_multiplier.max(1.0)
    }
}

fn invalid(name: &'static str, value: &str) -> ConfigError {
    ConfigError {
        name,
        value: value.to_owned(),
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn parse_ms(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse(name, value).map(Duration::from_millis)
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use serde_json::json;

    use super::ClientPolicy;

    #[test]
    fn defaults_match_documented_table() {
        let policy = ClientPolicy::default();
        assert_eq!(policy.retry_count, 20);
        assert_eq!(policy.retry_delay, Duration::from_millis(500));
        assert_eq!(policy.retry_multiplier, 1.5);
        assert_eq!(policy.retry_jitter, 0.5);
        assert_eq!(policy.retry_timeout, Duration::from_secs(3600));
        assert_eq!(policy.request_delay, Duration::from_millis(10));
        assert_eq!(policy.request_timeout, Duration::from_secs(300));
        assert_eq!(policy.request_size, 2 * 1024 * 1024 * 1024);
        for status in [408, 409, 423, 425, 429, 500, 502, 503, 504, 507, 520, 599] {
            assert!(policy.retry_status.contains(&status), "{status}");
        }
        assert!(!policy.retry_status.contains(&404));
    }

    #[test]
    fn sub_unit_multiplier_is_clamped() {
        let policy = ClientPolicy::default().with_backoff(Duration::from_millis(1), 0.5, 0.0);
        assert_eq!(policy.effective_multiplier(), 1.0);
        let policy = policy.with_backoff(Duration::from_millis(1), 2.0, 0.0);
        assert_eq!(policy.effective_multiplier(), 2.0);
    }

    #[test]
    fn partial_json_overrides_named_fields() {
        let policy: ClientPolicy = serde_json::from_value(json!({
            "retry_count": 3,
            "retry_delay_ms": 250,
            "retry_status": [503]
        }))
        .expect("policy must deserialize");

        assert_eq!(policy.retry_count, 3);
        assert_eq!(policy.retry_delay, Duration::from_millis(250));
        assert_eq!(policy.retry_status, vec![503]);
        assert_eq!(policy.request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn json_uses_millisecond_keys() {
        let value = serde_json::to_value(ClientPolicy::default()).expect("policy must serialize");
        assert_eq!(value["retry_timeout_ms"], json!(3_600_000));
        assert_eq!(value["request_delay_ms"], json!(10));
    }

    #[test]
    fn env_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("RETRYABLE_HTTP_RETRY_COUNT", "2"),
            ("RETRYABLE_HTTP_RETRY_STATUS", "429, 503"),
            ("RETRYABLE_HTTP_REQUEST_TIMEOUT_MS", "1500"),
            ("RETRYABLE_HTTP_RETRY_JITTER", ""),
        ]);
        let policy = ClientPolicy::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
            .expect("env must parse");

        assert_eq!(policy.retry_count, 2);
        assert_eq!(policy.retry_status, vec![429, 503]);
        assert_eq!(policy.request_timeout, Duration::from_millis(1500));
        assert_eq!(policy.retry_jitter, 0.5);
    }

    #[test]
    fn env_lookup_rejects_malformed_value() {
        let err = ClientPolicy::from_lookup(|name| {
            (name == "RETRYABLE_HTTP_RETRY_COUNT").then(|| "many".to_owned())
        })
        .expect_err("malformed count must fail");
        assert_eq!(err.name, "RETRYABLE_HTTP_RETRY_COUNT");
        assert_eq!(err.to_string(), "invalid value \"many\" for RETRYABLE_HTTP_RETRY_COUNT");
    }
}
