use std::time::Duration;

use retryable_http::{ClientPolicy, RetryClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("RETRYABLE_HTTP_DEMO_URL")
        .unwrap_or_else(|_| "https://example.com/".to_owned());

    let policy = ClientPolicy::from_env()?
        .with_retry_count(5)
        .with_backoff(Duration::from_millis(250), 2.0, 0.5)
        .with_retry_timeout(Duration::from_secs(30));
    let client = RetryClient::new().with_policy(policy);

    match client.get(&url).await {
        Ok(response) => {
            println!("{} ({} bytes)", response.status(), response.content_length());
            println!("{}", response.text());
        }
        Err(err) => {
            eprintln!("{err}");
            if let Some(response) = err.response() {
                eprintln!("last status: {}", response.status());
            }
        }
    }

    Ok(())
}
