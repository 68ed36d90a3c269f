use std::time::Duration;

use retryable_http::{Body, Method, Request, RetryClient, Scope};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("RETRYABLE_HTTP_DEMO_URL")?;
    let client = RetryClient::from_env()?;

    let response = client
        .post_form(&url, &[("name", "Kit"), ("role", "admin")])
        .await?;
    println!("form: {}", response.status());

    // Streamed bodies are buffered once and replayed on every attempt.
    let file = tokio::fs::File::open("Cargo.toml").await?;
    let scope = Scope::new().with_timeout(Duration::from_secs(10));
    let cancel = scope.token().clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel.cancel();
    });

    let request = Request::parse(Method::PUT, &url)?
        .with_body(Body::from_reader(file))
        .with_scope(scope);
    let response = client.execute(request).await?;
    println!("upload: {} {}", response.status(), response.text());

    Ok(())
}
