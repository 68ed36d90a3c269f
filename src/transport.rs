use std::future::Future;

/// Boxed error returned by a [`Transport`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Performs a single HTTP exchange.
///
/// Implementations must return a response whenever the exchange completed,
/// whatever its status code. Connection pooling, TLS and redirects are the
/// transport's business; [`RetryClient`](crate::RetryClient) only decides
/// whether and when to call it again.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response, BoxError>> + Send;

    /// Drops pooled connections that are currently idle.
    fn close_idle_connections(&self) {}
}

impl Transport for reqwest::Client {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, BoxError> {
        self.execute(request).await.map_err(BoxError::from)
    }

    // reqwest releases idle connections through `pool_idle_timeout` and on
    // drop; there is no on-demand hook to forward to.
    fn close_idle_connections(&self) {}
}
