//! The seam between [`ApiClient`](crate::ApiClient) and the network.

use async_trait::async_trait;

/// Sends a fully-built request and returns the server's response.
///
/// [`reqwest::Client`] is the production implementation; tests substitute their own.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        reqwest::Client::execute(self, request).await
    }
}
