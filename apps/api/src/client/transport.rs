use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::ClientError;
use crate::models::Envelope;

/// Request layer used by the editors. Paths are relative to `/api/v1/`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Envelope<Value>, ClientError>;

    async fn patch(&self, path: &str, body: Value) -> Result<Envelope<Value>, ClientError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, path: &str) -> Result<Envelope<Value>, ClientError> {
        (**self).get(path).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Envelope<Value>, ClientError> {
        (**self).patch(path, body).await
    }
}

/// HTTP transport that authenticates every request with the stored bearer token.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ClientError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ClientError::MissingToken);
        }
        Ok(Self {
            http: Client::builder().timeout(Duration::from_secs(30)).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Builds a client from a token saved in local storage (a plain file).
    pub async fn from_token_file(base_url: &str, path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let token = tokio::fs::read_to_string(path).await?;
        Self::new(base_url, &token)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn decode(response: reqwest::Response) -> Result<Envelope<Value>, ClientError> {
        let status = response.status();
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|_| ClientError::UnexpectedResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn get(&self, path: &str) -> Result<Envelope<Value>, ClientError> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        Self::decode(response).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Envelope<Value>, ClientError> {
        let url = self.url(path);
        debug!("PATCH {url}");
        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_url_joins_api_prefix() {
        let client = ApiClient::new("http://localhost:8080/", "tok").unwrap();
        assert_eq!(
            client.url("/declaration-detail"),
            "http://localhost:8080/api/v1/declaration-detail"
        );
    }

    #[test]
    fn test_blank_token_rejected() {
        assert!(matches!(
            ApiClient::new("http://localhost", "  "),
            Err(ClientError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_token_file_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  secret-token  ").unwrap();

        let client = ApiClient::from_token_file("http://localhost", file.path())
            .await
            .unwrap();
        assert_eq!(client.token, "secret-token");
    }
}
