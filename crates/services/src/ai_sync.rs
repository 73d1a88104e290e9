//! Server-side copy of the user's AI configuration.

use crate::api_client::{ApiClient, Method};
use serde::Deserialize;
use serde_json::Value;
use shared::settings::AiConfig;
use shared::ClientError;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ExistsReply {
    #[serde(default)]
    exists: bool,
}

#[derive(Clone)]
pub struct AiConfigApi {
    client: Arc<ApiClient>,
}

impl AiConfigApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Stored config with the API key masked by the server.
    pub async fn fetch(&self) -> Result<Option<AiConfig>, ClientError> {
        Ok(self.client.data(Method::Get, "/ai/config", None).await?.data)
    }

    /// Stored config including the API key, used when pulling to this device.
    pub async fn fetch_full(&self) -> Result<Option<AiConfig>, ClientError> {
        Ok(self
            .client
            .data(Method::Get, "/ai/config/full", None)
            .await?
            .data)
    }

    pub async fn save(&self, config: &AiConfig) -> Result<(), ClientError> {
        let body = serde_json::to_value(config)?;
        self.client
            .data::<Value>(Method::Post, "/ai/config", Some(body))
            .await?;
        tracing::info!("AI config pushed to server");
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), ClientError> {
        self.client
            .data::<Value>(Method::Post, "/ai/config/delete", None)
            .await?;
        Ok(())
    }

    pub async fn exists(&self) -> Result<bool, ClientError> {
        let reply = self
            .client
            .data::<ExistsReply>(Method::Get, "/ai/config/exists", None)
            .await?;
        Ok(reply.data.map(|r| r.exists).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::tests::{client_with, FakeBackend};
    use crate::api_client::Channel;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_and_exists() {
        let backend = Arc::new(FakeBackend::new("stale"));
        backend.route(
            "/ai/config/full",
            200,
            json!({"code": 200, "message": "ok", "data": {
                "baseUrl": "https://api.example.com",
                "apiKey": "sk-full",
                "model": "gpt-4o",
                "createTime": 1700000000000i64
            }}),
        );
        backend.route(
            "/ai/config/exists",
            200,
            json!({"code": 200, "message": "ok", "data": {"exists": true}}),
        );
        let (client, _, _) = client_with(backend.clone());
        let api = AiConfigApi::new(Arc::new(client));

        let config = api.fetch_full().await.unwrap().unwrap();
        assert_eq!(config.api_key, "sk-full");
        assert_eq!(config.model, "gpt-4o");
        assert!(api.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_save_posts_camel_case_body() {
        let backend = Arc::new(FakeBackend::new("stale"));
        let (client, _, _) = client_with(backend.clone());
        let api = AiConfigApi::new(Arc::new(client));

        let config = AiConfig {
            base_url: "https://api.example.com".into(),
            ..AiConfig::default()
        };
        api.save(&config).await.unwrap();
        api.delete().await.unwrap();

        let requests = backend.requests.lock();
        assert_eq!(requests[0].channel, Channel::Data);
        assert_eq!(requests[0].path, "/ai/config");
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["baseUrl"], "https://api.example.com");
        assert_eq!(requests[1].path, "/ai/config/delete");
    }
}
