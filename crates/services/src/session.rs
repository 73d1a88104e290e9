//! Sign-in and sign-out against the backend's token endpoints.

use crate::ai_store::AiConfigStore;
use crate::api_client::{ApiClient, Method};
use serde_json::{json, Value};
use shared::token::Token;
use shared::ClientError;
use std::sync::Arc;

#[derive(Clone)]
pub struct SessionApi {
    client: Arc<ApiClient>,
    ai_store: AiConfigStore,
}

impl SessionApi {
    pub fn new(client: Arc<ApiClient>, ai_store: AiConfigStore) -> Self {
        Self { client, ai_store }
    }

    /// Exchange credentials for a token pair. AI state left over from a
    /// previous account is wiped once the new pair is stored.
    pub async fn sign_in(&self, name: &str, password: &str) -> Result<Token, ClientError> {
        let token = self
            .client
            .auth::<Token>(
                Method::Post,
                "/sign-in",
                Some(json!({ "name": name, "password": password })),
            )
            .await?
            .into_data()?;
        self.client.tokens().set_token(&token)?;
        self.ai_store.clear_all()?;
        tracing::info!(name = %token.name, "signed in");
        Ok(token)
    }

    /// Invalidate the token pair server-side, then drop all local session
    /// state. Local state is cleared even if the server call fails.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let tokens = self.client.tokens();
        let body = json!({
            "accessToken": tokens.access_token().unwrap_or_default(),
            "refreshToken": tokens.refresh_token().unwrap_or_default(),
        });
        let remote = self
            .client
            .auth::<Value>(Method::Post, "/sign-out", Some(body))
            .await;

        self.ai_store.clear_all()?;
        tokens.clear()?;
        tracing::info!("signed out");
        remote.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::tests::{client_with, FakeBackend};
    use crate::kv_store::{KeyValueStore, MemoryStore};
    use shared::settings::AiConfig;

    fn session(backend: Arc<FakeBackend>) -> (SessionApi, AiConfigStore, Arc<MemoryStore>) {
        let (client, _, tokens) = client_with(backend);
        let ai = Arc::new(MemoryStore::new());
        let store = AiConfigStore::new(ai.clone(), Arc::new(MemoryStore::new()), tokens);
        (SessionApi::new(Arc::new(client), store.clone()), store, ai)
    }

    #[tokio::test]
    async fn test_sign_in_stores_token_and_clears_ai_state() {
        let backend = Arc::new(FakeBackend::new("stale"));
        backend.route(
            "/sign-in",
            200,
            json!({"code": 200, "message": "ok", "data": {
                "name": "bob", "accessToken": "a2", "refreshToken": "r2"
            }}),
        );
        let (session, store, ai) = session(backend.clone());
        store.set_config(&AiConfig::default()).unwrap();

        let token = session.sign_in("bob", "pw").await.unwrap();
        assert_eq!(token.access_token, "a2");
        assert!(ai.keys().unwrap().is_empty());

        let request = backend.requests.lock()[0].clone();
        assert_eq!(request.body.unwrap()["name"], "bob");
        assert!(request.authorization.unwrap().starts_with("Basic "));
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_server_fails() {
        let backend = Arc::new(FakeBackend::new("stale"));
        backend.route("/sign-out", 502, json!({}));
        let (session, store, ai) = session(backend.clone());
        store.set_config(&AiConfig::default()).unwrap();

        assert!(session.sign_out().await.is_err());
        assert!(ai.keys().unwrap().is_empty());
        assert!(!session.client.tokens().is_signed_in());
    }
}
