//! Wires stores and clients together for one CLI invocation.

use crate::settings::AppSettings;
use anyhow::{Context, Result};
use providers::OpenAiCompatClient;
use services::{
    AiConfigApi, AiConfigStore, ApiClient, FileStore, KeyValueStore, LogNotifier, Preferences,
    ReqwestTransport, SessionApi, TokenStore,
};
use std::path::Path;
use std::sync::Arc;

const AI_STORE_FILE: &str = "ai-config.json";
const LOCAL_STORE_FILE: &str = "local-storage.json";

pub struct AppContext {
    pub tokens: TokenStore,
    pub ai_store: AiConfigStore,
    pub preferences: Preferences,
    pub api: Arc<ApiClient>,
    pub llm: OpenAiCompatClient,
}

impl AppContext {
    pub fn open(settings: &AppSettings) -> Result<Self> {
        let data_dir = settings.resolve_data_dir()?;
        Self::open_in(settings, &data_dir)
    }

    pub fn open_in(settings: &AppSettings, data_dir: &Path) -> Result<Self> {
        let local: Arc<dyn KeyValueStore> = Arc::new(
            FileStore::open(data_dir.join(LOCAL_STORE_FILE))
                .context("Failed to open local store")?,
        );
        let ai: Arc<dyn KeyValueStore> = Arc::new(
            FileStore::open(data_dir.join(AI_STORE_FILE)).context("Failed to open AI store")?,
        );
        tracing::debug!(data_dir = %data_dir.display(), "stores opened");

        let tokens = TokenStore::new(local.clone());
        let transport = Arc::new(ReqwestTransport::new(settings.backend_base()));
        let api = Arc::new(ApiClient::new(
            transport,
            tokens.clone(),
            Arc::new(LogNotifier),
            settings.basic_token_key.clone(),
        ));

        Ok(Self {
            ai_store: AiConfigStore::new(ai, local.clone(), tokens.clone()),
            preferences: Preferences::new(local),
            tokens,
            api,
            llm: OpenAiCompatClient::new(),
        })
    }

    pub fn session(&self) -> SessionApi {
        SessionApi::new(self.api.clone(), self.ai_store.clone())
    }

    pub fn remote_config(&self) -> AiConfigApi {
        AiConfigApi::new(self.api.clone())
    }
}
