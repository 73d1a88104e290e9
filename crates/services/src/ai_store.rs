//! Per-user AI assistant state: provider configuration, cached model list and
//! chat history, plus the assistant panel width.
//!
//! Entries in the `ai-config` store are namespaced by the signed-in username
//! so several accounts can share one machine.

use crate::kv_store::{read_json, write_json, KeyValueStore};
use crate::token_store::TokenStore;
use serde::{Deserialize, Serialize};
use shared::agent_api::ModelInfo;
use shared::settings::{AiConfig, ConfigExport, EXPORT_VERSION};
use shared::task::TaskBlock;
use shared::ClientError;
use std::sync::Arc;

const CONFIG_PREFIX: &str = "AIConfig";
const MODELS_PREFIX: &str = "AIModels";
const HISTORY_PREFIX: &str = "AIChatHistory";
const SIDEBAR_WIDTH_KEY: &str = "AISidebarWidth";

pub const MODEL_CACHE_TTL_MS: i64 = 15 * 60 * 1000;
pub const DEFAULT_SIDEBAR_WIDTH: u32 = 380;

#[derive(Debug, Serialize, Deserialize)]
struct ModelCache {
    models: Vec<ModelInfo>,
    timestamp: i64,
}

#[derive(Clone)]
pub struct AiConfigStore {
    store: Arc<dyn KeyValueStore>,
    local: Arc<dyn KeyValueStore>,
    tokens: TokenStore,
}

impl AiConfigStore {
    /// `store` holds the namespaced AI entries; `local` is the flat store that
    /// also carries credentials and UI preferences.
    pub fn new(store: Arc<dyn KeyValueStore>, local: Arc<dyn KeyValueStore>, tokens: TokenStore) -> Self {
        Self { store, local, tokens }
    }

    fn key(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.tokens.name().unwrap_or_default())
    }

    pub fn get_config(&self) -> AiConfig {
        match read_json::<AiConfig>(self.store.as_ref(), &self.key(CONFIG_PREFIX)) {
            Ok(Some(config)) => config,
            Ok(None) => AiConfig::default(),
            Err(e) => {
                tracing::warn!(error = %e, "stored AI config unreadable, using defaults");
                AiConfig::default()
            }
        }
    }

    pub fn set_config(&self, config: &AiConfig) -> Result<(), ClientError> {
        write_json(self.store.as_ref(), &self.key(CONFIG_PREFIX), config)
    }

    pub fn remove_config(&self) -> Result<(), ClientError> {
        self.store.remove(&self.key(CONFIG_PREFIX))
    }

    pub fn set_models(&self, models: &[ModelInfo]) -> Result<(), ClientError> {
        self.set_models_at(models, chrono::Utc::now().timestamp_millis())
    }

    pub fn set_models_at(&self, models: &[ModelInfo], now_ms: i64) -> Result<(), ClientError> {
        let cache = ModelCache {
            models: models.to_vec(),
            timestamp: now_ms,
        };
        write_json(self.store.as_ref(), &self.key(MODELS_PREFIX), &cache)
    }

    /// Cached models if they were stored less than 15 minutes ago.
    pub fn get_models(&self) -> Option<Vec<ModelInfo>> {
        self.get_models_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn get_models_at(&self, now_ms: i64) -> Option<Vec<ModelInfo>> {
        let cache = match read_json::<ModelCache>(self.store.as_ref(), &self.key(MODELS_PREFIX)) {
            Ok(Some(cache)) => cache,
            Ok(None) => {
                tracing::debug!("model cache miss");
                return None;
            }
            Err(e) => {
                tracing::debug!(error = %e, "model cache unreadable");
                return None;
            }
        };
        if now_ms - cache.timestamp < MODEL_CACHE_TTL_MS {
            Some(cache.models)
        } else {
            tracing::debug!("model cache expired");
            None
        }
    }

    pub fn remove_models(&self) -> Result<(), ClientError> {
        self.store.remove(&self.key(MODELS_PREFIX))
    }

    pub fn set_chat_history(&self, history: &[TaskBlock]) -> Result<(), ClientError> {
        write_json(self.store.as_ref(), &self.key(HISTORY_PREFIX), &history)
    }

    pub fn get_chat_history(&self) -> Vec<TaskBlock> {
        match read_json::<Vec<TaskBlock>>(self.store.as_ref(), &self.key(HISTORY_PREFIX)) {
            Ok(history) => history.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "chat history unreadable");
                Vec::new()
            }
        }
    }

    /// Insert `task` into the history, replacing any entry with the same id.
    pub fn record_task(&self, task: &TaskBlock) -> Result<(), ClientError> {
        let mut history = self.get_chat_history();
        match history.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task.clone(),
            None => history.push(task.clone()),
        }
        self.set_chat_history(&history)
    }

    pub fn remove_chat_history(&self) -> Result<(), ClientError> {
        self.store.remove(&self.key(HISTORY_PREFIX))
    }

    pub fn export_config(&self) -> ConfigExport {
        ConfigExport {
            version: Some(EXPORT_VERSION.to_string()),
            export_time: chrono::Utc::now().timestamp_millis(),
            config: Some(self.get_config()),
        }
    }

    /// Replace the stored config with an exported one. Payloads missing either
    /// the version tag or the config are rejected.
    pub fn import_config(&self, payload: ConfigExport) -> Result<AiConfig, ClientError> {
        let config = match (payload.version.as_deref(), payload.config) {
            (Some(version), Some(config)) if !version.is_empty() => config,
            _ => {
                return Err(ClientError::InvalidFormat(
                    "export file must contain a version and a config".into(),
                ))
            }
        };
        self.set_config(&config)?;
        Ok(config)
    }

    pub fn import_config_json(&self, raw: &str) -> Result<AiConfig, ClientError> {
        let payload: ConfigExport = serde_json::from_str(raw)?;
        self.import_config(payload)
    }

    pub fn sidebar_width(&self) -> u32 {
        self.local
            .get(SIDEBAR_WIDTH_KEY)
            .ok()
            .flatten()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_SIDEBAR_WIDTH)
    }

    pub fn set_sidebar_width(&self, width: u32) -> Result<(), ClientError> {
        self.local.set(SIDEBAR_WIDTH_KEY, &width.to_string())
    }

    /// Wipe every user's AI state and the panel width.
    pub fn clear_all(&self) -> Result<(), ClientError> {
        self.store.clear()?;
        self.local.remove(SIDEBAR_WIDTH_KEY)
    }
}
