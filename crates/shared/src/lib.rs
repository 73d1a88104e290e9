pub mod agent;
pub mod error;
pub mod task;
pub mod token;

pub use error::ClientError;

pub mod settings {
    use crate::error::ClientError;
    use serde::{Deserialize, Serialize};
    use std::collections::HashSet;

    /// Version tag written into exported configuration files.
    pub const EXPORT_VERSION: &str = "1.0";

    /// A named, reusable system prompt template.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
    #[serde(rename_all = "camelCase", default)]
    pub struct SystemPrompt {
        pub id: String,
        pub name: String,
        pub content: String,
        pub is_active: bool,
    }

    /// AI provider settings, persisted wholesale per user.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
    #[serde(rename_all = "camelCase", default)]
    pub struct AiConfig {
        pub base_url: String,
        pub api_key: String,
        pub model: String,
        pub system_prompts: Vec<SystemPrompt>,
        /// Empty, or the id of one of `system_prompts`.
        pub current_prompt_id: String,
        pub system_prompt_enabled: bool,
        pub agent_enabled: bool,
        pub doc_context_enabled: bool,
        pub panel_enabled: bool,
        pub sync_enabled: bool,
    }

    impl AiConfig {
        /// The prompt selected by `current_prompt_id`, if any.
        pub fn active_prompt(&self) -> Option<&SystemPrompt> {
            if self.current_prompt_id.is_empty() {
                return None;
            }
            self.system_prompts
                .iter()
                .find(|p| p.id == self.current_prompt_id)
        }

        pub fn is_provider_configured(&self) -> bool {
            !self.base_url.trim().is_empty() && !self.model.trim().is_empty()
        }

        /// Check the prompt-list invariants: unique ids and a current id that
        /// is either empty or present in the list.
        pub fn validate(&self) -> Result<(), ClientError> {
            let mut seen = HashSet::new();
            for prompt in &self.system_prompts {
                if !seen.insert(prompt.id.as_str()) {
                    return Err(ClientError::InvalidFormat(format!(
                        "duplicate system prompt id: {}",
                        prompt.id
                    )));
                }
            }
            if !self.current_prompt_id.is_empty() && self.active_prompt().is_none() {
                return Err(ClientError::InvalidFormat(format!(
                    "current prompt id {} does not match any system prompt",
                    self.current_prompt_id
                )));
            }
            Ok(())
        }

        /// Drop a dangling `current_prompt_id`.
        pub fn normalized(mut self) -> Self {
            if self.active_prompt().is_none() {
                self.current_prompt_id.clear();
            }
            for prompt in &mut self.system_prompts {
                prompt.is_active = prompt.id == self.current_prompt_id;
            }
            self
        }

        /// Add a prompt, or replace the one with the same id.
        pub fn upsert_prompt(&mut self, prompt: SystemPrompt) {
            match self.system_prompts.iter_mut().find(|p| p.id == prompt.id) {
                Some(existing) => *existing = prompt,
                None => self.system_prompts.push(prompt),
            }
        }

        /// Select a prompt by id. Unknown ids leave the config unchanged.
        pub fn select_prompt(&mut self, id: &str) -> bool {
            if !self.system_prompts.iter().any(|p| p.id == id) {
                return false;
            }
            self.current_prompt_id = id.to_string();
            for prompt in &mut self.system_prompts {
                prompt.is_active = prompt.id == id;
            }
            true
        }
    }

    /// Bulk export format.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ConfigExport {
        #[serde(default)]
        pub version: Option<String>,
        #[serde(default)]
        pub export_time: i64,
        #[serde(default)]
        pub config: Option<AiConfig>,
    }
}

pub mod agent_api {
    use crate::error::ClientError;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        User,
        Assistant,
        System,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChatMessage {
        pub role: Role,
        pub content: String,
    }

    impl ChatMessage {
        pub fn user(content: impl Into<String>) -> Self {
            Self {
                role: Role::User,
                content: content.into(),
            }
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self {
                role: Role::Assistant,
                content: content.into(),
            }
        }

        pub fn system(content: impl Into<String>) -> Self {
            Self {
                role: Role::System,
                content: content.into(),
            }
        }
    }

    /// One event of a streamed completion. `Done` and `Error` are terminal.
    #[derive(Debug, Clone, PartialEq)]
    pub enum StreamChunk {
        Content(String),
        Reasoning(String),
        Done,
        Error(ClientError),
    }

    impl StreamChunk {
        pub fn is_terminal(&self) -> bool {
            matches!(self, StreamChunk::Done | StreamChunk::Error(_))
        }
    }

    // ── Non-streaming completion ─────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    #[serde(default)]
    pub struct ResponseMessage {
        pub role: String,
        pub content: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    #[serde(default)]
    pub struct ChatChoice {
        pub index: u32,
        pub message: ResponseMessage,
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    #[serde(default)]
    pub struct Usage {
        pub prompt_tokens: u64,
        pub completion_tokens: u64,
        pub total_tokens: u64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    #[serde(default)]
    pub struct ChatResponse {
        pub id: String,
        pub object: String,
        pub created: i64,
        pub model: String,
        pub choices: Vec<ChatChoice>,
        pub usage: Option<Usage>,
    }

    impl ChatResponse {
        pub fn first_content(&self) -> Option<&str> {
            self.choices.first().map(|c| c.message.content.as_str())
        }
    }

    // ── Models ───────────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
    #[serde(default)]
    pub struct ModelInfo {
        pub id: String,
        pub object: String,
        pub created: i64,
        pub owned_by: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
    #[serde(default)]
    pub struct ModelListResponse {
        pub object: String,
        pub data: Vec<ModelInfo>,
    }

    /// Result of probing a provider's credentials and base URL.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CheckConfigResponse {
        pub valid: bool,
        pub message: String,
        /// Round trip in milliseconds.
        pub latency: u64,
    }
}
