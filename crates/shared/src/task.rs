//! Task blocks: one recorded user/assistant interaction in the chat history.

use crate::agent::AgentResponse;
use crate::agent_api::StreamChunk;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Chat,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBlock {
    pub id: String,
    pub user_task: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_response: Option<AgentResponse>,
    pub status: TaskStatus,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TaskMode>,
}

impl TaskBlock {
    pub fn new(user_task: impl Into<String>, mode: TaskMode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_task: user_task.into(),
            reasoning: String::new(),
            output: String::new(),
            agent_response: None,
            status: TaskStatus::Pending,
            timestamp: Utc::now().timestamp_millis(),
            mode: Some(mode),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Error)
    }

    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Processing;
        }
    }

    /// Fold one stream event into the block. Events arriving after a terminal
    /// state are ignored.
    pub fn absorb(&mut self, chunk: &StreamChunk) {
        if self.is_finished() {
            return;
        }
        match chunk {
            StreamChunk::Reasoning(text) => {
                self.start();
                self.reasoning.push_str(text);
            }
            StreamChunk::Content(text) => {
                self.start();
                self.output.push_str(text);
            }
            StreamChunk::Done => self.complete(),
            StreamChunk::Error(err) => self.fail(&err.to_string()),
        }
    }

    /// Mark the block completed. In agent mode the output is parsed into a
    /// structured edit plan when it holds one.
    pub fn complete(&mut self) {
        if self.is_finished() {
            return;
        }
        if self.mode == Some(TaskMode::Agent) {
            self.agent_response = AgentResponse::parse(&self.output);
        }
        self.status = TaskStatus::Completed;
    }

    pub fn fail(&mut self, message: &str) {
        if self.is_finished() {
            return;
        }
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        self.output.push_str(&format!("[Error: {}]", message));
        self.status = TaskStatus::Error;
    }
}
