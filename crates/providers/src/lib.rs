//! OpenAI-compatible chat client used by the editor's assistant panel.

pub mod openai;
pub mod prompts;
pub mod sse;

pub use openai::{ChatStream, OpenAiCompatClient};
pub use prompts::{build_messages, ChatOptions, AGENT_SYSTEM_PROMPT};
