//! Outgoing message construction: system prompt selection and document
//! context injection.

use shared::agent_api::ChatMessage;
use shared::settings::AiConfig;

/// Fixed instructions for agent mode. Used verbatim, ignoring any configured
/// custom prompt.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are a professional AI assistant for editing documents.

## Behaviour rules

Only when the user **explicitly asks** to modify, edit or improve the document should you analyse it and return structured edit suggestions.

For ordinary conversation (greetings, small talk, questions unrelated to the document) reply normally in plain text. Do not analyse or comment on the document unprompted and do not output JSON.

## Output format

When the user explicitly asks for changes, your reply must be a single valid JSON object of this shape:
{
  "plan": ["step 1", "step 2"],
  "changes": [
    {
      "type": "replace",
      "position": "where the change goes (e.g. second paragraph, below the title, code block)",
      "oldText": "original text being replaced (used to locate the change)",
      "content": "new content"
    }
  ],
  "explanation": "why these changes were made"
}

## Change types
- replace: replace the content at the given position
- insert: insert new content at the given position
- delete: delete the content at the given position

## Constraints
1. Only output JSON when the user explicitly asks for modifications
2. The position field must describe the location precisely
3. The oldText field must contain enough original text to locate the change exactly
4. Keep the overall style and formatting of the document
5. Do not restructure the document unless asked"#;

const DOC_CONTEXT_HEADER: &str = "\n\n---\n## Document Context\n\n";
const DOC_CONTEXT_CAVEAT: &str = "The following is the document the user is currently editing, for reference only.\n\
**Important**: only reference or analyse the document when the user explicitly mentions it, asks a question about it, or asks for an operation on it. \
For ordinary conversation (greetings, small talk, questions unrelated to the document) reply normally and do not bring up or evaluate the document.\n\n";

/// Per-request options for a chat call.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub agent_mode: bool,
    pub doc_title: Option<String>,
    pub doc_content: Option<String>,
}

impl ChatOptions {
    pub fn agent() -> Self {
        Self {
            agent_mode: true,
            ..Self::default()
        }
    }

    pub fn with_document(mut self, title: Option<&str>, content: &str) -> Self {
        self.doc_title = title.map(str::to_string);
        self.doc_content = Some(content.to_string());
        self
    }
}

/// System message content for a request, or an empty string when neither a
/// prompt nor document context applies.
pub fn system_content(config: &AiConfig, options: &ChatOptions) -> String {
    let mut content = String::new();

    if options.agent_mode {
        content.push_str(AGENT_SYSTEM_PROMPT);
    } else if config.system_prompt_enabled {
        if let Some(prompt) = config.active_prompt() {
            content.push_str(&prompt.content);
        }
    }

    if config.doc_context_enabled {
        if let Some(doc) = options.doc_content.as_deref().filter(|d| !d.is_empty()) {
            content.push_str(DOC_CONTEXT_HEADER);
            content.push_str(DOC_CONTEXT_CAVEAT);
            if let Some(title) = options.doc_title.as_deref().filter(|t| !t.is_empty()) {
                content.push_str(&format!("Document title: {}\n", title));
            }
            content.push_str(&format!("Document content:\n```markdown\n{}\n```", doc));
        }
    }

    content
}

/// Full ordered message list: optional system message, then `history` as is.
pub fn build_messages(
    config: &AiConfig,
    history: &[ChatMessage],
    options: &ChatOptions,
) -> Vec<ChatMessage> {
    let system = system_content(config, options);
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !system.is_empty() {
        messages.push(ChatMessage::system(system));
    }
    messages.extend_from_slice(history);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::agent_api::Role;
    use shared::settings::SystemPrompt;

    fn config_with_prompt() -> AiConfig {
        AiConfig {
            base_url: "https://api.example.com".into(),
            api_key: "k".into(),
            model: "gpt-x".into(),
            system_prompts: vec![SystemPrompt {
                id: "p1".into(),
                name: "Editor".into(),
                content: "You are a careful copy editor.".into(),
                is_active: true,
            }],
            current_prompt_id: "p1".into(),
            system_prompt_enabled: true,
            ..AiConfig::default()
        }
    }

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("fix my intro"),
        ]
    }

    #[test]
    fn test_no_system_message_when_nothing_applies() {
        let config = AiConfig::default();
        let messages = build_messages(&config, &history(), &ChatOptions::default());
        assert_eq!(messages, history());
    }

    #[test]
    fn test_custom_prompt_prepended_and_history_kept_in_order() {
        let messages = build_messages(&config_with_prompt(), &history(), &ChatOptions::default());
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are a careful copy editor.");
        assert_eq!(&messages[1..], history().as_slice());
    }

    #[test]
    fn test_custom_prompt_ignored_when_disabled_or_dangling() {
        let mut config = config_with_prompt();
        config.system_prompt_enabled = false;
        assert!(system_content(&config, &ChatOptions::default()).is_empty());

        let mut config = config_with_prompt();
        config.current_prompt_id = "missing".into();
        assert!(system_content(&config, &ChatOptions::default()).is_empty());
    }

    #[test]
    fn test_agent_prompt_is_verbatim_and_overrides_custom_prompt() {
        let content = system_content(&config_with_prompt(), &ChatOptions::agent());
        assert_eq!(content, AGENT_SYSTEM_PROMPT);
        assert!(!content.contains("careful copy editor"));
    }

    #[test]
    fn test_chat_mode_never_carries_json_schema() {
        let content = system_content(&config_with_prompt(), &ChatOptions::default());
        assert!(!content.contains("\"changes\""));
        assert!(!content.contains("oldText"));
    }

    #[test]
    fn test_document_context_only_when_enabled() {
        let options = ChatOptions::default().with_document(Some("Notes"), "# Body text");

        let mut config = config_with_prompt();
        config.doc_context_enabled = false;
        let content = system_content(&config, &options);
        assert!(!content.contains("```markdown"));
        assert!(!content.contains("# Body text"));

        config.doc_context_enabled = true;
        let content = system_content(&config, &options);
        assert!(content.starts_with("You are a careful copy editor.\n\n---\n## Document Context"));
        assert!(content.contains("Document title: Notes\n"));
        assert!(content.ends_with("Document content:\n```markdown\n# Body text\n```"));
    }

    #[test]
    fn test_document_context_without_title_or_content() {
        let mut config = AiConfig::default();
        config.doc_context_enabled = true;

        let untitled = ChatOptions::default().with_document(None, "body");
        let content = system_content(&config, &untitled);
        assert!(!content.contains("Document title:"));
        assert!(content.contains("body"));

        let empty = ChatOptions::default().with_document(Some("T"), "");
        assert!(system_content(&config, &empty).is_empty());
    }

    #[test]
    fn test_agent_prompt_plus_document_context() {
        let mut config = AiConfig::default();
        config.doc_context_enabled = true;
        let options = ChatOptions::agent().with_document(None, "text");
        let messages = build_messages(&config, &[ChatMessage::user("edit")], &options);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with(AGENT_SYSTEM_PROMPT));
        assert!(messages[0].content.contains("```markdown\ntext\n```"));
    }
}
