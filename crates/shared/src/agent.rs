//! Structured edit proposals returned by the assistant in agent mode, and
//! their application to (and removal from) a live markdown document.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Bytes of surrounding text kept to relocate a deleted span on undo.
const UNDO_CONTEXT: usize = 32;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*\})\s*```").expect("valid fenced json regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Replace,
    Insert,
    Delete,
}

/// What is needed to revert one applied change on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoData {
    /// Text that was in the document before the change (empty for inserts).
    pub original_content: String,
    /// Text the change put in its place (empty for deletes).
    pub applied_content: String,
    /// Byte offset where the change was made. Only a hint: later edits to
    /// earlier parts of the document shift it.
    pub offset: usize,
    /// Text immediately before and after the edited span at apply time.
    pub context_before: String,
    pub context_after: String,
}

fn context_before(doc: &str, offset: usize) -> &str {
    let mut start = offset.saturating_sub(UNDO_CONTEXT);
    while !doc.is_char_boundary(start) {
        start += 1;
    }
    &doc[start..offset]
}

fn context_after(doc: &str, end: usize) -> &str {
    let mut stop = (end + UNDO_CONTEXT).min(doc.len());
    while !doc.is_char_boundary(stop) {
        stop -= 1;
    }
    &doc[end..stop]
}

/// Start of the occurrence of `needle` closest to `hint`.
fn find_nearest(doc: &str, needle: &str, hint: usize) -> Option<usize> {
    doc.match_indices(needle)
        .map(|(pos, _)| pos)
        .min_by_key(|pos| pos.abs_diff(hint))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Human readable location, e.g. "second paragraph".
    #[serde(default)]
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(skip)]
    pub applied: bool,
    #[serde(skip)]
    pub undo_data: Option<UndoData>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    #[error("Change is already applied")]
    AlreadyApplied,

    #[error("Change has not been applied")]
    NotApplied,

    #[error("A {0:?} change needs the original text to locate it")]
    MissingOldText(ChangeType),

    #[error("Original text not found in document: {0}")]
    AnchorNotFound(String),

    #[error("Applied text is no longer present in the document")]
    AppliedContentMissing,
}

impl AgentChange {
    pub fn new(change_type: ChangeType, old_text: Option<&str>, content: &str) -> Self {
        Self {
            change_type,
            position: String::new(),
            old_text: old_text.map(str::to_string),
            content: content.to_string(),
            applied: false,
            undo_data: None,
        }
    }

    fn anchor(&self) -> Option<&str> {
        self.old_text.as_deref().filter(|t| !t.is_empty())
    }

    /// Apply the change to `doc`, returning the edited document and recording
    /// the undo data on `self`.
    pub fn apply(&mut self, doc: &str) -> Result<String, EditError> {
        if self.applied {
            return Err(EditError::AlreadyApplied);
        }

        let (offset, original, applied) = match self.change_type {
            ChangeType::Replace | ChangeType::Delete => {
                let anchor = self
                    .anchor()
                    .ok_or(EditError::MissingOldText(self.change_type))?;
                let offset = doc
                    .find(anchor)
                    .ok_or_else(|| EditError::AnchorNotFound(anchor.to_string()))?;
                let applied = if self.change_type == ChangeType::Replace {
                    self.content.clone()
                } else {
                    String::new()
                };
                (offset, anchor.to_string(), applied)
            }
            ChangeType::Insert => match self.anchor() {
                Some(anchor) => {
                    let pos = doc
                        .find(anchor)
                        .ok_or_else(|| EditError::AnchorNotFound(anchor.to_string()))?;
                    (pos + anchor.len(), String::new(), self.content.clone())
                }
                None => {
                    let mut applied = String::new();
                    if !doc.is_empty() && !doc.ends_with('\n') {
                        applied.push('\n');
                    }
                    applied.push_str(&self.content);
                    (doc.len(), String::new(), applied)
                }
            },
        };

        let mut edited = String::with_capacity(doc.len() + applied.len());
        edited.push_str(&doc[..offset]);
        edited.push_str(&applied);
        edited.push_str(&doc[offset + original.len()..]);

        self.applied = true;
        self.undo_data = Some(UndoData {
            context_before: context_before(doc, offset).to_string(),
            context_after: context_after(doc, offset + original.len()).to_string(),
            original_content: original,
            applied_content: applied,
            offset,
        });
        Ok(edited)
    }

    /// Revert this change in `doc`. Other changes applied before or after it
    /// are left alone.
    pub fn undo(&mut self, doc: &str) -> Result<String, EditError> {
        let undo = match (&self.undo_data, self.applied) {
            (Some(undo), true) => undo,
            _ => return Err(EditError::NotApplied),
        };

        let offset = if undo.applied_content.is_empty() {
            locate_gap(doc, undo).ok_or(EditError::AppliedContentMissing)?
        } else {
            let end = undo.offset + undo.applied_content.len();
            match doc.get(undo.offset..end) {
                Some(slice) if slice == undo.applied_content => undo.offset,
                _ => find_nearest(doc, &undo.applied_content, undo.offset)
                    .ok_or(EditError::AppliedContentMissing)?,
            }
        };

        let mut restored = String::with_capacity(doc.len() + undo.original_content.len());
        restored.push_str(&doc[..offset]);
        restored.push_str(&undo.original_content);
        restored.push_str(&doc[offset + undo.applied_content.len()..]);

        self.applied = false;
        self.undo_data = None;
        Ok(restored)
    }
}

/// Where a deleted span used to sit. The stored offset is trusted only while
/// the text around it is unchanged; otherwise the surrounding context is
/// searched for, falling back to either side alone.
fn locate_gap(doc: &str, undo: &UndoData) -> Option<usize> {
    let (before, after) = (undo.context_before.as_str(), undo.context_after.as_str());
    let fits = |offset: usize| {
        doc.is_char_boundary(offset)
            && doc[..offset].ends_with(before)
            && doc[offset..].starts_with(after)
    };
    if undo.offset <= doc.len() && fits(undo.offset) {
        return Some(undo.offset);
    }
    if before.is_empty() && after.is_empty() {
        return Some(undo.offset.min(doc.len())).filter(|o| doc.is_char_boundary(*o));
    }

    let joined = format!("{}{}", before, after);
    let hint = undo.offset.saturating_sub(before.len());
    if let Some(pos) = find_nearest(doc, &joined, hint) {
        return Some(pos + before.len());
    }
    if !after.is_empty() {
        if let Some(pos) = find_nearest(doc, after, undo.offset) {
            return Some(pos);
        }
    }
    if !before.is_empty() {
        return find_nearest(doc, before, hint).map(|pos| pos + before.len());
    }
    None
}

/// A model-proposed edit plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub plan: Vec<String>,
    pub changes: Vec<AgentChange>,
    #[serde(default)]
    pub explanation: String,
}

impl AgentResponse {
    /// Parse the assistant's final message. Accepts a bare JSON object, a
    /// fenced ```json block, or an object embedded in prose. Free-text replies
    /// yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if let Ok(resp) = serde_json::from_str::<AgentResponse>(trimmed) {
            return Some(resp);
        }
        if let Some(block) = FENCED_JSON.captures(trimmed).and_then(|c| c.get(1)) {
            if let Ok(resp) = serde_json::from_str::<AgentResponse>(block.as_str()) {
                return Some(resp);
            }
        }
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<AgentResponse>(&trimmed[start..=end]).ok()
    }

    /// Apply every pending change in order. Changes that cannot be applied are
    /// reported by index and leave the document untouched.
    pub fn apply_all(&mut self, doc: &str) -> (String, Vec<(usize, EditError)>) {
        let mut current = doc.to_string();
        let mut failures = Vec::new();
        for (idx, change) in self.changes.iter_mut().enumerate() {
            if change.applied {
                continue;
            }
            match change.apply(&current) {
                Ok(edited) => current = edited,
                Err(e) => {
                    tracing::debug!(index = idx, error = %e, "agent change not applied");
                    failures.push((idx, e));
                }
            }
        }
        (current, failures)
    }

    pub fn applied_count(&self) -> usize {
        self.changes.iter().filter(|c| c.applied).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Title\n\nFirst paragraph.\n\nSecond paragraph.\n";

    #[test]
    fn test_parse_bare_json() {
        let text = r##"{"plan":["fix title"],"changes":[{"type":"replace","position":"title","oldText":"# Title","content":"# Better"}],"explanation":"clearer"}"##;
        let resp = AgentResponse::parse(text).unwrap();
        assert_eq!(resp.plan, vec!["fix title".to_string()]);
        assert_eq!(resp.changes[0].change_type, ChangeType::Replace);
        assert_eq!(resp.changes[0].old_text.as_deref(), Some("# Title"));
        assert!(!resp.changes[0].applied);
    }

    #[test]
    fn test_parse_fenced_and_embedded() {
        let fenced = "Here you go:\n```json\n{\"changes\":[{\"type\":\"insert\",\"content\":\"x\"}]}\n```";
        assert_eq!(AgentResponse::parse(fenced).unwrap().changes.len(), 1);

        let embedded = "Sure! {\"changes\":[],\"explanation\":\"nothing\"} done.";
        assert_eq!(AgentResponse::parse(embedded).unwrap().explanation, "nothing");
    }

    #[test]
    fn test_free_text_is_not_agent_response() {
        assert!(AgentResponse::parse("Hello! How can I help you today?").is_none());
        assert!(AgentResponse::parse("{\"greeting\":\"hi\"}").is_none());
    }

    #[test]
    fn test_runtime_fields_not_serialized() {
        let mut change = AgentChange::new(ChangeType::Replace, Some("First"), "1st");
        change.apply(DOC).unwrap();
        let json = serde_json::to_string(&change).unwrap();
        assert!(!json.contains("applied"));
        assert!(!json.contains("undo"));
        assert!(json.contains("\"oldText\":\"First\""));
    }

    #[test]
    fn test_replace_and_undo() {
        let mut change = AgentChange::new(ChangeType::Replace, Some("First paragraph."), "Opening.");
        let edited = change.apply(DOC).unwrap();
        assert!(edited.contains("Opening."));
        assert!(!edited.contains("First paragraph."));
        assert_eq!(change.apply(&edited), Err(EditError::AlreadyApplied));

        let restored = change.undo(&edited).unwrap();
        assert_eq!(restored, DOC);
        assert_eq!(change.undo(&restored), Err(EditError::NotApplied));
    }

    #[test]
    fn test_delete_and_undo() {
        let mut change = AgentChange::new(ChangeType::Delete, Some("Second paragraph.\n"), "");
        let edited = change.apply(DOC).unwrap();
        assert_eq!(edited, "# Title\n\nFirst paragraph.\n\n");
        assert_eq!(change.undo(&edited).unwrap(), DOC);
    }

    #[test]
    fn test_delete_undo_after_earlier_text_grew() {
        let doc = "AAA BBB CCC";
        let mut delete = AgentChange::new(ChangeType::Delete, Some("BBB "), "");
        let mut grow = AgentChange::new(ChangeType::Replace, Some("AAA"), "AAAAAA");

        let edited = delete.apply(doc).unwrap();
        assert_eq!(edited, "AAA CCC");
        let edited = grow.apply(&edited).unwrap();
        assert_eq!(edited, "AAAAAA CCC");

        assert_eq!(delete.undo(&edited).unwrap(), "AAAAAA BBB CCC");
    }

    #[test]
    fn test_delete_undo_after_neighbour_rewritten() {
        let doc = "# Title\n\nDrop me.\n\nKeep me.\n";
        let mut delete = AgentChange::new(ChangeType::Delete, Some("Drop me.\n\n"), "");
        let mut rename =
            AgentChange::new(ChangeType::Replace, Some("# Title"), "# A much longer title");

        let edited = delete.apply(doc).unwrap();
        let edited = rename.apply(&edited).unwrap();
        assert_eq!(
            delete.undo(&edited).unwrap(),
            "# A much longer title\n\nDrop me.\n\nKeep me.\n"
        );
    }

    #[test]
    fn test_insert_after_anchor_and_append() {
        let mut after = AgentChange::new(ChangeType::Insert, Some("# Title\n"), "Intro.\n");
        let edited = after.apply(DOC).unwrap();
        assert!(edited.starts_with("# Title\nIntro.\n"));

        let mut append = AgentChange::new(ChangeType::Insert, None, "Appendix");
        let appended = append.apply("no newline").unwrap();
        assert_eq!(appended, "no newline\nAppendix");
        assert_eq!(append.undo(&appended).unwrap(), "no newline");
    }

    #[test]
    fn test_missing_anchor_is_reported() {
        let mut change = AgentChange::new(ChangeType::Replace, Some("Nowhere"), "x");
        assert_eq!(
            change.apply(DOC),
            Err(EditError::AnchorNotFound("Nowhere".into()))
        );
        assert!(!change.applied);

        let mut delete = AgentChange::new(ChangeType::Delete, None, "");
        assert_eq!(
            delete.apply(DOC),
            Err(EditError::MissingOldText(ChangeType::Delete))
        );
    }

    #[test]
    fn test_undo_one_change_keeps_the_others() {
        let mut resp = AgentResponse {
            plan: vec![],
            changes: vec![
                AgentChange::new(ChangeType::Replace, Some("# Title"), "# Renamed"),
                AgentChange::new(ChangeType::Replace, Some("Second"), "Last"),
            ],
            explanation: String::new(),
        };
        let (edited, failures) = resp.apply_all(DOC);
        assert!(failures.is_empty());
        assert_eq!(resp.applied_count(), 2);

        let reverted = resp.changes[0].undo(&edited).unwrap();
        assert!(reverted.starts_with("# Title\n"));
        assert!(reverted.contains("Last paragraph."));
        assert_eq!(resp.applied_count(), 1);
    }

    #[test]
    fn test_apply_all_reports_failures_by_index() {
        let mut resp = AgentResponse {
            plan: vec![],
            changes: vec![
                AgentChange::new(ChangeType::Replace, Some("missing"), "x"),
                AgentChange::new(ChangeType::Replace, Some("First"), "1st"),
            ],
            explanation: String::new(),
        };
        let (edited, failures) = resp.apply_all(DOC);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 0);
        assert!(edited.contains("1st paragraph."));
    }
}
