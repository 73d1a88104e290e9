//! Line framing for OpenAI-style streamed completions.
//!
//! The provider sends one `data: {json}` line per delta, terminated by
//! `data: [DONE]`. Bytes arrive in arbitrary chunks, so decoding and line
//! splitting both carry state across reads.

use serde::Deserialize;
use shared::agent_api::StreamChunk;

const DATA_PREFIX: &str = "data: ";
const DONE_LINE: &str = "data: [DONE]";

/// Stateful UTF-8 decoder: a multi-byte character split across two reads is
/// held back until its remaining bytes arrive. Invalid sequences decode to
/// U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + bad;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
        out
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// Splits decoded text on `\n`, retaining the trailing partial segment until
/// the next read completes it.
#[derive(Debug, Default)]
pub struct LineFramer {
    decoder: Utf8StreamDecoder,
    buffer: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the HTTP response. Returns every complete line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            lines.push(self.buffer[..pos].to_string());
            self.buffer.drain(..pos + 1);
        }
        lines
    }

    /// End of body: the unterminated remainder, if any. It is not a complete
    /// frame and callers do not parse it.
    pub fn finish(&mut self) -> Option<String> {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

// ── Frame schema ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StreamFrame {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    /// Separate "thinking" channel exposed by some models.
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// Turn one framed line into stream events. Blank lines, the `[DONE]`
/// terminator, non-data lines and frames that fail to decode all yield
/// nothing. Reasoning is emitted before content for the same frame.
pub fn parse_line(line: &str) -> Vec<StreamChunk> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed == DONE_LINE {
        return Vec::new();
    }
    let Some(payload) = trimmed.strip_prefix(DATA_PREFIX) else {
        return Vec::new();
    };

    let frame = match serde_json::from_str::<StreamFrame>(payload) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed stream frame");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    if let Some(delta) = frame.choices.into_iter().next().and_then(|c| c.delta) {
        if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
            events.push(StreamChunk::Reasoning(reasoning));
        }
        if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
            events.push(StreamChunk::Content(content));
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(content: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    fn run(chunks: &[&[u8]]) -> Vec<StreamChunk> {
        let mut framer = LineFramer::new();
        let mut events = Vec::new();
        for chunk in chunks {
            for line in framer.feed(chunk) {
                events.extend(parse_line(&line));
            }
        }
        events
    }

    #[test]
    fn test_decoder_holds_split_multibyte_char() {
        let bytes = "héllo".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        // 'é' is two bytes; split between them.
        assert_eq!(decoder.decode(&bytes[..2]), "h");
        assert_eq!(decoder.decode(&bytes[2..]), "éllo");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_framer_retains_partial_line() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"data: {\"a\"").is_empty());
        let lines = framer.feed(b":1}\ndata: x");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string()]);
        assert_eq!(framer.finish().as_deref(), Some("data: x"));
    }

    #[test]
    fn test_skips_noise_lines() {
        assert!(parse_line("").is_empty());
        assert!(parse_line("   ").is_empty());
        assert!(parse_line("data: [DONE]").is_empty());
        assert!(parse_line(": keep-alive").is_empty());
        assert!(parse_line("event: ping").is_empty());
        assert!(parse_line("data: {not json").is_empty());
        // Valid JSON with the wrong shape is skipped the same way.
        assert!(parse_line(r#"data: {"choices": "nope"}"#).is_empty());
        assert!(parse_line(r#"data: {"choices": []}"#).is_empty());
    }

    #[test]
    fn test_reasoning_before_content_in_same_frame() {
        let events =
            parse_line(r#"data: {"choices":[{"delta":{"reasoning_content":"hmm","content":"ok"}}]}"#);
        assert_eq!(
            events,
            vec![
                StreamChunk::Reasoning("hmm".into()),
                StreamChunk::Content("ok".into())
            ]
        );
    }

    #[test]
    fn test_null_and_empty_fields_ignored() {
        let events =
            parse_line(r#"data: {"choices":[{"delta":{"content":null,"reasoning_content":""}}]}"#);
        assert!(events.is_empty());
    }

    #[test]
    fn test_content_concatenation_excludes_malformed_frames() {
        let stream = format!(
            "{}data: {{broken\n{}{}data: [DONE]\n",
            frame("alpha "),
            frame("beta "),
            frame("gamma")
        );
        let text: String = run(&[stream.as_bytes()])
            .into_iter()
            .filter_map(|e| match e {
                StreamChunk::Content(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(text, "alpha beta gamma");
    }

    #[test]
    fn test_split_at_every_offset_matches_single_chunk() {
        let stream = format!("{}{}data: [DONE]\n", frame("你好, "), frame("wörld 🎉"));
        let bytes = stream.as_bytes();
        let whole = run(&[bytes]);
        assert_eq!(whole.len(), 2);

        for split in 1..bytes.len() {
            let parts = run(&[&bytes[..split], &bytes[split..]]);
            assert_eq!(parts, whole, "split at byte {}", split);
        }
    }

    #[test]
    fn test_unterminated_final_frame_is_dropped() {
        let stream = format!("{}{}", frame("kept"), frame("lost"));
        let events = run(&[stream.trim_end().as_bytes()]);
        assert_eq!(events, vec![StreamChunk::Content("kept".into())]);
    }
}
