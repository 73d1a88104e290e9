use futures::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::Serialize;
use shared::agent_api::{
    ChatMessage, ChatResponse, CheckConfigResponse, ModelListResponse, StreamChunk,
};
use shared::settings::AiConfig;
use shared::ClientError;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::prompts::{build_messages, ChatOptions};
use crate::sse::{parse_line, LineFramer};

// No overall request timeout: streamed completions can run for minutes.
static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Deadline for the credential/base-URL probe.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(15);

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const MODELS_PATH: &str = "/v1/models";

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// `{base_url}{path}` with trailing slashes on the base removed.
fn endpoint(base_url: &str, path: &str) -> Result<Url, ClientError> {
    let base = base_url.trim().trim_end_matches('/');
    Url::parse(&format!("{}{}", base, path))
        .map_err(|e| ClientError::InvalidFormat(format!("invalid base URL {:?}: {}", base_url, e)))
}

fn network_error(err: reqwest::Error) -> ClientError {
    ClientError::Network(err.to_string())
}

async fn status_error(resp: Response) -> ClientError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ClientError::http_status(status, body)
}

/// How a body stream stopped without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamEnd {
    Completed,
    Cancelled,
}

/// Frame a response body into stream events and push them to `tx` in order.
/// A dropped receiver counts as cancellation.
pub(crate) async fn forward_stream<S, B, E>(
    body: S,
    tx: &UnboundedSender<StreamChunk>,
    cancel: &CancellationToken,
) -> Result<StreamEnd, ClientError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut body = std::pin::pin!(body);
    let mut framer = LineFramer::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
            next = body.next() => next,
        };
        match next {
            Some(Ok(bytes)) => {
                for line in framer.feed(bytes.as_ref()) {
                    for event in parse_line(&line) {
                        if tx.send(event).is_err() {
                            return Ok(StreamEnd::Cancelled);
                        }
                    }
                }
            }
            Some(Err(e)) => return Err(ClientError::Network(format!("stream read error: {}", e))),
            None => break,
        }
    }

    // Only newline-terminated lines are frames; a trailing partial line is
    // discarded.
    if let Some(tail) = framer.finish() {
        tracing::debug!(bytes = tail.len(), "dropping unterminated stream tail");
    }
    Ok(StreamEnd::Completed)
}

// ── Client ───────────────────────────────────────────────────────────

/// Client for OpenAI-compatible chat completion APIs, called directly with
/// the user's own key.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    http: Client,
}

impl Default for OpenAiCompatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiCompatClient {
    pub fn new() -> Self {
        Self {
            http: SHARED_HTTP.clone(),
        }
    }

    pub fn with_http(http: Client) -> Self {
        Self { http }
    }

    async fn post_completion(
        &self,
        config: &AiConfig,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<Response, ClientError> {
        let url = endpoint(&config.base_url, COMPLETIONS_PATH)?;
        let req = CompletionRequest {
            model: &config.model,
            messages,
            stream,
        };
        let resp = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", config.api_key))
            .header("Content-Type", "application/json")
            .json(&req)
            .send()
            .await
            .map_err(network_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        Ok(resp)
    }

    /// Single-shot completion. Cancelling `cancel` drops the in-flight request.
    pub async fn chat(
        &self,
        config: &AiConfig,
        messages: &[ChatMessage],
        options: &ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ClientError> {
        let full = build_messages(config, messages, options);
        let work = async {
            let resp = self.post_completion(config, &full, false).await?;
            resp.json::<ChatResponse>().await.map_err(|e| {
                if e.is_decode() {
                    ClientError::InvalidFormat(e.to_string())
                } else {
                    network_error(e)
                }
            })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("chat request cancelled");
                Err(ClientError::Cancelled)
            }
            result = work => result,
        }
    }

    /// Streamed completion. Events go to `tx` in arrival order and end with
    /// exactly one `Done` or one `Error`. Cancellation ends the stream with
    /// neither.
    pub async fn chat_stream(
        &self,
        config: &AiConfig,
        messages: &[ChatMessage],
        options: &ChatOptions,
        tx: &UnboundedSender<StreamChunk>,
        cancel: &CancellationToken,
    ) {
        let full = build_messages(config, messages, options);

        let setup = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            setup = self.post_completion(config, &full, true) => setup,
        };
        let resp = match setup {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "chat stream request failed");
                let _ = tx.send(StreamChunk::Error(e));
                return;
            }
        };

        match forward_stream(resp.bytes_stream(), tx, cancel).await {
            Ok(StreamEnd::Completed) => {
                let _ = tx.send(StreamChunk::Done);
            }
            Ok(StreamEnd::Cancelled) => tracing::debug!("chat stream cancelled"),
            Err(e) => {
                tracing::warn!(error = %e, "chat stream interrupted");
                let _ = tx.send(StreamChunk::Error(e));
            }
        }
    }

    /// Run `chat_stream` on a background task and hand back the event sequence.
    pub fn spawn_chat_stream(
        &self,
        config: AiConfig,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> ChatStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let client = self.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            client
                .chat_stream(&config, &messages, &options, &tx, &token)
                .await;
        });
        ChatStream { rx, cancel }
    }

    pub async fn list_models(
        &self,
        base_url: &str,
        api_key: &str,
    ) -> Result<ModelListResponse, ClientError> {
        let url = endpoint(base_url, MODELS_PATH)?;
        let resp = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(network_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        resp.json::<ModelListResponse>()
            .await
            .map_err(|e| ClientError::InvalidFormat(e.to_string()))
    }

    /// Probe the models endpoint to validate credentials and base URL.
    pub async fn check_config(&self, base_url: &str, api_key: &str) -> CheckConfigResponse {
        let started = Instant::now();
        let url = match endpoint(base_url, MODELS_PATH) {
            Ok(url) => url,
            Err(e) => {
                return CheckConfigResponse {
                    valid: false,
                    message: e.to_string(),
                    latency: 0,
                }
            }
        };

        let result = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .timeout(CHECK_TIMEOUT)
            .send()
            .await;
        let latency = started.elapsed().as_millis() as u64;

        let (valid, message) = match result {
            Ok(resp) if resp.status().is_success() => (true, "Configuration is valid".to_string()),
            Ok(resp) => {
                let status = resp.status().as_u16();
                let message = match status {
                    401 | 403 => "API key is invalid or lacks permission".to_string(),
                    404 => "Base URL is incorrect or not OpenAI compatible".to_string(),
                    429 => "Too many requests or quota exhausted".to_string(),
                    _ => {
                        let body = resp.text().await.unwrap_or_default();
                        format!("Upstream error ({}): {}", status, body)
                    }
                };
                (false, message)
            }
            Err(e) if e.is_timeout() => (
                false,
                "Request timed out, check the network or proxy settings".to_string(),
            ),
            Err(e) => (false, format!("Request failed: {}", e)),
        };

        if !valid {
            tracing::info!(latency, %message, "provider check failed");
        }
        CheckConfigResponse {
            valid,
            message,
            latency,
        }
    }
}

/// A running streamed completion. Iterate with [`ChatStream::next`] until a
/// terminal event; dropping the stream cancels the transfer.
pub struct ChatStream {
    rx: UnboundedReceiver<StreamChunk>,
    cancel: CancellationToken,
}

impl ChatStream {
    /// Next event, or `None` once the producer has finished.
    pub async fn next(&mut self) -> Option<StreamChunk> {
        self.rx.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
