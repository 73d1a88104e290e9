//! Backend API client.
//!
//! Requests go out on one of three channels. `data` carries the user's bearer
//! token and recovers from expired tokens through the [`RefreshCoordinator`],
//! `auth` signs requests with a rotating basic credential, and `open` is
//! unauthenticated. Every response is unwrapped from the backend's
//! `{code, message, data}` envelope; failures are reported to the
//! [`Notifier`] before being returned.

use crate::notify::Notifier;
use crate::refresh::RefreshCoordinator;
use crate::token_store::TokenStore;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use shared::token::Token;
use shared::ClientError;
use std::sync::Arc;
use std::time::Duration;

const CONNECTION_TIMEOUT_MESSAGE: &str = "Connection timed out";
const SERVER_ERROR_MESSAGE: &str = "Server error";
const AUTH_FAILED_MESSAGE: &str = "Authentication failed, please sign in again";

/// Width of one basic-credential window (10 minutes).
const BASIC_WINDOW_MS: i64 = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Data,
    Auth,
    Open,
}

impl Channel {
    pub fn segment(&self) -> &'static str {
        match self {
            Channel::Data => "data",
            Channel::Auth => "token",
            Channel::Open => "open",
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            Channel::Auth => Duration::from_secs(10),
            Channel::Data | Channel::Open => Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub channel: Channel,
    pub method: Method,
    /// Path below the channel prefix, starting with `/`.
    pub path: String,
    pub body: Option<Value>,
    pub authorization: Option<String>,
}

impl ApiRequest {
    pub fn new(channel: Channel, method: Method, path: impl Into<String>) -> Self {
        Self {
            channel,
            method,
            path: path.into(),
            body: None,
            authorization: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// What came back over the wire, before envelope handling.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<T, ClientError> {
        self.data
            .ok_or_else(|| ClientError::InvalidFormat("response carried no data".into()))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, ClientError>;
}

/// Sends requests to `{base}/{channel}{path}` where `base` is the backend
/// host plus its context path.
pub struct ReqwestTransport {
    http: Client,
    base: String,
}

impl ReqwestTransport {
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_http(Client::new(), base)
    }

    pub fn with_http(http: Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { http, base }
    }

    pub fn url(&self, request: &ApiRequest) -> String {
        format!("{}/{}{}", self.base, request.channel.segment(), request.path)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, ClientError> {
        let url = self.url(request);
        let timeout = request.channel.timeout();
        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        }
        .timeout(timeout);
        if let Some(auth) = &request.authorization {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let to_error = |e: reqwest::Error| {
            if e.is_timeout() {
                ClientError::Timeout {
                    millis: timeout.as_millis() as u64,
                }
            } else {
                ClientError::Network(e.to_string())
            }
        };
        let response = builder.send().await.map_err(to_error)?;
        let status = response.status();
        let body = response.text().await.map_err(to_error)?;
        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// `hex(sha256(key + floor(now_ms / 10min)))`.
pub fn basic_credential(key: &str, now_ms: i64) -> String {
    let window = now_ms.div_euclid(BASIC_WINDOW_MS);
    let digest = Sha256::digest(format!("{}{}", key, window).as_bytes());
    format!("{:x}", digest)
}

enum Reply {
    Success(Envelope<Value>),
    Unauthorized,
}

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: TokenStore,
    coordinator: Arc<RefreshCoordinator>,
    notifier: Arc<dyn Notifier>,
    basic_token_key: String,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: TokenStore,
        notifier: Arc<dyn Notifier>,
        basic_token_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            tokens,
            coordinator: Arc::new(RefreshCoordinator::new()),
            notifier,
            basic_token_key: basic_token_key.into(),
        }
    }

    pub fn with_coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub async fn data<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope<T>, ClientError> {
        self.request(Channel::Data, method, path, body).await
    }

    pub async fn auth<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope<T>, ClientError> {
        self.request(Channel::Auth, method, path, body).await
    }

    pub async fn open<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope<T>, ClientError> {
        self.request(Channel::Open, method, path, body).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        channel: Channel,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope<T>, ClientError> {
        let mut request = ApiRequest::new(channel, method, path);
        request.body = body;
        let envelope = match self.send_once(&mut request).await? {
            Reply::Success(envelope) => envelope,
            Reply::Unauthorized => self.recover(request).await?,
        };
        decode(envelope)
    }

    /// Apply the channel's authorization unless the caller set one already.
    fn intercept_request(&self, request: &mut ApiRequest) {
        if request.authorization.is_some() {
            return;
        }
        request.authorization = match request.channel {
            Channel::Data => Some(self.bearer()),
            Channel::Auth => Some(format!(
                "Basic {}",
                basic_credential(&self.basic_token_key, chrono::Utc::now().timestamp_millis())
            )),
            Channel::Open => None,
        };
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.tokens.access_token().unwrap_or_default())
    }

    async fn send_once(&self, request: &mut ApiRequest) -> Result<Reply, ClientError> {
        self.intercept_request(request);
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<Reply, ClientError> {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(path = %request.path, error = %e, "request failed");
                self.notifier.error(CONNECTION_TIMEOUT_MESSAGE);
                return Err(e);
            }
        };
        self.intercept_response(request, response)
    }

    fn intercept_response(
        &self,
        request: &ApiRequest,
        response: RawResponse,
    ) -> Result<Reply, ClientError> {
        if response.status != 200 {
            let message = if response.status_text.is_empty() {
                CONNECTION_TIMEOUT_MESSAGE
            } else {
                response.status_text.as_str()
            };
            self.notifier.error(message);
            return Err(ClientError::http_status(response.status, response.body));
        }

        let envelope: Envelope<Value> = match serde_json::from_str(&response.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.notifier.error(SERVER_ERROR_MESSAGE);
                return Err(e.into());
            }
        };
        match envelope.code {
            200 => Ok(Reply::Success(envelope)),
            401 if request.channel == Channel::Data => Ok(Reply::Unauthorized),
            code => {
                let message = if envelope.message.is_empty() {
                    SERVER_ERROR_MESSAGE.to_string()
                } else {
                    envelope.message
                };
                self.notifier.error(&message);
                Err(ClientError::Business { code, message })
            }
        }
    }

    /// Refresh (or wait for the in-flight refresh), then replay once.
    async fn recover(&self, mut request: ApiRequest) -> Result<Envelope<Value>, ClientError> {
        self.coordinator.refresh(|| self.refresh_tokens()).await?;
        request.authorization = Some(self.bearer());
        match self.dispatch(&request).await? {
            Reply::Success(envelope) => Ok(envelope),
            Reply::Unauthorized => {
                self.notifier.error(AUTH_FAILED_MESSAGE);
                Err(ClientError::AuthExpired)
            }
        }
    }

    async fn refresh_tokens(&self) -> Result<(), ClientError> {
        let refresh_token = self.tokens.refresh_token().unwrap_or_default();
        let mut request = ApiRequest::new(Channel::Auth, Method::Post, "/refresh")
            .with_body(json!({ "refreshToken": refresh_token }));
        let outcome = match self.send_once(&mut request).await {
            Ok(Reply::Success(envelope)) => decode::<Token>(envelope).and_then(Envelope::into_data),
            Ok(Reply::Unauthorized) => Err(ClientError::AuthExpired),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(token) => {
                self.tokens.set_token(&token)?;
                tracing::info!(name = %token.name, "access token refreshed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, clearing session");
                if let Err(clear_err) = self.tokens.clear() {
                    tracing::warn!(error = %clear_err, "failed to clear credentials");
                }
                self.notifier.session_reset();
                Err(e)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(envelope: Envelope<Value>) -> Result<Envelope<T>, ClientError> {
    let data = match envelope.data {
        None | Some(Value::Null) => None,
        Some(value) => Some(serde_json::from_value(value)?),
    };
    Ok(Envelope {
        code: envelope.code,
        message: envelope.message,
        data,
    })
}
