//! Remote collaborator clients.
//!
//! HTTP clients for the backend the assistant talks to: the conversational
//! chat fallback, the speech synthesis service (with its health probe) and
//! the record/report APIs. All calls have a bounded timeout and no
//! automatic retry — a single failure degrades to a fallback path or a
//! spoken error at the call site, never a blocked loop.

use crate::config::EndpointConfig;
use crate::error::{EngineError, Result};
use crate::history::ConversationTurn;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Context bundle sent with every chat fallback call.
#[derive(Debug, Clone)]
pub struct ChatContext {
    /// Caller identity forwarded as `user_id`.
    pub user_id: String,
    /// Recent conversation turns, oldest first.
    pub history: Vec<ConversationTurn>,
    /// When the message was produced.
    pub timestamp: DateTime<Utc>,
    /// Opaque identity/profile blob supplied by the host; passed through
    /// unchanged.
    pub identity: Option<serde_json::Value>,
}

/// Answer from the conversational fallback.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    /// Free-text reply to speak.
    pub response: String,
    /// Optional action verb for the UI collaborator.
    #[serde(default)]
    pub action: Option<String>,
    /// Optional module the action targets.
    #[serde(default)]
    pub module: Option<String>,
    /// Optional action payload, treated as opaque.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Conversational fallback port.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Send one user message with context; returns the assistant's answer.
    async fn converse(&self, message: &str, context: &ChatContext) -> Result<ChatReply>;
}

/// Record collaborator port (advances, reports).
#[async_trait]
pub trait RecordsPort: Send + Sync {
    /// Create an advance for an employee.
    async fn create_advance(&self, employee: &str, amount: f64, reason: &str) -> Result<()>;

    /// Search advances by employee name.
    async fn search_advances(&self, employee: &str) -> Result<Vec<AdvanceRecord>>;

    /// Generate a report of the given type over the given period.
    async fn generate_report(&self, report_type: &str, period: &str) -> Result<ReportSummary>;
}

/// One advance record as returned by the search API.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvanceRecord {
    /// Advance amount in reais.
    pub amount: f64,
    /// Employee the advance belongs to, when the API includes it.
    #[serde(default)]
    pub employee_name: Option<String>,
}

/// Summary line of a generated report.
#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub summary: String,
}

/// HTTP implementation of [`ChatPort`].
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    chat_path: String,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    message: &'a str,
    user_id: &'a str,
    context: ChatRequestContext<'a>,
}

#[derive(Serialize)]
struct ChatRequestContext<'a> {
    history: Vec<ChatHistoryEntry<'a>>,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a serde_json::Value>,
}

#[derive(Serialize)]
struct ChatHistoryEntry<'a> {
    role: &'a str,
    content: &'a str,
}

impl ChatClient {
    /// Build a client against the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            http: build_http(config.request_timeout_s)?,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            chat_path: "/api/chat".to_owned(),
        })
    }

    /// Override the chat path (used by tests and non-default deployments).
    #[must_use]
    pub fn with_chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = path.into();
        self
    }
}

#[async_trait]
impl ChatPort for ChatClient {
    async fn converse(&self, message: &str, context: &ChatContext) -> Result<ChatReply> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, "chat fallback call");

        let history: Vec<ChatHistoryEntry<'_>> = context
            .history
            .iter()
            .map(|turn| ChatHistoryEntry {
                role: match turn.role {
                    crate::history::Role::User => "user",
                    crate::history::Role::Assistant => "assistant",
                    crate::history::Role::System => "system",
                },
                content: &turn.text,
            })
            .collect();

        let body = ChatRequestBody {
            message,
            user_id: &context.user_id,
            context: ChatRequestContext {
                history,
                timestamp: context.timestamp,
                user: context.identity.as_ref(),
            },
        };

        let response = self
            .http
            .post(format!("{}{}", self.base_url, self.chat_path))
            .header("x-request-id", request_id.to_string())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<ChatReply>().await?)
    }
}

/// Wire response of the synthesis endpoint.
#[derive(Debug, Deserialize)]
struct SynthesisResponseBody {
    success: bool,
    #[serde(default)]
    audio_base64: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Wire response of the synthesis health probe.
#[derive(Debug, Deserialize)]
struct SynthesisStatusBody {
    success: bool,
    #[serde(default)]
    engine_loaded: bool,
}

/// HTTP client for the primary (remote) speech synthesis service.
pub struct TtsClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SynthesisRequestBody<'a> {
    text: &'a str,
    voice: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    emotion: Option<&'a str>,
    speed: f32,
    format: &'a str,
}

impl TtsClient {
    /// Build a client against the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            http: build_http(config.request_timeout_s)?,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Synthesize text on the remote service and decode the audio payload.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success body, or a
    /// payload that fails to decode.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        emotion: Option<&str>,
        speed: f32,
    ) -> Result<crate::synthesis::AudioClip> {
        let body = SynthesisRequestBody {
            text,
            voice,
            emotion,
            speed,
            format: "base64",
        };

        let response = self
            .http
            .post(format!("{}/api/tts/speak", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<SynthesisResponseBody>()
            .await?;

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "unspecified".to_owned());
            return Err(EngineError::Synthesis(format!(
                "remote synthesis refused: {reason}"
            )));
        }

        let encoded = response
            .audio_base64
            .ok_or_else(|| EngineError::Synthesis("remote synthesis returned no audio".into()))?;
        let data = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| EngineError::Synthesis(format!("bad audio payload: {e}")))?;

        info!(bytes = data.len(), "remote synthesis succeeded");
        Ok(crate::synthesis::AudioClip {
            data,
            format: response.format.unwrap_or_else(|| "wav".to_owned()),
        })
    }

    /// Probe whether the remote synthesis engine is up and loaded.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure; an unhealthy-but-reachable
    /// service resolves to `Ok(false)`.
    pub async fn probe(&self) -> Result<bool> {
        let response = self
            .http
            .get(format!("{}/api/tts/status", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<SynthesisStatusBody>()
            .await?;
        Ok(response.success && response.engine_loaded)
    }
}

/// Wire response of the record creation endpoint.
#[derive(Debug, Deserialize)]
struct CreateAdvanceResponseBody {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Wire response of the record search endpoint.
#[derive(Debug, Deserialize)]
struct SearchAdvancesResponseBody {
    #[serde(default)]
    vales: Vec<AdvanceRecord>,
}

/// Wire response of the report endpoint.
#[derive(Debug, Deserialize)]
struct ReportResponseBody {
    success: bool,
    #[serde(default)]
    summary: Option<String>,
}

/// HTTP implementation of [`RecordsPort`].
pub struct RecordsClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CreateAdvanceRequestBody<'a> {
    employee_name: &'a str,
    amount: f64,
    reason: &'a str,
}

impl RecordsClient {
    /// Build a client against the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            http: build_http(config.request_timeout_s)?,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl RecordsPort for RecordsClient {
    async fn create_advance(&self, employee: &str, amount: f64, reason: &str) -> Result<()> {
        let body = CreateAdvanceRequestBody {
            employee_name: employee,
            amount,
            reason,
        };
        let response = self
            .http
            .post(format!("{}/api/vales/create-via-ai", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<CreateAdvanceResponseBody>()
            .await?;

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "unspecified".to_owned());
            warn!("advance creation refused: {reason}");
            return Err(EngineError::Dispatch(format!(
                "advance creation refused: {reason}"
            )));
        }
        Ok(())
    }

    async fn search_advances(&self, employee: &str) -> Result<Vec<AdvanceRecord>> {
        let response = self
            .http
            .get(format!("{}/api/vales/search", self.base_url))
            .query(&[("employee", employee)])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchAdvancesResponseBody>()
            .await?;
        Ok(response.vales)
    }

    async fn generate_report(&self, report_type: &str, period: &str) -> Result<ReportSummary> {
        let response = self
            .http
            .get(format!("{}/api/reports/{report_type}", self.base_url))
            .query(&[("period", period)])
            .send()
            .await?
            .error_for_status()?
            .json::<ReportResponseBody>()
            .await?;

        if !response.success {
            return Err(EngineError::Dispatch("report generation refused".into()));
        }
        Ok(ReportSummary {
            summary: response.summary.unwrap_or_default(),
        })
    }
}

fn build_http(timeout_s: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_s))
        .build()
        .map_err(EngineError::from)
}
