//! Configuration types for the voice engine.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the assistant interaction engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Session gating: wake phrase variants, idle timeout, spoken turns.
    pub conversation: ConversationConfig,
    /// Speech capture restart policy.
    pub capture: CaptureConfig,
    /// Speech synthesis settings.
    pub synthesis: SynthesisConfig,
    /// Remote collaborator endpoints.
    pub endpoints: EndpointConfig,
    /// Conversation history windows.
    pub history: HistoryConfig,
}

/// Conversation gate and session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Accepted wake phrase variants (phonetic near-matches of the
    /// assistant's name). Matched case-insensitively as standalone words.
    pub wake_variants: Vec<String>,
    /// Seconds of inactivity before the session returns to idle.
    /// 0 disables the timeout.
    pub idle_timeout_s: u32,
    /// Spoken when the session activates.
    pub greeting: String,
    /// Spoken when the session deactivates (explicitly or on timeout).
    pub farewell: String,
    /// Spoken in response to gratitude.
    pub thanks_reply: String,
    /// Spoken when no local rule and no remote fallback understood the command.
    pub not_understood_reply: String,
    /// Spoken when command processing fails outright.
    pub error_reply: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            wake_variants: ["lua", "lúa", "lia", "luá", "luar"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            idle_timeout_s: 60,
            greeting: "Olá senhor. Sou a LUA, sua assistente virtual. Como posso ajudá-lo hoje?"
                .to_owned(),
            farewell: "Estarei aqui quando precisar, senhor. Até logo.".to_owned(),
            thanks_reply: "Sempre às ordens, senhor. Posso ajudá-lo em algo mais?".to_owned(),
            not_understood_reply: "Desculpe senhor, não compreendi o comando. Poderia reformular?"
                .to_owned(),
            error_reply: "Ocorreu um erro ao processar o comando. Por favor, tente novamente."
                .to_owned(),
        }
    }
}

/// Speech capture restart policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Delay in ms before restarting a stream that ended on its own.
    pub restart_delay_ms: u64,
    /// Cool-down in ms before restarting after a recoverable error.
    pub error_cooldown_ms: u64,
    /// Recognition language tag passed to the capture port.
    pub language: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: 500,
            error_cooldown_ms: 2_000,
            language: "pt-BR".to_owned(),
        }
    }
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Voice profile requested from the remote synthesizer.
    pub voice_profile: String,
    /// Optional emotion hint for the remote synthesizer.
    pub emotion: Option<String>,
    /// Speaking rate multiplier.
    pub speed: f32,
    /// Preferred language tag for local fallback voice selection.
    pub language: String,
    /// Preferred gender hint for local fallback voice selection.
    pub voice_gender: VoiceGender,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice_profile: "luna".to_owned(),
            emotion: Some("confident".to_owned()),
            speed: 1.0,
            language: "pt-BR".to_owned(),
            voice_gender: VoiceGender::Female,
        }
    }
}

/// Gender hint used when picking a local fallback voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    #[default]
    Female,
    Male,
    /// No preference — take the platform default.
    Any,
}

/// Remote collaborator endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL of the backend serving chat, synthesis and record APIs.
    pub base_url: String,
    /// Request timeout in seconds for all collaborator calls.
    pub request_timeout_s: u64,
    /// Identity sent as `user_id` on chat fallback calls.
    pub user_id: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_owned(),
            request_timeout_s: 15,
            user_id: "web-user".to_owned(),
        }
    }
}

/// Conversation history window sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Turns sent as context to the remote chat fallback.
    pub context_turns: usize,
    /// Turns retained for the display window.
    pub display_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            context_turns: 5,
            display_turns: 5,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::EngineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::EngineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
