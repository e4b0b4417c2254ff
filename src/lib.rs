//! Lua-voice: hands-free voice assistant interaction engine.
//!
//! Continuously listens for speech, gates on a wake phrase, classifies the
//! resulting utterance into an intent with extracted slots, dispatches the
//! intent to external actions and speaks the reply — remote synthesis
//! first, local fallback when it degrades.
//!
//! # Architecture
//!
//! Components are wired into a single event-driven session loop:
//! - **Capture**: platform speech recognition behind [`capture::SpeechCapturePort`],
//!   restarted per policy by [`capture::CaptureSupervisor`]
//! - **Wake gate**: phonetic wake-phrase matching ([`wake::WakeWordGate`])
//! - **Interpreter**: ordered rule table + remote fallback ([`intent::CommandInterpreter`])
//! - **Dispatcher**: intent → collaborator call + reply ([`dispatch::ActionDispatcher`])
//! - **Synthesis**: remote-primary, local-fallback speech output
//!   ([`synthesis::RemoteFirstSynthesizer`])
//! - **Feedback**: spectral output level for the visual indicator
//!   ([`feedback::AudioFeedbackAnalyzer`])
//! - **Engine**: the half-duplex session state machine ([`engine::VoiceEngine`])

pub mod capture;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod feedback;
pub mod history;
pub mod intent;
pub mod remote;
pub mod runtime;
pub mod synthesis;
pub mod test_support;
pub mod wake;

pub use config::EngineConfig;
pub use engine::{EnginePorts, SessionPhase, VoiceEngine};
pub use error::{EngineError, Result};
pub use events::{CaptureErrorKind, CaptureEvent, PlaybackEvent, Utterance};
pub use intent::{Confidence, Intent, IntentKind};
pub use runtime::RuntimeEvent;
