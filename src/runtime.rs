//! Runtime events emitted by the engine for UI and observability.
//!
//! This is intentionally lightweight (no heavy payloads) so the engine can
//! emit events without blocking the session loop. Display collaborators
//! (chat transcript, status line, visual indicator) subscribe to these;
//! nothing here feeds back into dispatch or state transitions.

use crate::engine::SessionPhase;
use crate::history::ConversationTurn;

/// Events that describe what the engine is doing "right now".
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// The session moved to a new phase.
    PhaseChanged(SessionPhase),
    /// Live transcript of what the recognizer currently hears.
    Transcript { text: String, is_final: bool },
    /// A turn was appended to the conversation history.
    Turn(ConversationTurn),
    /// An action command was emitted to the navigation/modal collaborator.
    Action(crate::dispatch::ActionCommand),
    /// Best-effort output audio level in `[0, 1]` while the assistant speaks.
    ///
    /// Intended for driving the visual pulse indicator.
    AudioLevel { level: f32 },
    /// Human-readable status line ("Aguardando comando...", error notes).
    Status { text: String },
    /// Capture became permanently unavailable (microphone permission denied).
    CaptureUnavailable,
}
