//! Typed events exchanged between the engine and its ports.
//!
//! Every raw platform callback (recognizer result, stream end, playback
//! completion) is translated into exactly one of these values before it
//! enters the session state machine, so the transition table can be driven
//! by scripted events under test.

use std::time::Instant;

/// One unit of recognized speech from the capture port.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// The recognized text.
    pub text: String,
    /// Whether the recognizer has committed this result. Interim
    /// utterances are overwritten by later ones until a final arrives.
    pub is_final: bool,
    /// When the audio behind this result was captured.
    pub captured_at: Instant,
}

impl Utterance {
    /// Build a final utterance stamped now.
    #[must_use]
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            captured_at: Instant::now(),
        }
    }

    /// Build an interim utterance stamped now.
    #[must_use]
    pub fn interim_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            captured_at: Instant::now(),
        }
    }
}

/// Failure kinds reported by the capture port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureErrorKind {
    /// The recognizer lost network connectivity.
    NetworkUnavailable,
    /// Microphone permission was denied. Capture is disabled for the
    /// rest of the session.
    PermissionDenied,
    /// The stream ended without hearing any speech.
    NoSpeechDetected,
    /// The stream was aborted by the platform.
    Aborted,
    /// Anything else.
    Other,
}

/// Events emitted by a capture port.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A recognizer result, interim or final.
    Utterance(Utterance),
    /// The underlying stream terminated (spontaneously or via `stop()`).
    StreamEnded,
    /// The stream failed.
    Error(CaptureErrorKind),
}

/// Events emitted while a synthesized reply plays back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Audio playback began.
    Started,
    /// Audio playback finished normally.
    Ended,
    /// Synthesis or playback failed; the turn completes silently.
    Error,
}

impl PlaybackEvent {
    /// Whether this event completes the speak call.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Error)
    }
}

/// Everything the session state machine reacts to, as a single queue.
#[derive(Debug)]
pub(crate) enum EngineEvent {
    /// A scheduled capture restart came due.
    CaptureRestartDue,
    /// A dispatched command resolved with a reply to speak.
    DispatchResolved(crate::dispatch::DispatchOutcome),
    /// The in-flight speak call emitted a playback event.
    Playback(PlaybackEvent),
}
