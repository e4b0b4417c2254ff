//! Wake phrase gating.
//!
//! Filters raw utterances coming off the capture port. While the session is
//! idle, any utterance — interim or final — containing a wake phrase variant
//! activates the session, so activation latency is not gated on recognizer
//! finality. While active, only final utterances are routed to the command
//! interpreter; interim ones just refresh the live transcript.

use crate::events::Utterance;

/// What the gate decided to do with one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Wake phrase heard while idle — activate the session.
    Activate,
    /// Final utterance while active — hand to the interpreter.
    Interpret,
    /// Interim utterance while active — update the live transcript only.
    Transcript,
    /// Nothing to do (non-matching speech while idle).
    Ignore,
}

/// Wake phrase matcher over a small set of phonetic variants.
#[derive(Debug, Clone)]
pub struct WakeWordGate {
    /// Lowercase variants of the assistant's name the recognizer tends to
    /// produce (e.g. "lua", "luar").
    variants: Vec<String>,
}

impl WakeWordGate {
    /// Create a gate from the configured variant list.
    #[must_use]
    pub fn new(variants: &[String]) -> Self {
        Self {
            variants: variants.iter().map(|v| v.to_lowercase()).collect(),
        }
    }

    /// Decide how to route one utterance given the current activation state.
    #[must_use]
    pub fn decide(&self, session_active: bool, utterance: &Utterance) -> GateDecision {
        if utterance.text.trim().is_empty() {
            return GateDecision::Ignore;
        }

        if session_active {
            if utterance.is_final {
                GateDecision::Interpret
            } else {
                GateDecision::Transcript
            }
        } else if self.matches(&utterance.text) {
            GateDecision::Activate
        } else {
            GateDecision::Ignore
        }
    }

    /// Whether the text contains any wake phrase variant.
    ///
    /// Matching is a case-insensitive substring check over text with
    /// punctuation stripped, so recognizer formatting ("Lua, ...") never
    /// masks the phrase.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let normalized = normalize(text);
        self.variants.iter().any(|v| normalized.contains(v.as_str()))
    }
}

/// Strip punctuation the recognizer inserts (commas, periods, etc.) and
/// lowercase, so phrase matching is resilient to transcription formatting.
/// For example, "Lua, abrir vales." → "lua abrir vales".
pub(crate) fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::ConversationConfig;

    fn gate() -> WakeWordGate {
        WakeWordGate::new(&ConversationConfig::default().wake_variants)
    }

    #[test]
    fn interim_utterance_activates_while_idle() {
        let decision = gate().decide(false, &Utterance::interim_text("lua"));
        assert_eq!(decision, GateDecision::Activate);
    }

    #[test]
    fn variant_with_punctuation_and_case_activates() {
        let decision = gate().decide(false, &Utterance::final_text("Oi, Lua!"));
        assert_eq!(decision, GateDecision::Activate);
    }

    #[test]
    fn phonetic_variants_activate() {
        for text in ["lia", "luar", "lúa"] {
            let decision = gate().decide(false, &Utterance::final_text(text));
            assert_eq!(decision, GateDecision::Activate, "variant {text}");
        }
    }

    #[test]
    fn unrelated_speech_is_ignored_while_idle() {
        let decision = gate().decide(false, &Utterance::final_text("bom dia pessoal"));
        assert_eq!(decision, GateDecision::Ignore);
    }

    #[test]
    fn final_goes_to_interpreter_while_active() {
        let decision = gate().decide(true, &Utterance::final_text("criar vale"));
        assert_eq!(decision, GateDecision::Interpret);
    }

    #[test]
    fn interim_only_updates_transcript_while_active() {
        let decision = gate().decide(true, &Utterance::interim_text("criar va"));
        assert_eq!(decision, GateDecision::Transcript);
    }

    #[test]
    fn empty_text_is_ignored() {
        assert_eq!(
            gate().decide(true, &Utterance::final_text("   ")),
            GateDecision::Ignore
        );
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize("Lua, criar vale."), "lua criar vale");
    }
}
