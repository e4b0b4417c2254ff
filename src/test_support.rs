//! Shared scripted fakes used by the integration tests.
//!
//! The engine's ports are substituted with deterministic implementations:
//! a capture port that records start/stop calls and lets the test inject
//! utterance events, an output port that "plays" instantly and records what
//! was spoken, and an in-memory record collaborator.

use crate::capture::SpeechCapturePort;
use crate::error::{EngineError, Result};
use crate::events::{CaptureEvent, PlaybackEvent, Utterance};
use crate::remote::{AdvanceRecord, ChatContext, ChatPort, ChatReply, RecordsPort, ReportSummary};
use crate::synthesis::{
    AudioClip, LocalSynthesizer, LocalVoice, PlaybackSink, SpeechOutputPort, SpeechRequest,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Observable state of a [`ScriptedCapture`] shared with the test.
#[derive(Debug, Default)]
pub struct CaptureProbe {
    /// Number of `start()` calls observed.
    pub start_calls: AtomicUsize,
    /// Number of `stop()` calls observed.
    pub stop_calls: AtomicUsize,
    /// Whether the stream is currently open.
    pub running: AtomicBool,
}

/// Capture port driven by the test: events are injected through the handle
/// returned by [`ScriptedCapture::new`].
pub struct ScriptedCapture {
    probe: Arc<CaptureProbe>,
}

impl ScriptedCapture {
    /// Build the fake port plus the channel the engine will consume and a
    /// probe for assertions.
    #[must_use]
    pub fn new() -> (
        Self,
        mpsc::UnboundedSender<CaptureEvent>,
        mpsc::UnboundedReceiver<CaptureEvent>,
        Arc<CaptureProbe>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Arc::new(CaptureProbe::default());
        (
            Self {
                probe: Arc::clone(&probe),
            },
            tx,
            rx,
            probe,
        )
    }
}

#[async_trait]
impl SpeechCapturePort for ScriptedCapture {
    async fn start(&mut self) -> Result<()> {
        // Starting an already-open stream is a no-op, like the platform API.
        if !self.probe.running.swap(true, Ordering::SeqCst) {
            self.probe.start_calls.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn stop(&mut self) {
        if self.probe.running.swap(false, Ordering::SeqCst) {
            self.probe.stop_calls.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Convenience constructors for injected utterance events.
#[must_use]
pub fn final_utterance(text: &str) -> CaptureEvent {
    CaptureEvent::Utterance(Utterance::final_text(text))
}

/// Interim variant of [`final_utterance`].
#[must_use]
pub fn interim_utterance(text: &str) -> CaptureEvent {
    CaptureEvent::Utterance(Utterance::interim_text(text))
}

/// Output port that completes playback immediately and records requests.
#[derive(Default)]
pub struct InstantOutput {
    /// Every request spoken, in order.
    pub spoken: Mutex<Vec<SpeechRequest>>,
    /// When set, every speak resolves with a playback error instead.
    pub fail_playback: bool,
}

impl InstantOutput {
    /// Texts spoken so far.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .map(|s| s.iter().map(|r| r.text.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SpeechOutputPort for InstantOutput {
    async fn speak(&self, request: SpeechRequest) -> mpsc::Receiver<PlaybackEvent> {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(request);
        }
        let (tx, rx) = mpsc::channel(4);
        let fail = self.fail_playback;
        tokio::spawn(async move {
            let _ = tx.send(PlaybackEvent::Started).await;
            // Yield once so the engine observes the Speaking phase.
            tokio::task::yield_now().await;
            let terminal = if fail {
                PlaybackEvent::Error
            } else {
                PlaybackEvent::Ended
            };
            let _ = tx.send(terminal).await;
        });
        rx
    }
}

/// Chat fallback that answers with a fixed reply, or fails when unset.
#[derive(Default)]
pub struct ScriptedChat {
    /// Reply returned for every call; `None` fails the call.
    pub reply: Option<ChatReply>,
    /// Number of calls observed.
    pub calls: AtomicUsize,
}

#[async_trait]
impl ChatPort for ScriptedChat {
    async fn converse(&self, _message: &str, _context: &ChatContext) -> Result<ChatReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| EngineError::Classification("chat fallback unavailable".into()))
    }
}

/// Local synthesizer fake with a fixed voice inventory.
#[derive(Default)]
pub struct FixedLocalSynth {
    /// Voices the fake platform offers.
    pub voices: Vec<LocalVoice>,
    /// When set, synthesis fails.
    pub fail: bool,
    /// Number of synthesize calls observed.
    pub calls: AtomicUsize,
    /// Voice ids requested, in order (`None` = platform default).
    pub requested_voices: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl LocalSynthesizer for FixedLocalSynth {
    fn voices(&self) -> Vec<LocalVoice> {
        self.voices.clone()
    }

    async fn synthesize(&self, _text: &str, voice: Option<&str>, _speed: f32) -> Result<AudioClip> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requested) = self.requested_voices.lock() {
            requested.push(voice.map(str::to_owned));
        }
        if self.fail {
            return Err(EngineError::Synthesis("local engine broken".into()));
        }
        Ok(AudioClip {
            data: b"local-audio".to_vec(),
            format: "wav".to_owned(),
        })
    }
}

/// Playback sink that plays every clip instantly.
#[derive(Default)]
pub struct InstantSink {
    /// Clips played, in order.
    pub played: Mutex<Vec<AudioClip>>,
}

#[async_trait]
impl PlaybackSink for InstantSink {
    async fn play(&self, clip: AudioClip) -> mpsc::Receiver<PlaybackEvent> {
        if let Ok(mut played) = self.played.lock() {
            played.push(clip);
        }
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx.send(PlaybackEvent::Started).await;
            let _ = tx.send(PlaybackEvent::Ended).await;
        });
        rx
    }
}

/// In-memory record collaborator.
#[derive(Default)]
pub struct MemoryRecords {
    /// Advances created via voice, as `(employee, amount, reason)`.
    pub created: Mutex<Vec<(String, f64, String)>>,
    /// Canned search results per call.
    pub advances: Vec<f64>,
}

#[async_trait]
impl RecordsPort for MemoryRecords {
    async fn create_advance(&self, employee: &str, amount: f64, reason: &str) -> Result<()> {
        if let Ok(mut created) = self.created.lock() {
            created.push((employee.to_owned(), amount, reason.to_owned()));
        }
        Ok(())
    }

    async fn search_advances(&self, _employee: &str) -> Result<Vec<AdvanceRecord>> {
        Ok(self
            .advances
            .iter()
            .map(|&amount| AdvanceRecord {
                amount,
                employee_name: None,
            })
            .collect())
    }

    async fn generate_report(&self, report_type: &str, period: &str) -> Result<ReportSummary> {
        Ok(ReportSummary {
            summary: format!("{report_type} report for {period}"),
        })
    }
}
