//! Speech output with remote-primary synthesis and local fallback.
//!
//! [`RemoteFirstSynthesizer`] implements the crate's speech output port: it
//! tries the remote synthesis service first, falls back to a local
//! synthesizer when the remote is unavailable, and plays the result through
//! a host-supplied sink. One session-scoped degraded flag makes the
//! fallback sticky: after a remote failure, later calls skip the remote
//! attempt until a health probe reports the engine loaded again.
//!
//! Every `speak()` call yields exactly one terminal playback event, even
//! when both synthesis paths fail — the session loop relies on this to know
//! when listening can be re-armed.

use crate::config::{SynthesisConfig, VoiceGender};
use crate::error::Result;
use crate::events::PlaybackEvent;
use crate::remote::TtsClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Input to a speech output port.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    /// Text to speak.
    pub text: String,
    /// Voice profile requested from the remote synthesizer.
    pub voice_profile: String,
    /// Optional emotion hint.
    pub emotion: Option<String>,
    /// Speaking rate multiplier.
    pub speed: f32,
}

impl SpeechRequest {
    /// Build a request for the given text using the configured voice.
    #[must_use]
    pub fn new(text: impl Into<String>, config: &SynthesisConfig) -> Self {
        Self {
            text: text.into(),
            voice_profile: config.voice_profile.clone(),
            emotion: config.emotion.clone(),
            speed: config.speed,
        }
    }
}

/// Encoded audio ready for the playback sink.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Encoded audio bytes (typically WAV).
    pub data: Vec<u8>,
    /// Container format ("wav", "mp3").
    pub format: String,
}

/// A local voice offered by the platform synthesizer.
#[derive(Debug, Clone)]
pub struct LocalVoice {
    /// Platform voice identifier.
    pub id: String,
    /// BCP-47 language tag ("pt-BR").
    pub language: String,
    /// Voice gender, when the platform reports one.
    pub gender: VoiceGender,
}

/// Port over the platform's local text-to-speech engine.
#[async_trait]
pub trait LocalSynthesizer: Send + Sync {
    /// Voices the platform offers.
    fn voices(&self) -> Vec<LocalVoice>;

    /// Synthesize text with the given voice (`None` = platform default).
    async fn synthesize(&self, text: &str, voice: Option<&str>, speed: f32) -> Result<AudioClip>;
}

/// Port over the platform's audio playback.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Play a clip. The returned stream emits [`PlaybackEvent::Started`]
    /// followed by exactly one terminal event.
    async fn play(&self, clip: AudioClip) -> mpsc::Receiver<PlaybackEvent>;
}

/// Speech output port consumed by the session engine.
#[async_trait]
pub trait SpeechOutputPort: Send + Sync {
    /// Speak one request. The returned stream yields playback events and is
    /// guaranteed to end with exactly one terminal event.
    async fn speak(&self, request: SpeechRequest) -> mpsc::Receiver<PlaybackEvent>;

    /// Give the port a chance to re-check degraded backends. Called by the
    /// engine at quiet points; a no-op by default.
    async fn probe(&self) {}
}

/// Remote-primary synthesizer with sticky local fallback.
pub struct RemoteFirstSynthesizer {
    inner: Arc<SynthesizerInner>,
}

struct SynthesizerInner {
    remote: TtsClient,
    local: Arc<dyn LocalSynthesizer>,
    sink: Arc<dyn PlaybackSink>,
    config: SynthesisConfig,
    /// Set on the first remote failure; cleared when a health probe
    /// reports the engine loaded again.
    remote_unavailable: AtomicBool,
}

impl RemoteFirstSynthesizer {
    /// Build the synthesizer from its collaborators.
    #[must_use]
    pub fn new(
        remote: TtsClient,
        local: Arc<dyn LocalSynthesizer>,
        sink: Arc<dyn PlaybackSink>,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SynthesizerInner {
                remote,
                local,
                sink,
                config,
                remote_unavailable: AtomicBool::new(false),
            }),
        }
    }

    /// Whether the remote service is currently considered unavailable.
    #[must_use]
    pub fn remote_unavailable(&self) -> bool {
        self.inner.remote_unavailable.load(Ordering::Relaxed)
    }

    /// Probe the remote service's health. A healthy probe clears the
    /// degraded flag so the next `speak()` tries the remote path again.
    pub async fn probe_remote(&self) -> bool {
        match self.inner.remote.probe().await {
            Ok(true) => {
                if self.inner.remote_unavailable.swap(false, Ordering::Relaxed) {
                    info!("remote synthesis back online");
                }
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("synthesis health probe failed: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl SpeechOutputPort for RemoteFirstSynthesizer {
    async fn speak(&self, request: SpeechRequest) -> mpsc::Receiver<PlaybackEvent> {
        let (tx, rx) = mpsc::channel(8);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run(request, tx).await;
        });
        rx
    }

    async fn probe(&self) {
        if self.remote_unavailable() {
            self.probe_remote().await;
        }
    }
}

impl SynthesizerInner {
    async fn run(&self, request: SpeechRequest, tx: mpsc::Sender<PlaybackEvent>) {
        let Some(clip) = self.obtain_clip(&request).await else {
            // Both paths failed: complete the turn silently so the session
            // is not left waiting for a playback event that never comes.
            let _ = tx.send(PlaybackEvent::Error).await;
            return;
        };

        let mut events = self.sink.play(clip).await;
        let mut terminal_seen = false;
        while let Some(event) = events.recv().await {
            let is_terminal = event.is_terminal();
            if tx.send(event).await.is_err() {
                return;
            }
            if is_terminal {
                terminal_seen = true;
                break;
            }
        }
        if !terminal_seen {
            // Sink dropped its stream without a terminal event.
            let _ = tx.send(PlaybackEvent::Error).await;
        }
    }

    /// Synthesize the request, remote first unless degraded.
    async fn obtain_clip(&self, request: &SpeechRequest) -> Option<AudioClip> {
        if !self.remote_unavailable.load(Ordering::Relaxed) {
            match self
                .remote
                .synthesize(
                    &request.text,
                    &request.voice_profile,
                    request.emotion.as_deref(),
                    request.speed,
                )
                .await
            {
                Ok(clip) => return Some(clip),
                Err(e) => {
                    warn!("remote synthesis failed, switching to local fallback: {e}");
                    self.remote_unavailable.store(true, Ordering::Relaxed);
                }
            }
        }

        let voice = pick_local_voice(&self.local.voices(), &self.config);
        match self
            .local
            .synthesize(&request.text, voice.as_deref(), request.speed)
            .await
        {
            Ok(clip) => Some(clip),
            Err(e) => {
                error!("local synthesis failed: {e}");
                None
            }
        }
    }
}

/// Pick a local voice matching the configured language and gender, falling
/// back to any language match, then to the platform default (`None`).
fn pick_local_voice(voices: &[LocalVoice], config: &SynthesisConfig) -> Option<String> {
    let language_matches: Vec<&LocalVoice> = voices
        .iter()
        .filter(|v| v.language.eq_ignore_ascii_case(&config.language))
        .collect();

    language_matches
        .iter()
        .find(|v| config.voice_gender == VoiceGender::Any || v.gender == config.voice_gender)
        .or_else(|| language_matches.first())
        .map(|v| v.id.clone())
}
