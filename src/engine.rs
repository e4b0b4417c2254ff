//! The session state machine.
//!
//! [`VoiceEngine`] wires the capture port, wake gate, interpreter,
//! dispatcher and speech output into one event-driven loop. All session
//! state lives here — there is no ambient/static state, so multiple engines
//! can run side by side (e.g. under test).
//!
//! Phases: `Idle` (listening for the wake phrase only), `Listening`
//! (active, waiting for a command), `Processing` (classify + dispatch in
//! flight) and `Speaking` (reply playing). The half-duplex invariant is
//! enforced here: the capture stream is stopped before any speech request
//! starts and re-armed only after the terminal playback event.

use crate::capture::{CaptureSupervisor, RestartPlan, error_status};
use crate::config::EngineConfig;
use crate::dispatch::{ActionDispatcher, DispatchOutcome};
use crate::error::Result;
use crate::events::{CaptureErrorKind, CaptureEvent, EngineEvent, PlaybackEvent, Utterance};
use crate::feedback::AudioFeedbackAnalyzer;
use crate::history::{ConversationHistory, ConversationTurn, Role};
use crate::intent::CommandInterpreter;
use crate::remote::{ChatPort, RecordsPort};
use crate::runtime::RuntimeEvent;
use crate::synthesis::{SpeechOutputPort, SpeechRequest};
use crate::wake::{GateDecision, WakeWordGate};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runtime event channel capacity.
const RUNTIME_CHANNEL_SIZE: usize = 64;
/// Loop tick driving idle checks and audio level sampling.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the wake phrase; everything else is discarded.
    Idle,
    /// Active and waiting for a command.
    Listening,
    /// A command is being classified and dispatched.
    Processing,
    /// A reply is being synthesized or played.
    Speaking,
}

/// The ports a host must supply to run an engine.
pub struct EnginePorts {
    /// Platform speech recognizer.
    pub capture: Box<dyn crate::capture::SpeechCapturePort>,
    /// Events emitted by the recognizer.
    pub capture_events: mpsc::UnboundedReceiver<CaptureEvent>,
    /// Speech output (synthesis + playback).
    pub output: Arc<dyn SpeechOutputPort>,
    /// Conversational fallback.
    pub chat: Arc<dyn ChatPort>,
    /// Record/report collaborator.
    pub records: Arc<dyn RecordsPort>,
}

/// The hands-free voice assistant engine.
pub struct VoiceEngine {
    config: EngineConfig,
    supervisor: CaptureSupervisor,
    capture_rx: mpsc::UnboundedReceiver<CaptureEvent>,
    output: Arc<dyn SpeechOutputPort>,
    chat: Arc<dyn ChatPort>,
    records: Arc<dyn RecordsPort>,
    identity: Option<serde_json::Value>,
    history: Arc<Mutex<ConversationHistory>>,
    analyzer: AudioFeedbackAnalyzer,
    runtime_tx: broadcast::Sender<RuntimeEvent>,
    cancel: CancellationToken,
}

impl VoiceEngine {
    /// Create an engine over the given ports.
    #[must_use]
    pub fn new(config: EngineConfig, ports: EnginePorts) -> Self {
        let history = Arc::new(Mutex::new(ConversationHistory::new(
            config.history.context_turns,
            config.history.display_turns,
        )));
        let (runtime_tx, _) = broadcast::channel(RUNTIME_CHANNEL_SIZE);
        let supervisor = CaptureSupervisor::new(ports.capture, &config.capture);
        Self {
            config,
            supervisor,
            capture_rx: ports.capture_events,
            output: ports.output,
            chat: ports.chat,
            records: ports.records,
            identity: None,
            history,
            analyzer: AudioFeedbackAnalyzer::new(),
            runtime_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an opaque identity/context blob forwarded to the remote
    /// chat fallback (e.g. a stored user profile).
    #[must_use]
    pub fn with_identity(mut self, identity: serde_json::Value) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Subscribe to runtime events (phases, transcripts, turns, levels).
    #[must_use]
    pub fn runtime_events(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.runtime_tx.subscribe()
    }

    /// The tap the host's playback sink should feed output frames into.
    #[must_use]
    pub fn feedback_tap(&self) -> crate::feedback::FeedbackTap {
        self.analyzer.tap()
    }

    /// Shared view of the conversation history for display collaborators.
    #[must_use]
    pub fn history(&self) -> Arc<Mutex<ConversationHistory>> {
        Arc::clone(&self.history)
    }

    /// Token for shutting the engine down.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the session loop until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if a component fails to initialize. Runtime
    /// failures never end the loop — they degrade per component policy.
    pub async fn run(mut self) -> Result<()> {
        let mut interpreter = CommandInterpreter::new(
            Arc::clone(&self.chat),
            self.config.endpoints.user_id.clone(),
        )?;
        if let Some(identity) = self.identity.take() {
            interpreter = interpreter.with_identity(identity);
        }
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&self.records),
            Arc::clone(&self.history),
            self.config.conversation.clone(),
        );

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<EngineEvent>();
        let idle_timeout = match self.config.conversation.idle_timeout_s {
            0 => None,
            s => Some(Duration::from_secs(u64::from(s))),
        };

        let mut session = SessionLoop {
            gate: WakeWordGate::new(&self.config.conversation.wake_variants),
            conversation: self.config.conversation,
            synthesis: self.config.synthesis,
            supervisor: self.supervisor,
            output: self.output,
            interpreter: Arc::new(interpreter),
            dispatcher: Arc::new(dispatcher),
            history: self.history,
            analyzer: self.analyzer,
            runtime_tx: self.runtime_tx,
            event_tx,
            phase: SessionPhase::Idle,
            idle_deadline: None,
            pending_idle: false,
            idle_timeout,
        };

        info!("voice engine starting");
        session.supervisor.arm().await?;
        session.status("Aguardando comando \"Lua\"...");

        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = tick.tick() => session.handle_tick().await,
                Some(event) = event_rx.recv() => session.handle_engine_event(event).await,
                Some(event) = self.capture_rx.recv() => session.handle_capture_event(event).await,
            }
        }

        session.supervisor.disarm().await;
        info!("voice engine stopped");
        Ok(())
    }
}

/// Mutable session state driven by the event loop.
struct SessionLoop {
    conversation: crate::config::ConversationConfig,
    synthesis: crate::config::SynthesisConfig,
    gate: WakeWordGate,
    supervisor: CaptureSupervisor,
    output: Arc<dyn SpeechOutputPort>,
    interpreter: Arc<CommandInterpreter>,
    dispatcher: Arc<ActionDispatcher>,
    history: Arc<Mutex<ConversationHistory>>,
    analyzer: AudioFeedbackAnalyzer,
    runtime_tx: broadcast::Sender<RuntimeEvent>,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    phase: SessionPhase,
    /// When the active session times out, while one exists.
    idle_deadline: Option<Instant>,
    /// Set when the current speech is a farewell; the session goes idle on
    /// its terminal playback event.
    pending_idle: bool,
    idle_timeout: Option<Duration>,
}

impl SessionLoop {
    async fn handle_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Utterance(utterance) => self.handle_utterance(utterance).await,
            CaptureEvent::StreamEnded => {
                let busy = matches!(self.phase, SessionPhase::Processing | SessionPhase::Speaking);
                let plan = self.supervisor.on_stream_ended(busy);
                self.schedule_restart(plan);
            }
            CaptureEvent::Error(kind) => {
                self.status(error_status(kind));
                if kind == CaptureErrorKind::PermissionDenied {
                    let _ = self.runtime_tx.send(RuntimeEvent::CaptureUnavailable);
                }
                let plan = self.supervisor.on_error(kind);
                self.schedule_restart(plan);
            }
        }
    }

    async fn handle_utterance(&mut self, utterance: Utterance) {
        let _ = self.runtime_tx.send(RuntimeEvent::Transcript {
            text: utterance.text.clone(),
            is_final: utterance.is_final,
        });

        let active = self.phase != SessionPhase::Idle;
        match self.gate.decide(active, &utterance) {
            GateDecision::Activate => self.activate().await,
            GateDecision::Interpret => {
                if self.phase == SessionPhase::Listening {
                    self.accept_final(utterance).await;
                } else {
                    // A command is already in flight; late finals are dropped.
                    debug!(phase = ?self.phase, "dropping final utterance");
                }
            }
            GateDecision::Transcript | GateDecision::Ignore => {}
        }
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::CaptureRestartDue => {
                if self.phase != SessionPhase::Speaking
                    && let Err(e) = self.supervisor.arm().await
                {
                    warn!("capture restart failed: {e}");
                }
            }
            EngineEvent::DispatchResolved(outcome) => self.handle_dispatch(outcome).await,
            EngineEvent::Playback(event) => self.handle_playback(event).await,
        }
    }

    async fn handle_tick(&mut self) {
        if self.phase == SessionPhase::Speaking {
            let level = self.analyzer.sample();
            let _ = self.runtime_tx.send(RuntimeEvent::AudioLevel { level });
        }

        if self.phase == SessionPhase::Listening
            && let Some(deadline) = self.idle_deadline
            && Instant::now() >= deadline
        {
            info!("session idle timeout");
            self.pending_idle = true;
            self.speak(self.conversation.farewell.clone()).await;
        }
    }

    /// Wake phrase heard while idle.
    async fn activate(&mut self) {
        if self.phase != SessionPhase::Idle {
            return;
        }
        info!("wake phrase detected, session active");
        self.push_turn(Role::System, "LUA ativada");
        self.status("LUA ativada - Pronta para servir");
        self.reset_idle_deadline();
        self.speak(self.conversation.greeting.clone()).await;
    }

    /// Final utterance accepted while listening.
    async fn accept_final(&mut self, utterance: Utterance) {
        self.reset_idle_deadline();
        self.push_turn(Role::User, utterance.text.clone());
        self.set_phase(SessionPhase::Processing);

        // Classification and dispatch run off the loop so capture events
        // (stream restarts in particular) keep flowing while remote calls
        // are in flight.
        let interpreter = Arc::clone(&self.interpreter);
        let dispatcher = Arc::clone(&self.dispatcher);
        let context = self
            .history
            .lock()
            .map(|h| h.context_window())
            .unwrap_or_default();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let intent = interpreter.classify(&utterance.text, &context).await;
            let outcome = dispatcher.dispatch(&intent).await;
            let _ = event_tx.send(EngineEvent::DispatchResolved(outcome));
        });
    }

    async fn handle_dispatch(&mut self, outcome: DispatchOutcome) {
        let _ = self.runtime_tx.send(RuntimeEvent::Turn(ConversationTurn::now(
            Role::Assistant,
            outcome.reply.clone(),
        )));
        if let Some(action) = outcome.action {
            let _ = self.runtime_tx.send(RuntimeEvent::Action(action));
        }
        if outcome.end_session {
            self.pending_idle = true;
        }
        self.speak(outcome.reply).await;
    }

    async fn handle_playback(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Started => {}
            PlaybackEvent::Ended | PlaybackEvent::Error => {
                if self.phase != SessionPhase::Speaking {
                    return;
                }
                if self.pending_idle {
                    self.go_idle().await;
                } else {
                    self.set_phase(SessionPhase::Listening);
                    self.reset_idle_deadline();
                    if let Err(e) = self.supervisor.arm().await {
                        warn!("failed to re-arm capture: {e}");
                    }
                }
            }
        }
    }

    /// Speak one reply, stopping capture first (half-duplex).
    async fn speak(&mut self, text: String) {
        self.supervisor.disarm().await;
        self.set_phase(SessionPhase::Speaking);

        let request = SpeechRequest::new(text, &self.synthesis);
        let output = Arc::clone(&self.output);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let mut events = output.speak(request).await;
            let mut terminal_seen = false;
            while let Some(event) = events.recv().await {
                let is_terminal = event.is_terminal();
                if event_tx.send(EngineEvent::Playback(event)).is_err() {
                    return;
                }
                if is_terminal {
                    terminal_seen = true;
                    break;
                }
            }
            if !terminal_seen {
                // The port broke its terminal-event guarantee; complete the
                // turn anyway so the session cannot deadlock.
                let _ = event_tx.send(EngineEvent::Playback(PlaybackEvent::Error));
            }
        });
    }

    async fn go_idle(&mut self) {
        self.pending_idle = false;
        self.idle_deadline = None;
        self.set_phase(SessionPhase::Idle);
        self.push_turn(Role::System, "LUA desativada");
        self.status("Sistema em standby");
        if let Err(e) = self.supervisor.arm().await {
            warn!("failed to re-arm capture: {e}");
        }

        // Quiet point: let a degraded synthesis backend re-probe.
        let output = Arc::clone(&self.output);
        tokio::spawn(async move {
            output.probe().await;
        });
    }

    fn schedule_restart(&self, plan: RestartPlan) {
        if let RestartPlan::After(delay) = plan {
            let event_tx = self.event_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = event_tx.send(EngineEvent::CaptureRestartDue);
            });
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "phase change");
            self.phase = phase;
            let _ = self.runtime_tx.send(RuntimeEvent::PhaseChanged(phase));
        }
    }

    fn reset_idle_deadline(&mut self) {
        self.idle_deadline = self.idle_timeout.map(|t| Instant::now() + t);
    }

    fn push_turn(&self, role: Role, text: impl Into<String>) {
        let turn = ConversationTurn::now(role, text);
        if let Ok(mut history) = self.history.lock() {
            history.push(turn.clone());
        }
        let _ = self.runtime_tx.send(RuntimeEvent::Turn(turn));
    }

    fn status(&self, text: &str) {
        let _ = self.runtime_tx.send(RuntimeEvent::Status {
            text: text.to_owned(),
        });
    }
}
