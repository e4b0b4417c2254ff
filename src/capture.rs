//! Speech capture port and restart supervision.
//!
//! The platform recognizer is driven through [`SpeechCapturePort`]; its raw
//! callbacks arrive as [`CaptureEvent`]s on a channel the host wires up at
//! construction time. Recognition streams end unpredictably, so the
//! [`CaptureSupervisor`] decides when to restart: a short delay after a
//! spontaneous stream end, a longer cool-down after an error, and never
//! again once microphone permission is denied.

use crate::config::CaptureConfig;
use crate::error::Result;
use crate::events::CaptureErrorKind;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// Port over the platform's continuous speech recognition.
///
/// `start()` must be a no-op when the stream is already open — exactly one
/// recognition stream exists at a time. Events (utterances, stream end,
/// errors) flow through the channel supplied when the port was built.
#[async_trait]
pub trait SpeechCapturePort: Send {
    /// Begin (or resume) the continuous recognition stream.
    async fn start(&mut self) -> Result<()>;

    /// End the recognition stream.
    async fn stop(&mut self);
}

/// What to do about a stream that just ended or errored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPlan {
    /// Restart after the given delay.
    After(Duration),
    /// Do not restart.
    Never,
}

/// Owns the capture port and applies the restart policy.
pub struct CaptureSupervisor {
    port: Box<dyn SpeechCapturePort>,
    restart_delay: Duration,
    error_cooldown: Duration,
    /// Whether the engine currently wants the stream open.
    armed: bool,
    /// Set once on permission denial; the capability is gone for the
    /// rest of the session.
    permanently_denied: bool,
}

impl CaptureSupervisor {
    /// Wrap a capture port with the configured restart policy.
    #[must_use]
    pub fn new(port: Box<dyn SpeechCapturePort>, config: &CaptureConfig) -> Self {
        Self {
            port,
            restart_delay: Duration::from_millis(config.restart_delay_ms),
            error_cooldown: Duration::from_millis(config.error_cooldown_ms),
            armed: false,
            permanently_denied: false,
        }
    }

    /// Open the recognition stream. No-op when permission was denied.
    pub async fn arm(&mut self) -> Result<()> {
        if self.permanently_denied {
            return Ok(());
        }
        self.armed = true;
        self.port.start().await
    }

    /// Close the recognition stream.
    pub async fn disarm(&mut self) {
        self.armed = false;
        self.port.stop().await;
    }

    /// Whether the engine currently wants the stream open.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether capture is permanently unavailable for this session.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.permanently_denied
    }

    /// Policy for a stream that ended on its own.
    ///
    /// `engine_busy` is true while the assistant is processing or speaking;
    /// in that case the engine re-arms at the next phase change instead.
    #[must_use]
    pub fn on_stream_ended(&self, engine_busy: bool) -> RestartPlan {
        if self.permanently_denied || !self.armed || engine_busy {
            RestartPlan::Never
        } else {
            RestartPlan::After(self.restart_delay)
        }
    }

    /// Policy for a capture error. Permission denial disables capture for
    /// the session; everything else restarts after the cool-down.
    pub fn on_error(&mut self, kind: CaptureErrorKind) -> RestartPlan {
        if kind == CaptureErrorKind::PermissionDenied {
            warn!("microphone permission denied — capture disabled for this session");
            self.permanently_denied = true;
            self.armed = false;
            return RestartPlan::Never;
        }
        if self.permanently_denied {
            return RestartPlan::Never;
        }
        info!(?kind, "capture error, restarting after cool-down");
        RestartPlan::After(self.error_cooldown)
    }
}

/// Status line for a capture error, surfaced to display collaborators.
#[must_use]
pub fn error_status(kind: CaptureErrorKind) -> &'static str {
    match kind {
        CaptureErrorKind::NetworkUnavailable => "Erro de rede - verifique sua conexão",
        CaptureErrorKind::PermissionDenied => "Permissão de microfone negada",
        CaptureErrorKind::NoSpeechDetected => "Nenhuma fala detectada",
        CaptureErrorKind::Aborted => "Reconhecimento cancelado",
        CaptureErrorKind::Other => "Erro no reconhecimento de voz",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    struct NullCapture;

    #[async_trait]
    impl SpeechCapturePort for NullCapture {
        async fn start(&mut self) -> Result<()> {
            Ok(())
        }
        async fn stop(&mut self) {}
    }

    fn supervisor() -> CaptureSupervisor {
        CaptureSupervisor::new(Box::new(NullCapture), &CaptureConfig::default())
    }

    #[tokio::test]
    async fn stream_end_restarts_after_short_delay() {
        let mut sup = supervisor();
        sup.arm().await.unwrap();
        assert_eq!(
            sup.on_stream_ended(false),
            RestartPlan::After(Duration::from_millis(500))
        );
    }

    #[tokio::test]
    async fn stream_end_while_busy_does_not_restart() {
        let mut sup = supervisor();
        sup.arm().await.unwrap();
        assert_eq!(sup.on_stream_ended(true), RestartPlan::Never);
    }

    #[tokio::test]
    async fn stream_end_after_disarm_does_not_restart() {
        let mut sup = supervisor();
        sup.arm().await.unwrap();
        sup.disarm().await;
        assert_eq!(sup.on_stream_ended(false), RestartPlan::Never);
    }

    #[tokio::test]
    async fn recoverable_error_restarts_after_cooldown() {
        let mut sup = supervisor();
        sup.arm().await.unwrap();
        assert_eq!(
            sup.on_error(CaptureErrorKind::NetworkUnavailable),
            RestartPlan::After(Duration::from_millis(2_000))
        );
    }

    #[tokio::test]
    async fn permission_denial_is_permanent() {
        let mut sup = supervisor();
        sup.arm().await.unwrap();
        assert_eq!(
            sup.on_error(CaptureErrorKind::PermissionDenied),
            RestartPlan::Never
        );
        assert!(sup.is_denied());

        // Later events never restart, and arming is a no-op.
        assert_eq!(sup.on_stream_ended(false), RestartPlan::Never);
        assert_eq!(sup.on_error(CaptureErrorKind::Other), RestartPlan::Never);
        sup.arm().await.unwrap();
        assert!(!sup.is_armed());
    }
}
