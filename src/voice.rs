//! Voice input: a small state machine over a single-shot capture backend.
//!
//! Capture is modeled as one asynchronous invocation yielding one best
//! transcript hypothesis. The shipped backend shells out to a user-configured
//! transcriber command; capability is probed once at startup and a missing
//! transcriber hides the affordance for the whole session instead of failing.

use crate::events::PipelineEvent;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture command failed: {0}")]
    Failed(String),

    #[error("no transcript produced")]
    Empty,
}

/// Single-shot speech capture: one invocation, one transcript or a failure.
#[async_trait]
pub trait VoiceCapture: Send + Sync {
    async fn capture(&self) -> Result<String, CaptureError>;
}

/// Runs the configured transcriber command and reads the transcript from its
/// stdout. The command is expected to record, transcribe, and exit.
pub struct CommandCapture {
    program: PathBuf,
}

#[async_trait]
impl VoiceCapture for CommandCapture {
    async fn capture(&self) -> Result<String, CaptureError> {
        let output = tokio::process::Command::new(&self.program)
            .output()
            .await
            .map_err(|err| CaptureError::Failed(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CaptureError::Failed(stderr));
        }

        let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if transcript.is_empty() {
            Err(CaptureError::Empty)
        } else {
            Ok(transcript)
        }
    }
}

/// Dictation state. Capture runs to its natural end; Recording -> Idle
/// happens when the backend delivers its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicState {
    Idle,
    Recording,
}

/// What the composer's trailing control currently does. Derived on every
/// frame, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    /// Text is pending: the control submits it.
    Submit,
    /// Input is empty and capture is available: the control starts dictation.
    Microphone,
    /// A capture is running.
    Recording,
    /// No capture capability this session.
    Hidden,
}

/// Toggles between dictation and text submission for the composer's
/// mic/submit control.
pub struct VoiceInputController {
    capture: Option<Arc<dyn VoiceCapture>>,
    state: MicState,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl VoiceInputController {
    pub fn new(
        capture: Option<Arc<dyn VoiceCapture>>,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            capture,
            state: MicState::Idle,
            events,
        }
    }

    /// Resolve the configured transcriber on PATH, once at startup.
    pub fn probe(command: Option<&str>) -> Option<Arc<dyn VoiceCapture>> {
        let command = command?;
        match which::which(command) {
            Ok(program) => {
                debug!(command, program = %program.display(), "voice transcriber found");
                Some(Arc::new(CommandCapture { program }))
            }
            Err(err) => {
                warn!(command, %err, "voice transcriber not found, hiding the mic");
                None
            }
        }
    }

    pub fn available(&self) -> bool {
        self.capture.is_some()
    }

    pub fn state(&self) -> MicState {
        self.state
    }

    /// Compute the control's current role from the pending input text.
    /// Non-empty text repurposes it as the submit trigger.
    pub fn affordance(&self, input_text: &str) -> Affordance {
        if !input_text.trim().is_empty() {
            Affordance::Submit
        } else if self.state == MicState::Recording {
            Affordance::Recording
        } else if self.available() {
            Affordance::Microphone
        } else {
            Affordance::Hidden
        }
    }

    /// Idle -> Recording; spawns the single-shot capture. Returns whether a
    /// capture was started.
    pub fn start_capture(&mut self) -> bool {
        let Some(capture) = &self.capture else {
            return false;
        };
        if self.state == MicState::Recording {
            return false;
        }

        self.state = MicState::Recording;
        let capture = Arc::clone(capture);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = capture.capture().await;
            let _ = events.send(PipelineEvent::CaptureFinished(result));
        });
        true
    }

    /// Recording -> Idle. A transcript is appended space-joined to the
    /// pending input; a failed capture changes nothing visible.
    pub fn finish_capture(&mut self, input: &mut String, result: Result<String, CaptureError>) {
        self.state = MicState::Idle;
        match result {
            Ok(transcript) => {
                if !input.is_empty() {
                    input.push(' ');
                }
                input.push_str(&transcript);
            }
            Err(err) => warn!(%err, "voice capture failed"),
        }
    }
}
