//! WizardManager — owns the wizard state and is its only mutation entry point.
//!
//! Every change goes through [`WizardManager::dispatch`]. Remote checks run
//! with the state lock released and `loading` set, so at most one request is
//! in flight per session; results are applied only if the session has not been
//! reset or cancelled in the meantime.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use super::model::{self, fields};
use super::state::{Flow, Position, Retreat, Step, WizardState};
use super::validation;
use crate::config::{MAX_SUBMIT_ATTEMPTS, WizardConfig};
use crate::error::{GatewayError, WizardError};
use crate::gateway::{EMAIL_NOT_REGISTERED, Gateway};

/// Pause before the single automatic re-submission.
const RETRY_DELAY: Duration = Duration::from_millis(250);

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Called when the user steps back from the first step.
pub trait ExitHandler: Send + Sync {
    fn exit_wizard(&self);
}

impl<F> ExitHandler for F
where
    F: Fn() + Send + Sync,
{
    fn exit_wizard(&self) {
        self()
    }
}

/// Commands accepted by [`WizardManager::dispatch`].
#[derive(Debug, Clone)]
pub enum WizardCommand {
    /// Merge the step's fields and move on (or submit on the last step).
    Advance(Map<String, Value>),
    Retreat,
    Reset,
    SetError(Option<String>),
    /// A field was edited; clears the current error.
    InputChanged,
    /// Ask the gateway to send a fresh verification code.
    ResendCode,
    /// The user navigated away; in-flight results are dropped.
    Cancel,
}

impl WizardCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Advance(_) => "advance",
            Self::Retreat => "retreat",
            Self::Reset => "reset",
            Self::SetError(_) => "set_error",
            Self::InputChanged => "input_changed",
            Self::ResendCode => "resend_code",
            Self::Cancel => "cancel",
        }
    }
}

/// What a successful command did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Now on this position.
    Moved(Position),
    /// Terminal submission succeeded; carries the gateway's response.
    Completed { organization: Value },
    /// Left the wizard from the first step.
    Exited,
    /// State changed without moving.
    Updated,
}

/// Notifications for other screens. Nothing outside the manager sees the state itself.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WizardEvent {
    Advanced { session_id: Uuid, position: Position },
    Retreated { session_id: Uuid, step: Step },
    Completed { session_id: Uuid, organization: Value },
    Exited { session_id: Uuid },
    Cancelled { session_id: Uuid },
}

/// Read-only view of the wizard for renderers.
#[derive(Debug, Clone, Serialize)]
pub struct WizardSnapshot {
    pub session_id: Uuid,
    pub flow: Flow,
    pub position: Position,
    pub step_number: usize,
    pub total_steps: usize,
    /// Secrets masked.
    pub answers: Map<String, Value>,
    pub loading: bool,
    pub error: Option<String>,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Which remote call failed, for picking the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    RegisterEmail,
    VerifyOtp,
    CreateOrganization,
}

/// Map a gateway failure to the message shown on the step.
pub fn user_message(call: RemoteCall, err: &GatewayError) -> String {
    if err.is_transient() {
        return GENERIC_FAILURE.to_string();
    }
    match call {
        RemoteCall::RegisterEmail => "This email is already registered.".to_string(),
        RemoteCall::VerifyOtp if err.kind() == Some(EMAIL_NOT_REGISTERED) => {
            "This email is not registered.".to_string()
        }
        RemoteCall::VerifyOtp => "Invalid verification code.".to_string(),
        RemoteCall::CreateOrganization => err
            .server_message()
            .map(str::to_string)
            .unwrap_or_else(|| {
                "Could not create your organization. Please try again.".to_string()
            }),
    }
}

fn text<'a>(answers: &'a Map<String, Value>, key: &str) -> &'a str {
    answers.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn remote(call: RemoteCall, source: GatewayError) -> WizardError {
    WizardError::Remote {
        message: user_message(call, &source),
        source,
    }
}

/// Coordinates one onboarding session: validation, remote checks, step
/// transitions, and terminal submission.
pub struct WizardManager {
    config: WizardConfig,
    gateway: Arc<dyn Gateway>,
    exit: Arc<dyn ExitHandler>,
    state: Arc<RwLock<WizardState>>,
    events: broadcast::Sender<WizardEvent>,
}

impl WizardManager {
    pub fn new(
        config: WizardConfig,
        gateway: Arc<dyn Gateway>,
        exit: Arc<dyn ExitHandler>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let state = WizardState::new(config.flow);
        Self {
            config,
            gateway,
            exit,
            state: Arc::new(RwLock::new(state)),
            events,
        }
    }

    /// Subscribe to wizard events.
    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    /// Current state, with secrets masked.
    pub async fn snapshot(&self) -> WizardSnapshot {
        let state = self.state.read().await;
        WizardSnapshot {
            session_id: state.session_id,
            flow: state.flow,
            position: state.position,
            step_number: state.current_step(),
            total_steps: state.flow.total_steps(),
            answers: model::redacted(&state.answers),
            loading: state.loading,
            error: state.error.clone(),
            complete: state.is_complete(),
            completed_at: state.completed_at,
        }
    }

    /// Apply a command. The single way to change the wizard.
    pub async fn dispatch(&self, command: WizardCommand) -> Result<Outcome, WizardError> {
        tracing::debug!(command = command.name(), "Wizard command");
        match command {
            WizardCommand::Advance(patch) => self.advance(patch).await,
            WizardCommand::Retreat => self.retreat().await,
            WizardCommand::Reset => self.reset().await,
            WizardCommand::SetError(message) => self.set_error(message).await,
            WizardCommand::InputChanged => self.set_error(None).await,
            WizardCommand::ResendCode => self.resend_code().await,
            WizardCommand::Cancel => self.cancel().await,
        }
    }

    async fn set_error(&self, message: Option<String>) -> Result<Outcome, WizardError> {
        let mut state = self.state.write().await;
        if state.loading {
            return Err(WizardError::Busy);
        }
        state.error = message;
        Ok(Outcome::Updated)
    }

    async fn advance(&self, patch: Map<String, Value>) -> Result<Outcome, WizardError> {
        // Validate locally and claim the in-flight slot.
        let (session_id, step, generation, normalized, candidate, verified) = {
            let mut state = self.state.write().await;
            if state.loading {
                return Err(WizardError::Busy);
            }
            if let Some(ref message) = state.error {
                return Err(WizardError::Blocked(message.clone()));
            }
            let step = state.position.step().ok_or(WizardError::AlreadyComplete)?;

            let mut candidate = state.answers.clone();
            candidate.extend(patch.clone());
            let normalized = match validation::validate_step(step, &candidate) {
                Ok(normalized) => normalized,
                Err(e) => {
                    tracing::info!(session = %state.session_id, %step, "Step rejected: {}", e);
                    state.error = Some(e.to_string());
                    return Err(e.into());
                }
            };
            candidate.extend(normalized.clone());

            state.loading = true;
            (
                state.session_id,
                step,
                state.generation,
                normalized,
                candidate,
                state.verified_email.clone(),
            )
        };

        let result = self
            .remote_check(step, &candidate, verified.as_deref())
            .await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            tracing::debug!(session = %session_id, %step, "Dropping stale step result");
            return Err(WizardError::Cancelled);
        }
        state.loading = false;

        let organization = match result {
            Ok(organization) => organization,
            Err(e) => {
                tracing::warn!(session = %session_id, %step, "Step failed: {}", e);
                state.error = Some(e.to_string());
                return Err(e);
            }
        };

        let next = state.advance_position()?;
        if matches!(step, Step::Email | Step::Registration) {
            state.verified_email = Some(text(&candidate, fields::EMAIL).to_string());
        }
        state.merge(patch);
        state.merge(normalized);

        match (next, organization) {
            (Position::Complete, Some(organization)) => {
                state.completed_at = Some(chrono::Utc::now());
                tracing::info!(session = %session_id, "Onboarding complete");
                let _ = self.events.send(WizardEvent::Completed {
                    session_id,
                    organization: organization.clone(),
                });
                Ok(Outcome::Completed { organization })
            }
            (position, _) => {
                tracing::info!(session = %session_id, from = %step, to = %position, "Step advanced");
                let _ = self.events.send(WizardEvent::Advanced {
                    session_id,
                    position,
                });
                Ok(Outcome::Moved(position))
            }
        }
    }

    /// Remote stage of a step: uniqueness/code checks, then the terminal
    /// submission when `step` is the flow's last.
    ///
    /// The uniqueness check is skipped for `verified`, the address the gateway
    /// already accepted in this session.
    async fn remote_check(
        &self,
        step: Step,
        answers: &Map<String, Value>,
        verified: Option<&str>,
    ) -> Result<Option<Value>, WizardError> {
        match step {
            Step::Email | Step::Registration => {
                let email = text(answers, fields::EMAIL);
                if verified == Some(email) {
                    tracing::debug!(%step, "Email already accepted this session");
                } else {
                    self.gateway
                        .register_email(email)
                        .await
                        .map_err(|e| remote(RemoteCall::RegisterEmail, e))?;
                }
            }
            Step::VerifyCode => {
                self.verify_code(text(answers, fields::EMAIL), text(answers, fields::OTP))
                    .await?
            }
            Step::Phone | Step::Questions | Step::InviteTeam | Step::Password => {}
        }

        if self.config.flow.is_terminal_step(step) {
            return self.submit(answers).await.map(Some);
        }
        Ok(None)
    }

    async fn verify_code(&self, email: &str, code: &str) -> Result<(), WizardError> {
        if let Some(ref expected) = self.config.fixed_code {
            return if code == expected {
                Ok(())
            } else {
                Err(WizardError::CodeMismatch)
            };
        }
        self.gateway
            .verify_otp(email, code)
            .await
            .map_err(|e| remote(RemoteCall::VerifyOtp, e))
    }

    /// `POST /organizations`, retried once after a transient failure.
    async fn submit(&self, answers: &Map<String, Value>) -> Result<Value, WizardError> {
        let payload = model::organization_payload(answers);
        let attempts = self.config.submit_attempts.clamp(1, MAX_SUBMIT_ATTEMPTS);

        let mut attempt = 1;
        loop {
            match self.gateway.create_organization(&payload).await {
                Ok(organization) => return Ok(organization),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(attempt, "Organization submission failed, retrying: {}", e);
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(remote(RemoteCall::CreateOrganization, e)),
            }
        }
    }

    async fn retreat(&self) -> Result<Outcome, WizardError> {
        let mut state = self.state.write().await;
        if state.loading {
            return Err(WizardError::Busy);
        }
        let session_id = state.session_id;
        let retreat = state.retreat_position()?;
        match retreat {
            Retreat::Moved(step) => {
                let _ = self.events.send(WizardEvent::Retreated { session_id, step });
                Ok(Outcome::Moved(Position::Step(step)))
            }
            Retreat::Exit => {
                drop(state);
                tracing::info!(session = %session_id, "Leaving onboarding from the first step");
                self.exit.exit_wizard();
                let _ = self.events.send(WizardEvent::Exited { session_id });
                Ok(Outcome::Exited)
            }
        }
    }

    async fn reset(&self) -> Result<Outcome, WizardError> {
        let mut state = self.state.write().await;
        if state.loading {
            return Err(WizardError::Busy);
        }
        state.reset();
        Ok(Outcome::Moved(state.position))
    }

    async fn cancel(&self) -> Result<Outcome, WizardError> {
        let mut state = self.state.write().await;
        let session_id = state.session_id;
        state.reset();
        tracing::info!(session = %session_id, "Onboarding cancelled");
        let _ = self.events.send(WizardEvent::Cancelled { session_id });
        Ok(Outcome::Updated)
    }

    async fn resend_code(&self) -> Result<Outcome, WizardError> {
        let (email, generation, accepted) = {
            let mut state = self.state.write().await;
            if state.loading {
                return Err(WizardError::Busy);
            }
            if state.position != Position::Step(Step::VerifyCode) {
                return Err(WizardError::NotAvailable {
                    command: "resend_code".into(),
                    step: state.position.to_string(),
                });
            }
            let email = text(&state.answers, fields::EMAIL).to_string();
            let accepted = state.verified_email.as_deref() == Some(email.as_str());
            state.loading = true;
            (email, state.generation, accepted)
        };

        let result = self.gateway.register_email(&email).await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            return Err(WizardError::Cancelled);
        }
        state.loading = false;
        match result {
            Ok(()) => {
                state.error = None;
                Ok(Outcome::Updated)
            }
            // The address is already held by this session.
            Err(e) if accepted && !e.is_transient() => {
                tracing::debug!(%email, "Resend answered with a rejection for the accepted address: {}", e);
                state.error = None;
                Ok(Outcome::Updated)
            }
            Err(e) => {
                let err = if e.is_transient() {
                    remote(RemoteCall::RegisterEmail, e)
                } else {
                    WizardError::Remote {
                        message: "Could not resend the code. Please try again.".into(),
                        source: e,
                    }
                };
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }
}
