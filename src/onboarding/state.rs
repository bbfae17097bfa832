//! Onboarding state machine — tracks which step the user is on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::WizardError;

/// Every kind of step a flow can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Email,
    VerifyCode,
    Phone,
    Questions,
    InviteTeam,
    Registration,
    Password,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Email => "email",
            Self::VerifyCode => "verify_code",
            Self::Phone => "phone",
            Self::Questions => "questions",
            Self::InviteTeam => "invite_team",
            Self::Registration => "registration",
            Self::Password => "password",
        };
        write!(f, "{s}")
    }
}

/// The onboarding flow variants.
///
/// - `Signup`: Email → VerifyCode → Phone → Questions → InviteTeam
/// - `Registration`: Registration → Password → Questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    #[default]
    Signup,
    Registration,
}

const SIGNUP_STEPS: &[Step] = &[
    Step::Email,
    Step::VerifyCode,
    Step::Phone,
    Step::Questions,
    Step::InviteTeam,
];

const REGISTRATION_STEPS: &[Step] = &[Step::Registration, Step::Password, Step::Questions];

impl Flow {
    /// Steps of this flow, in order.
    pub fn steps(&self) -> &'static [Step] {
        match self {
            Self::Signup => SIGNUP_STEPS,
            Self::Registration => REGISTRATION_STEPS,
        }
    }

    pub fn first(&self) -> Step {
        self.steps()[0]
    }

    pub fn last(&self) -> Step {
        self.steps()[self.steps().len() - 1]
    }

    pub fn total_steps(&self) -> usize {
        self.steps().len()
    }

    /// 1-based position of `step` in this flow.
    pub fn step_number(&self, step: Step) -> Option<usize> {
        self.steps().iter().position(|s| *s == step).map(|i| i + 1)
    }

    /// The step after `step`, or `None` when `step` is the last one (or absent).
    pub fn next(&self, step: Step) -> Option<Step> {
        let idx = self.steps().iter().position(|s| *s == step)?;
        self.steps().get(idx + 1).copied()
    }

    /// The step before `step`, or `None` when `step` is the first one (or absent).
    pub fn previous(&self, step: Step) -> Option<Step> {
        let idx = self.steps().iter().position(|s| *s == step)?;
        idx.checked_sub(1).map(|i| self.steps()[i])
    }

    pub fn is_terminal_step(&self, step: Step) -> bool {
        self.last() == step
    }

    /// Check if a transition from `from` to `to` is valid in this flow.
    ///
    /// Allowed: one step forward, one step back, last step → Complete.
    pub fn can_transition(&self, from: Position, to: Position) -> bool {
        match (from, to) {
            (Position::Step(a), Position::Step(b)) => {
                self.next(a) == Some(b) || self.previous(a) == Some(b)
            }
            (Position::Step(a), Position::Complete) => {
                self.step_number(a).is_some() && self.is_terminal_step(a)
            }
            (Position::Complete, _) => false,
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signup => write!(f, "signup"),
            Self::Registration => write!(f, "registration"),
        }
    }
}

impl std::str::FromStr for Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signup" => Ok(Self::Signup),
            "registration" => Ok(Self::Registration),
            other => Err(format!("unknown flow '{other}' (expected signup or registration)")),
        }
    }
}

/// Where the wizard is: on a step, or past the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "step")]
pub enum Position {
    Step(Step),
    Complete,
}

impl Position {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Step(step) => Some(*step),
            Self::Complete => None,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(step) => write!(f, "{step}"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Outcome of stepping back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    /// Moved back to this step.
    Moved(Step),
    /// Already on the first step; the caller should leave the wizard.
    Exit,
}

/// In-memory state of one wizard session.
#[derive(Debug, Clone, Serialize)]
pub struct WizardState {
    pub session_id: Uuid,
    pub flow: Flow,
    pub position: Position,
    /// Every field collected so far. Keys are added or overwritten, never removed.
    pub answers: Map<String, Value>,
    /// A remote call for the current step is in flight.
    pub loading: bool,
    /// Last failure message for the current step.
    pub error: Option<String>,
    /// Bumped whenever the session is reset, so late responses can be dropped.
    pub generation: u64,
    /// Address the gateway accepted for this session; not re-checked on return.
    pub verified_email: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WizardState {
    pub fn new(flow: Flow) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            flow,
            position: Position::Step(flow.first()),
            answers: Map::new(),
            loading: false,
            error: None,
            generation: 0,
            verified_email: None,
            completed_at: None,
        }
    }

    /// 1-based step number; `Complete` reports the flow's last step.
    pub fn current_step(&self) -> usize {
        match self.position {
            Position::Step(step) => self.flow.step_number(step).unwrap_or(1),
            Position::Complete => self.flow.total_steps(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.position.is_terminal()
    }

    /// Merge a patch into the accumulated answers.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            self.answers.insert(key, value);
        }
    }

    /// Move to the next position. Returns an error if already at `Complete`.
    pub fn advance_position(&mut self) -> Result<Position, WizardError> {
        let step = self.position.step().ok_or(WizardError::AlreadyComplete)?;
        let next = match self.flow.next(step) {
            Some(next) => Position::Step(next),
            None => Position::Complete,
        };
        if !self.flow.can_transition(self.position, next) {
            return Err(WizardError::InvalidTransition {
                from: self.position.to_string(),
                to: next.to_string(),
            });
        }
        self.position = next;
        self.error = None;
        Ok(next)
    }

    /// Move back one step, or report that the wizard should be left.
    pub fn retreat_position(&mut self) -> Result<Retreat, WizardError> {
        let step = self.position.step().ok_or(WizardError::AlreadyComplete)?;
        match self.flow.previous(step) {
            Some(previous) => {
                self.position = Position::Step(previous);
                self.error = None;
                Ok(Retreat::Moved(previous))
            }
            None => Ok(Retreat::Exit),
        }
    }

    /// Back to the first step with nothing collected, under a new session id.
    pub fn reset(&mut self) {
        self.session_id = Uuid::new_v4();
        self.position = Position::Step(self.flow.first());
        self.answers.clear();
        self.loading = false;
        self.error = None;
        self.verified_email = None;
        self.completed_at = None;
        self.generation += 1;
    }
}
