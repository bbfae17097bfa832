//! Onboarding wizard — the multi-step signup flow.
//!
//! A new customer walks a fixed sequence of steps (email, verification code,
//! phone, organization questions, team invites; or the shorter registration
//! variant). Each step is validated locally, then checked against the gateway
//! where needed; the last step submits the accumulated answers as a new
//! organization.

pub mod manager;
pub mod model;
pub mod prompts;
pub mod state;
pub mod validation;

pub use manager::{
    ExitHandler, Outcome, WizardCommand, WizardEvent, WizardManager, WizardSnapshot,
};
pub use model::{fields, organization_payload, split_full_name};
pub use prompts::{FieldPrompt, step_fields, step_title};
pub use state::{Flow, Position, Retreat, Step, WizardState};
pub use validation::PasswordChecklist;
