//! Step titles and field prompts for renderers.

use serde::Serialize;

use super::model::fields;
use super::state::Step;

/// One input a step collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldPrompt {
    pub key: &'static str,
    pub label: &'static str,
    pub required: bool,
    /// Input should not be echoed.
    pub secret: bool,
    /// Accepts several comma-separated values.
    pub list: bool,
}

const fn field(key: &'static str, label: &'static str) -> FieldPrompt {
    FieldPrompt {
        key,
        label,
        required: true,
        secret: false,
        list: false,
    }
}

const fn optional(mut prompt: FieldPrompt) -> FieldPrompt {
    prompt.required = false;
    prompt
}

const fn secret(mut prompt: FieldPrompt) -> FieldPrompt {
    prompt.secret = true;
    prompt
}

const EMAIL_FIELDS: &[FieldPrompt] = &[field(fields::EMAIL, "Work email")];
const CODE_FIELDS: &[FieldPrompt] = &[field(fields::OTP, "Verification code")];
const PHONE_FIELDS: &[FieldPrompt] = &[
    optional(field(fields::COUNTRY_CODE, "Country code")),
    field(fields::PHONE, "Phone number"),
];
const QUESTION_FIELDS: &[FieldPrompt] = &[
    field(fields::NAME, "Full name"),
    field(fields::ORG_TYPE, "Organization type (e.g. Agency, Facility, Broker)"),
    optional(field(fields::ORGANIZATION, "Organization name")),
];
const INVITE_FIELDS: &[FieldPrompt] = &[FieldPrompt {
    key: fields::INVITES,
    label: "Invite teammates (emails, comma separated)",
    required: false,
    secret: false,
    list: true,
}];
const REGISTRATION_FIELDS: &[FieldPrompt] = &[
    field(fields::NAME, "Full name"),
    field(fields::EMAIL, "Work email"),
];
const PASSWORD_FIELDS: &[FieldPrompt] = &[
    secret(field(fields::PASSWORD, "Password")),
    secret(field(fields::CONFIRM_PASSWORD, "Confirm password")),
];

/// Heading shown above a step.
pub fn step_title(step: Step) -> &'static str {
    match step {
        Step::Email => "What's your work email?",
        Step::VerifyCode => "Check your inbox for a verification code",
        Step::Phone => "How can we reach you?",
        Step::Questions => "Tell us about your organization",
        Step::InviteTeam => "Invite your team",
        Step::Registration => "Create your account",
        Step::Password => "Choose a password",
    }
}

/// Fields collected by `step`, in display order.
pub fn step_fields(step: Step) -> &'static [FieldPrompt] {
    match step {
        Step::Email => EMAIL_FIELDS,
        Step::VerifyCode => CODE_FIELDS,
        Step::Phone => PHONE_FIELDS,
        Step::Questions => QUESTION_FIELDS,
        Step::InviteTeam => INVITE_FIELDS,
        Step::Registration => REGISTRATION_FIELDS,
        Step::Password => PASSWORD_FIELDS,
    }
}
