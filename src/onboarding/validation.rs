//! Local (synchronous) checks that gate each step's remote call.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::model::fields;
use super::state::Step;
use crate::error::ValidationError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;
/// Longest national number; longer input that starts with the country code already carries it.
const MAX_NATIONAL_DIGITS: usize = 10;
const MIN_PASSWORD_LEN: usize = 8;

/// Check an email address; returns the trimmed form.
pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "Email".into(),
        });
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email.to_string())
}

/// Check a phone number and compose it with an optional country code.
///
/// Accepts digits plus `+ - ( ) .` and spaces. A number that already starts
/// with `+` keeps its own prefix; otherwise the country code (digits only,
/// leading `+` optional) is prepended, unless the number is longer than a
/// national number and already starts with that code. Both digit bounds apply
/// to the composed number. Returns `+<digits>` when a prefix is known, or the
/// bare digits.
pub fn normalize_phone(country_code: Option<&str>, raw: &str) -> Result<String, ValidationError> {
    let number = raw.trim();
    if number.is_empty() {
        return Err(ValidationError::Required {
            field: "Phone number".into(),
        });
    }
    if let Some(bad) = number
        .chars()
        .find(|c| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | '.' | ' ')))
    {
        return Err(ValidationError::InvalidPhone {
            reason: format!("'{bad}' is not allowed"),
        });
    }
    if number.rfind('+').is_some_and(|i| i != 0) {
        return Err(ValidationError::InvalidPhone {
            reason: "'+' may only lead the number".into(),
        });
    }

    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    let has_own_prefix = number.starts_with('+');

    let mut carries_code = false;
    let prefix = if has_own_prefix {
        String::new()
    } else {
        let code = country_code.map(str::trim).unwrap_or_default();
        let code = code.strip_prefix('+').unwrap_or(code);
        if !code.chars().all(|c| c.is_ascii_digit()) || code.len() > 3 {
            return Err(ValidationError::InvalidPhone {
                reason: format!("country code '{code}' is not valid"),
            });
        }
        carries_code =
            !code.is_empty() && digits.len() > MAX_NATIONAL_DIGITS && digits.starts_with(code);
        if carries_code {
            String::new()
        } else {
            code.to_string()
        }
    };

    let total = prefix.len() + digits.len();
    if total < MIN_PHONE_DIGITS {
        return Err(ValidationError::InvalidPhone {
            reason: format!("at least {MIN_PHONE_DIGITS} digits are required"),
        });
    }
    if total > MAX_PHONE_DIGITS {
        return Err(ValidationError::InvalidPhone {
            reason: format!("at most {MAX_PHONE_DIGITS} digits are allowed"),
        });
    }

    if has_own_prefix || !prefix.is_empty() || carries_code {
        Ok(format!("+{prefix}{digits}"))
    } else {
        Ok(digits)
    }
}

/// Per-rule state of a password, for rendering a checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PasswordChecklist {
    pub has_uppercase: bool,
    pub has_digit: bool,
    pub min_length: bool,
}

impl PasswordChecklist {
    pub fn evaluate(password: &str) -> Self {
        Self {
            has_uppercase: password.chars().any(|c| c.is_uppercase()),
            has_digit: password.chars().any(|c| c.is_ascii_digit()),
            min_length: password.chars().count() >= MIN_PASSWORD_LEN,
        }
    }

    /// Number of satisfied rules (0..=3).
    pub fn strength(&self) -> u8 {
        [self.has_uppercase, self.has_digit, self.min_length]
            .iter()
            .filter(|ok| **ok)
            .count() as u8
    }

    pub fn is_satisfied(&self) -> bool {
        self.strength() == 3
    }
}

/// Require a non-blank value; returns it trimmed.
pub fn require_text(label: &str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::Required {
            field: label.to_string(),
        }),
    }
}

/// Normalize team invites: an array of strings or a comma-separated string.
///
/// Every entry must be a valid email; blanks and duplicates are dropped.
pub fn normalize_invites(value: Option<&Value>) -> Result<Vec<String>, ValidationError> {
    let raw: Vec<String> = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect(),
        Some(other) => vec![other.to_string()],
    };

    let mut invites: Vec<String> = Vec::new();
    for entry in raw {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let email = validate_email(entry).map_err(|_| ValidationError::InvalidInvite {
            email: entry.to_string(),
        })?;
        if !invites.iter().any(|e| e.eq_ignore_ascii_case(&email)) {
            invites.push(email);
        }
    }
    Ok(invites)
}

fn text<'a>(answers: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    answers.get(key).and_then(Value::as_str)
}

/// Validate the fields a step owns.
///
/// `answers` is the accumulated answers with the step's patch already laid
/// over it. Returns the normalized values to store for this step.
pub fn validate_step(
    step: Step,
    answers: &Map<String, Value>,
) -> Result<Map<String, Value>, ValidationError> {
    let mut out = Map::new();
    match step {
        Step::Email => {
            let email = validate_email(text(answers, fields::EMAIL).unwrap_or_default())?;
            out.insert(fields::EMAIL.into(), Value::String(email));
        }
        Step::VerifyCode => {
            let code = text(answers, fields::OTP)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or(ValidationError::MissingCode)?;
            out.insert(fields::OTP.into(), Value::String(code.to_string()));
        }
        Step::Phone => {
            let phone = normalize_phone(
                text(answers, fields::COUNTRY_CODE),
                text(answers, fields::PHONE).unwrap_or_default(),
            )?;
            out.insert(fields::PHONE.into(), Value::String(phone));
        }
        Step::Questions => {
            let name = require_text("Full name", text(answers, fields::NAME))?;
            let org_type = require_text("Organization type", text(answers, fields::ORG_TYPE))?;
            out.insert(fields::NAME.into(), Value::String(name));
            out.insert(fields::ORG_TYPE.into(), Value::String(org_type));
            if let Some(org) = text(answers, fields::ORGANIZATION).map(str::trim) {
                out.insert(fields::ORGANIZATION.into(), Value::String(org.to_string()));
            }
        }
        Step::InviteTeam => {
            let invites = normalize_invites(answers.get(fields::INVITES))?;
            out.insert(
                fields::INVITES.into(),
                Value::Array(invites.into_iter().map(Value::String).collect()),
            );
        }
        Step::Registration => {
            let name = require_text("Full name", text(answers, fields::NAME))?;
            let email = validate_email(text(answers, fields::EMAIL).unwrap_or_default())?;
            out.insert(fields::NAME.into(), Value::String(name));
            out.insert(fields::EMAIL.into(), Value::String(email));
        }
        Step::Password => {
            let password = text(answers, fields::PASSWORD).unwrap_or_default();
            let checklist = PasswordChecklist::evaluate(password);
            if !checklist.is_satisfied() {
                return Err(ValidationError::WeakPassword {
                    strength: checklist.strength(),
                });
            }
            if text(answers, fields::CONFIRM_PASSWORD) != Some(password) {
                return Err(ValidationError::PasswordMismatch);
            }
            out.insert(fields::PASSWORD.into(), Value::String(password.to_string()));
            out.insert(
                fields::CONFIRM_PASSWORD.into(),
                Value::String(password.to_string()),
            );
        }
    }
    Ok(out)
}
