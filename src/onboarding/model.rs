//! Answer keys and terminal payload shaping.

use serde_json::{Map, Value};

/// Answer keys collected by the wizard steps.
pub mod fields {
    pub const EMAIL: &str = "email";
    pub const OTP: &str = "otp";
    pub const PHONE: &str = "phone";
    pub const COUNTRY_CODE: &str = "countryCode";
    pub const NAME: &str = "name";
    pub const ORG_TYPE: &str = "orgType";
    pub const ORGANIZATION: &str = "organization";
    pub const INVITES: &str = "invites";
    pub const PASSWORD: &str = "password";
    pub const CONFIRM_PASSWORD: &str = "confirmPassword";
}

/// Keys that only matter while the wizard runs and never reach the gateway.
const TRANSIENT: &[&str] = &[fields::OTP, fields::CONFIRM_PASSWORD, fields::COUNTRY_CODE];

/// Keys masked in snapshots and logs.
const SECRET: &[&str] = &[fields::PASSWORD, fields::CONFIRM_PASSWORD, fields::OTP];

/// Split a full name into first and last name.
///
/// The first whitespace-separated token is the first name; the rest is the
/// last name (empty for single-word names).
pub fn split_full_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Shape the accumulated answers into the `POST /organizations` body.
pub fn organization_payload(answers: &Map<String, Value>) -> Value {
    let mut payload = Map::new();

    for (key, value) in answers {
        let consumed = matches!(
            key.as_str(),
            fields::NAME | fields::PHONE | fields::ORG_TYPE
        );
        if consumed || TRANSIENT.contains(&key.as_str()) {
            continue;
        }
        payload.insert(key.clone(), value.clone());
    }

    if let Some(name) = answers.get(fields::NAME).and_then(Value::as_str) {
        let (first, last) = split_full_name(name);
        payload.insert("firstname".into(), Value::String(first));
        payload.insert("lastname".into(), Value::String(last));
    }
    if let Some(phone) = answers.get(fields::PHONE) {
        payload.insert("phone_number".into(), phone.clone());
    }
    if let Some(org_type) = answers.get(fields::ORG_TYPE) {
        payload.insert("type".into(), org_type.clone());
    }

    Value::Object(payload)
}

/// Copy of `answers` with secret values masked.
pub fn redacted(answers: &Map<String, Value>) -> Map<String, Value> {
    answers
        .iter()
        .map(|(k, v)| {
            if SECRET.contains(&k.as_str()) {
                (k.clone(), Value::String("********".into()))
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn answers(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn split_names() {
        assert_eq!(
            split_full_name("Jane Doe"),
            ("Jane".to_string(), "Doe".to_string())
        );
        assert_eq!(
            split_full_name("  Mary   Ann Smith "),
            ("Mary".to_string(), "Ann Smith".to_string())
        );
        assert_eq!(split_full_name("Cher"), ("Cher".to_string(), String::new()));
        assert_eq!(split_full_name(""), (String::new(), String::new()));
    }

    #[test]
    fn payload_shapes_signup_answers() {
        let payload = organization_payload(&answers(json!({
            "email": "a@b.com",
            "phone": "+15551234567",
            "name": "Jane Doe",
            "orgType": "Agency",
        })));

        assert_eq!(payload["firstname"], "Jane");
        assert_eq!(payload["lastname"], "Doe");
        assert_eq!(payload["email"], "a@b.com");
        assert_eq!(payload["phone_number"], "+15551234567");
        assert_eq!(payload["type"], "Agency");
        assert!(payload.get("name").is_none());
        assert!(payload.get("phone").is_none());
        assert!(payload.get("orgType").is_none());
    }

    #[test]
    fn payload_drops_transient_and_passes_the_rest() {
        let payload = organization_payload(&answers(json!({
            "email": "a@b.com",
            "otp": "123456",
            "countryCode": "1",
            "password": "Secret123",
            "confirmPassword": "Secret123",
            "organization": "Sunrise Care",
            "invites": ["b@c.com"],
        })));

        assert!(payload.get("otp").is_none());
        assert!(payload.get("confirmPassword").is_none());
        assert!(payload.get("countryCode").is_none());
        assert_eq!(payload["password"], "Secret123");
        assert_eq!(payload["organization"], "Sunrise Care");
        assert_eq!(payload["invites"], json!(["b@c.com"]));
        // No name/phone/type sources, so no shaped fields either.
        assert!(payload.get("firstname").is_none());
        assert!(payload.get("phone_number").is_none());
        assert!(payload.get("type").is_none());
    }

    #[test]
    fn redaction_masks_secrets_only() {
        let masked = redacted(&answers(json!({
            "email": "a@b.com",
            "password": "Secret123",
            "otp": "000000",
        })));
        assert_eq!(masked["email"], "a@b.com");
        assert_eq!(masked["password"], "********");
        assert_eq!(masked["otp"], "********");
    }
}
