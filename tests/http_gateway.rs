//! Integration tests for the HTTP gateway.
//!
//! Each test spins up an Axum server on a random port that plays the REST API
//! and exercises the real request/response contract through `HttpGateway`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use care_onboard::config::{GatewayConfig, WizardConfig};
use care_onboard::error::GatewayError;
use care_onboard::gateway::{EMAIL_NOT_REGISTERED, Gateway, HttpGateway};
use care_onboard::onboarding::{Outcome, WizardCommand, WizardManager};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const CODE: &str = "424242";

/// What the fake API saw.
#[derive(Clone, Default)]
struct Recorder {
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    organizations: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    fn record_auth(&self, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth_headers.lock().unwrap().push(auth);
    }
}

async fn register_email(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    rec.record_auth(&headers);
    match body["email"].as_str() {
        Some("taken@b.com") => (
            StatusCode::CONFLICT,
            Json(json!({"message": "Email already registered", "type": "EMAIL_EXISTS"})),
        ),
        Some(_) => (StatusCode::OK, Json(json!({}))),
        None => (StatusCode::BAD_REQUEST, Json(json!({"message": "email missing"}))),
    }
}

async fn verify_otp(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    rec.record_auth(&headers);
    let email = params.get("email").map(String::as_str).unwrap_or_default();
    let otp = params.get("otp").map(String::as_str).unwrap_or_default();
    if email == "ghost@b.com" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "No such user", "type": EMAIL_NOT_REGISTERED})),
        );
    }
    if otp == CODE {
        (StatusCode::OK, Json(json!({"verified": true})))
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({"message": "Invalid code"})))
    }
}

async fn create_organization(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    rec.record_auth(&headers);
    rec.organizations.lock().unwrap().push(body.clone());
    match body["type"].as_str() {
        Some("Broken") => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        Some("Html") => (StatusCode::OK, "<html>ok</html>").into_response(),
        Some("Slow") => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            (StatusCode::CREATED, Json(json!({"id": "late"}))).into_response()
        }
        _ => (
            StatusCode::CREATED,
            Json(json!({"id": "org-9", "name": body["organization"]})),
        )
            .into_response(),
    }
}

/// Start the fake API on a random port, return (base_url, recorder).
async fn start_server() -> (String, Recorder) {
    let rec = Recorder::default();
    let app = Router::new()
        .route("/users/email", post(register_email))
        .route("/users/email/otp", get(verify_otp))
        .route("/organizations", post(create_organization))
        .with_state(rec.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), rec)
}

fn gateway(base_url: &str) -> HttpGateway {
    HttpGateway::new(GatewayConfig::new(base_url)).unwrap()
}

#[tokio::test]
async fn register_email_maps_conflict_to_rejection() {
    timeout(TEST_TIMEOUT, async {
        let (url, _) = start_server().await;
        let gw = gateway(&url);

        gw.register_email("new@b.com").await.unwrap();

        match gw.register_email("taken@b.com").await.unwrap_err() {
            GatewayError::Rejected {
                status,
                kind,
                message,
                ..
            } => {
                assert_eq!(status, 409);
                assert_eq!(kind.as_deref(), Some("EMAIL_EXISTS"));
                assert_eq!(message.as_deref(), Some("Email already registered"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn verify_otp_sends_query_and_reads_type() {
    timeout(TEST_TIMEOUT, async {
        let (url, _) = start_server().await;
        let gw = gateway(&url);

        gw.verify_otp("a+b@b.com", CODE).await.unwrap();

        let wrong = gw.verify_otp("a@b.com", "000000").await.unwrap_err();
        assert!(!wrong.is_transient());
        assert_eq!(wrong.kind(), None);

        let ghost = gw.verify_otp("ghost@b.com", CODE).await.unwrap_err();
        assert_eq!(ghost.kind(), Some(EMAIL_NOT_REGISTERED));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_organization_returns_body_and_classifies_failures() {
    timeout(TEST_TIMEOUT, async {
        let (url, rec) = start_server().await;
        let gw = gateway(&url);

        let created = gw
            .create_organization(&json!({"type": "Agency", "organization": "Sunrise"}))
            .await
            .unwrap();
        assert_eq!(created["id"], "org-9");
        assert_eq!(created["name"], "Sunrise");

        let server_error = gw
            .create_organization(&json!({"type": "Broken"}))
            .await
            .unwrap_err();
        assert!(matches!(server_error, GatewayError::Rejected { status: 500, .. }));
        assert!(server_error.is_transient());
        assert!(server_error.server_message().is_none());

        let not_json = gw
            .create_organization(&json!({"type": "Html"}))
            .await
            .unwrap_err();
        assert!(matches!(not_json, GatewayError::InvalidResponse { .. }));

        assert_eq!(rec.organizations.lock().unwrap().len(), 3);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn bearer_token_is_sent_when_configured() {
    timeout(TEST_TIMEOUT, async {
        let (url, rec) = start_server().await;

        gateway(&url).register_email("a@b.com").await.unwrap();

        let mut config = GatewayConfig::new(url.as_str());
        config.api_token = Some(secrecy::SecretString::from("tok-123".to_string()));
        HttpGateway::new(config)
            .unwrap()
            .register_email("a@b.com")
            .await
            .unwrap();

        let seen = rec.auth_headers.lock().unwrap().clone();
        assert_eq!(seen, vec![None, Some("Bearer tok-123".to_string())]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn slow_server_times_out() {
    timeout(TEST_TIMEOUT, async {
        let (url, _) = start_server().await;
        let mut config = GatewayConfig::new(url.as_str());
        config.timeout = Duration::from_millis(200);
        let gw = HttpGateway::new(config).unwrap();

        let err = gw
            .create_organization(&json!({"type": "Slow"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout { .. }), "{err:?}");
        assert!(err.is_transient());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    timeout(TEST_TIMEOUT, async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = gateway(&format!("http://127.0.0.1:{port}"))
            .register_email("a@b.com")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport { .. }), "{err:?}");
        assert!(err.is_transient());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn wizard_completes_against_http_api() {
    timeout(TEST_TIMEOUT, async {
        let (url, rec) = start_server().await;
        let config = WizardConfig::new(GatewayConfig::new(url.as_str()));
        let gw: Arc<dyn Gateway> = Arc::new(gateway(&url));
        let manager = WizardManager::new(config, gw, Arc::new(|| {}));

        let steps = [
            json!({"email": "a@b.com"}),
            json!({"otp": CODE}),
            json!({"countryCode": "+1", "phone": "555 123 4567"}),
            json!({"name": "Jane Doe", "orgType": "Agency", "organization": "Sunrise"}),
        ];
        for step in steps {
            let patch = step.as_object().cloned().unwrap();
            manager.dispatch(WizardCommand::Advance(patch)).await.unwrap();
        }

        let outcome = manager
            .dispatch(WizardCommand::Advance(serde_json::Map::new()))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Completed {
                organization: json!({"id": "org-9", "name": "Sunrise"})
            }
        );

        let submitted = rec.organizations.lock().unwrap().clone();
        assert_eq!(submitted.len(), 1);
        let body = &submitted[0];
        assert_eq!(body["firstname"], "Jane");
        assert_eq!(body["lastname"], "Doe");
        assert_eq!(body["email"], "a@b.com");
        assert_eq!(body["phone_number"], "+15551234567");
        assert_eq!(body["type"], "Agency");
        assert_eq!(body["invites"], json!([]));
    })
    .await
    .expect("test timed out");
}
