//! End-to-end tests driving the router in-process against an in-memory store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use roadeye_api::notify::HazardPublisher;
use roadeye_api::session::{SessionConfig, SessionIssuer};
use roadeye_api::{AppState, AppStateInner, HazardSettings, router};
use roadeye_db::Database;
use roadeye_types::events::HazardNotification;

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<HazardNotification>>,
}

impl RecordingPublisher {
    fn events(&self) -> Vec<HazardNotification> {
        self.events.lock().unwrap().clone()
    }
}

impl HazardPublisher for RecordingPublisher {
    fn publish(&self, event: HazardNotification) {
        self.events.lock().unwrap().push(event);
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    publisher: Arc<RecordingPublisher>,
}

impl TestApp {
    fn new() -> Self {
        let publisher = Arc::new(RecordingPublisher::default());
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            sessions: SessionIssuer::new(&SessionConfig {
                secret: "integration-test-secret".into(),
                access_ttl: chrono::Duration::hours(24),
                refresh_ttl: chrono::Duration::hours(168),
            }),
            hazards: HazardSettings::default(),
            publisher: publisher.clone(),
            request_timeout: Duration::from_secs(30),
        });
        Self {
            router: router(state.clone()),
            state,
            publisher,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }

    /// Registers a user and returns `(user_id, access_token)`.
    async fn register(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@x.com", username),
                    "password": "password123",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn report(&self, token: &str, lat: f64, lon: f64) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/hazards/report",
                Some(token),
                Some(json!({
                    "type": "pothole",
                    "severity": "high",
                    "latitude": lat,
                    "longitude": lon,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["hazard"].clone()
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn report_verify_and_find_nearby() {
    let app = TestApp::new();
    let (alice_id, alice) = app.register("alice").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "alice@x.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "Invalid credentials");

    let hazard = app.report(&alice, 37.7749, -122.4194).await;
    assert_eq!(hazard["type"], "pothole");
    assert_eq!(hazard["severity"], "high");
    assert_eq!(hazard["verify_count"], 0);
    assert_eq!(hazard["verified"], false);
    assert_eq!(hazard["user_id"], alice_id.as_str());
    assert_eq!(hazard["reported_by"], "alice");
    let id = hazard["id"].as_str().unwrap().to_string();

    let (_, bob) = app.register("bob").await;
    let (_, carol) = app.register("carol").await;
    let verify_uri = format!("/hazards/{}/verify", id);

    let (status, body) = app.send(Method::POST, &verify_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verify_count"], 1);

    let (_, body) = app.send(Method::POST, &verify_uri, Some(&carol), None).await;
    assert_eq!(body["message"], "Hazard verified");
    assert_eq!(body["verify_count"], 2);
    assert_eq!(body["verified"], false);

    // Repeat vote is accepted but not counted.
    let (status, body) = app.send(Method::POST, &verify_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verify_count"], 2);

    let (status, body) = app
        .send(Method::GET, "/hazards?lat=37.7750&lon=-122.4195&radius=1", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let hazards = body["hazards"].as_array().unwrap();
    assert_eq!(hazards[0]["id"], id.as_str());
    assert_eq!(hazards[0]["verify_count"], 2);
    let distance = hazards[0]["distance"].as_f64().unwrap();
    assert!(distance > 0.0 && distance < 0.05, "{distance}");
}

#[tokio::test]
async fn third_distinct_verifier_confirms() {
    let app = TestApp::new();
    let (_, reporter) = app.register("reporter").await;
    let id = app.report(&reporter, 10.0, 10.0).await["id"].as_str().unwrap().to_string();
    let uri = format!("/hazards/{}/verify", id);

    for name in ["v1", "v2"] {
        let (_, token) = app.register(name).await;
        let (_, body) = app.send(Method::POST, &uri, Some(&token), None).await;
        assert_eq!(body["verified"], false);
    }
    let (_, token) = app.register("v3").await;
    let (_, body) = app.send(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(body["verify_count"], 3);
    assert_eq!(body["verified"], true);

    let (_, body) = app.send(Method::GET, &format!("/hazards/{}", id), None, None).await;
    assert_eq!(body["hazard"]["verified"], true);
}

#[tokio::test]
async fn each_report_publishes_exactly_one_event() {
    let app = TestApp::new();
    let (_, token) = app.register("alice").await;

    let first = app.report(&token, 1.0, 2.0).await;
    let second = app.report(&token, 3.0, 4.0).await;

    let events = app.publisher.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].hazard_id.to_string(), first["id"].as_str().unwrap());
    assert_eq!(events[1].hazard_id.to_string(), second["id"].as_str().unwrap());
    assert_eq!(events[1].latitude, 3.0);
}

#[tokio::test]
async fn rejected_report_publishes_nothing() {
    let app = TestApp::new();
    let (_, token) = app.register("alice").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/hazards/report",
            Some(&token),
            Some(json!({ "type": "pothole", "severity": "high", "latitude": 91.0, "longitude": 0.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
    assert!(app.publisher.events().is_empty());
}

#[tokio::test]
async fn only_reporter_can_delete() {
    let app = TestApp::new();
    let (_, alice) = app.register("alice").await;
    let (_, mallory) = app.register("mallory").await;
    let id = app.report(&alice, 5.0, 5.0).await["id"].as_str().unwrap().to_string();
    let uri = format!("/hazards/{}", id);

    let (status, body) = app.send(Method::DELETE, &uri, Some(&mallory), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = app.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hazard deleted");

    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.send(Method::GET, "/hazards?lat=5&lon=5&radius=1", None, None).await;
    assert!(body["hazards"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn protected_routes_require_access_token() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authorization header required");

    let (status, body) = app.send(Method::GET, "/auth/profile", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");

    let (status, _) = app
        .send(
            Method::POST,
            "/hazards/report",
            None,
            Some(json!({ "type": "debris", "severity": "low", "latitude": 0.0, "longitude": 0.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A refresh token does not open protected routes.
    let (_, body) = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "dave", "email": "dave@x.com", "password": "password123" })),
        )
        .await;
    let refresh = body["refresh_token"].as_str().unwrap();
    let (status, _) = app.send(Method::GET, "/auth/profile", Some(refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_and_profile_resolve_same_user() {
    let app = TestApp::new();
    let (id, _) = app.register("alice").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "alice@x.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id.as_str());
    assert!(body["user"].get("password_hash").is_none());

    let token = body["token"].as_str().unwrap();
    let (status, body) = app.send(Method::GET, "/auth/profile", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id.as_str());
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn refresh_issues_usable_pair() {
    let app = TestApp::new();
    let (_, body) = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "erin", "email": "erin@x.com", "password": "password123" })),
        )
        .await;
    let refresh = body["refresh_token"].as_str().unwrap().to_string();
    let access = body["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::POST, "/auth/refresh", None, Some(json!({ "refresh_token": refresh })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_access = body["token"].as_str().unwrap();
    let (status, _) = app.send(Method::GET, "/auth/profile", Some(new_access), None).await;
    assert_eq!(status, StatusCode::OK);

    // An access token cannot be traded for a new pair.
    let (status, _) = app
        .send(Method::POST, "/auth/refresh", None, Some(json!({ "refresh_token": access })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = TestApp::new();
    app.register("alice").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "alice2", "email": "alice@x.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn nearby_validates_query() {
    let app = TestApp::new();

    for uri in [
        "/hazards?lat=1&lon=1&radius=-1",
        "/hazards?lat=1&lon=1&radius=51",
        "/hazards?lat=1&lon=1&limit=0",
        "/hazards?lat=95&lon=1",
        "/hazards?lon=1",
        "/hazards?lat=abc&lon=1",
    ] {
        let (status, body) = app.send(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
        assert_eq!(body["error"], "validation");
    }
}

#[tokio::test]
async fn nearby_orders_by_distance_and_limits() {
    let app = TestApp::new();
    let (_, token) = app.register("alice").await;

    let far = app.report(&token, 0.02, 0.0).await;
    let near = app.report(&token, 0.01, 0.0).await;
    app.report(&token, 1.0, 0.0).await;

    let (_, body) = app.send(Method::GET, "/hazards?lat=0&lon=0&radius=5", None, None).await;
    let hazards = body["hazards"].as_array().unwrap();
    assert_eq!(hazards.len(), 2);
    assert_eq!(hazards[0]["id"], near["id"]);
    assert_eq!(hazards[1]["id"], far["id"]);

    let (_, body) = app
        .send(Method::GET, "/hazards?lat=0&lon=0&radius=5&limit=1", None, None)
        .await;
    assert_eq!(body["hazards"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let app = TestApp::new();
    let (_, token) = app.register("alice").await;

    let missing = format!("/hazards/{}", uuid::Uuid::new_v4());
    let (status, body) = app.send(Method::GET, &missing, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Hazard not found");

    let (status, _) = app
        .send(Method::POST, &format!("{}/verify", missing), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.send(Method::GET, "/hazards/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid hazard ID");
}

#[tokio::test]
async fn malformed_deadline_header_is_rejected() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/hazards?lat=0&lon=0")
        .header("x-request-timeout-ms", "soon")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_with_inline_image_is_accepted() {
    let app = TestApp::new();
    let (_, token) = app.register("alice").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/hazards/report",
            Some(&token),
            Some(json!({
                "type": "pothole",
                "severity": "medium",
                "latitude": 12.0,
                "longitude": 34.0,
                "imageBase64": "aGVsbG8=",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body["hazard"].get("image_url").is_none());
    assert_eq!(app.publisher.events().len(), 1);
}

#[tokio::test]
async fn timed_out_report_is_not_persisted() {
    let app = TestApp::new();
    let (_, token) = app.register("alice").await;

    // Hold the store connection well past the request's deadline.
    let (locked_tx, locked_rx) = std::sync::mpsc::channel();
    let state = app.state.clone();
    let holder = std::thread::spawn(move || {
        state
            .db
            .with_conn(|_| {
                locked_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .unwrap();
    });
    locked_rx.recv().unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/hazards/report")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-request-timeout-ms", "100")
        .body(Body::from(
            json!({ "type": "debris", "severity": "low", "latitude": 3.0, "longitude": 4.0 })
                .to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    holder.join().unwrap();
    // Let the queued write take the connection and observe it was abandoned.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let (_, body) = app.send(Method::GET, "/hazards?lat=3&lon=4&radius=1", None, None).await;
    assert!(body["hazards"].as_array().unwrap().is_empty());
    assert!(app.publisher.events().is_empty());
}
