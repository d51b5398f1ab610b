//! End-to-end flow tests through the HTTP router
//!
//! Each test drives the real router with in-memory requests: multi-step
//! flows, dashboards, record actions, unsubscribe, and health probes.
//!
//! Run with: cargo test --test flow_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use finhub::config::{ServerConfig, StoreBackend};
use finhub::handlers::{build_router, AppContext};
use finhub::notify::{
    Channel, Dispatcher, MailProvider, OutboundEmail, ProviderError, RetryPolicy,
};
use finhub::records::JsonFileStore;

// ============================================================================
// TEST INFRASTRUCTURE
// ============================================================================

struct CaptureProvider {
    calls: AtomicUsize,
    delivered: Mutex<Vec<OutboundEmail>>,
}

impl CaptureProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        })
    }
}

impl MailProvider for CaptureProvider {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn channel(&self) -> Channel {
        Channel::Api
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn deliver<'a>(
        &'a self,
        email: &'a OutboundEmail,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.delivered.lock().push(email.clone());
            Ok(())
        })
    }
}

struct Harness {
    app: Router,
    provider: Arc<CaptureProvider>,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: dir.path().to_path_buf(),
            store_backend: StoreBackend::JsonFile,
            ..ServerConfig::default()
        };

        let store = Arc::new(JsonFileStore::open(dir.path().join("records.json")).unwrap());
        let provider = CaptureProvider::new();
        let dispatcher = Arc::new(
            Dispatcher::new(vec![Box::new(provider.clone())]).with_policy(RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            }),
        );

        let context = Arc::new(AppContext::with_parts(config, store, dispatcher));
        Self {
            app: build_router(context),
            provider,
            _dir: dir,
        }
    }

    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }
}

/// Create a bill through the two-step flow and return its record id.
async fn create_bill(h: &Harness, owner: &str, name: &str, send_email: bool) -> String {
    let (status, _) = h
        .post(
            "/api/flows/bill/step/1",
            json!({"owner_key": owner, "fields": {
                "first_name": "Ada", "email": "ada@example.com"}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mut fields = json!({
        "bill_name": name,
        "amount": "50,000",
        "due_date": "2999-06-01",
        "frequency": "monthly",
        "category": "housing",
    });
    if send_email {
        fields["send_email"] = json!(true);
        fields["reminder_days"] = json!(7);
    }

    let (status, body) = h
        .post(
            "/api/flows/bill/step/2",
            json!({"owner_key": owner, "fields": fields}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "step 2 failed: {body}");
    assert_eq!(body["completed"], true);
    body["record_id"].as_str().expect("record id").to_string()
}

// ============================================================================
// FLOWS
// ============================================================================

#[tokio::test]
async fn bill_flow_materializes_a_record_on_the_dashboard() {
    let h = Harness::new();
    let id = create_bill(&h, "s1", "Rent", false).await;

    let (status, body) = h.get("/api/bill/dashboard?owner_key=s1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["records"][0]["id"], id.as_str());
    assert_eq!(body["records"][0]["payload"]["bill_name"], "Rent");
    assert_eq!(body["records"][0]["payload"]["amount"], 50000.0);
}

#[tokio::test]
async fn abandoned_flow_leaves_no_record() {
    let h = Harness::new();
    let (status, _) = h
        .post(
            "/api/flows/bill/step/1",
            json!({"owner_key": "s1", "fields": {"first_name": "Ada"}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = h.get("/api/bill/dashboard?owner_key=s1").await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn steps_cannot_be_skipped() {
    let h = Harness::new();
    let (status, body) = h
        .post(
            "/api/flows/budget/step/2",
            json!({"owner_key": "s1", "fields": {"income": 1000}}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn budget_flow_computes_and_stores_surplus() {
    let h = Harness::new();
    let owner = "s1";

    for (step, fields) in [
        (1, json!({"first_name": "Ada"})),
        (2, json!({"income": 100000})),
        (
            3,
            json!({"housing": 30000, "food": 20000, "transport": 5000,
                   "dependents": 0, "miscellaneous": 5000, "others": 0}),
        ),
    ] {
        let (status, _) = h
            .post(
                &format!("/api/flows/budget/step/{step}"),
                json!({"owner_key": owner, "fields": fields}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = h
        .post(
            "/api/flows/budget/step/4",
            json!({"owner_key": owner, "fields": {"savings_goal": 10000}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], true);

    let (_, body) = h.get("/api/budget/dashboard?owner_key=s1").await;
    assert_eq!(body["records"][0]["payload"]["surplus_deficit"], 30000.0);
}

#[tokio::test]
async fn final_step_sends_summary_email_when_opted_in() {
    let h = Harness::new();
    create_bill(&h, "s1", "Rent", true).await;

    assert_eq!(h.provider.calls.load(Ordering::SeqCst), 1);
    let delivered = h.provider.delivered.lock();
    assert_eq!(delivered[0].to, "ada@example.com");
    assert!(delivered[0].html.contains("Rent"));
}

#[tokio::test]
async fn no_email_goes_out_without_opt_in() {
    let h = Harness::new();
    create_bill(&h, "s1", "Rent", false).await;
    assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn draft_can_be_resumed_and_discarded() {
    let h = Harness::new();
    h.post(
        "/api/flows/quiz/step/1",
        json!({"owner_key": "s1", "fields": {"first_name": "Ada"}}),
    )
    .await;

    let (status, body) = h.get("/api/flows/quiz/draft?owner_key=s1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["last_step"], 1);
    assert_eq!(body["fields"]["first_name"], "Ada");

    let (status, _) = h
        .request(Method::DELETE, "/api/flows/quiz/draft?owner_key=s1", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h.get("/api/flows/quiz/draft?owner_key=s1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "DRAFT_NOT_FOUND");
}

// ============================================================================
// RECORD ACTIONS
// ============================================================================

#[tokio::test]
async fn records_are_invisible_to_other_owners() {
    let h = Harness::new();
    let id = create_bill(&h, "s1", "Rent", false).await;

    let (status, _) = h
        .get(&format!("/api/records/{id}?owner_key=someone-else"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = h.get("/api/bill/dashboard?owner_key=someone-else").await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn toggle_flips_between_paid_and_unpaid() {
    let h = Harness::new();
    let id = create_bill(&h, "s1", "Rent", false).await;

    let (status, body) = h
        .post(&format!("/api/bills/{id}/toggle"), json!({"owner_key": "s1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");

    let (_, body) = h
        .post(&format!("/api/bills/{id}/toggle"), json!({"owner_key": "s1"}))
        .await;
    assert_eq!(body["status"], "unpaid");
}

#[tokio::test]
async fn update_cannot_change_record_kind() {
    let h = Harness::new();
    let id = create_bill(&h, "s1", "Rent", false).await;

    let (status, body) = h
        .request(
            Method::PUT,
            &format!("/api/records/{id}"),
            Some(json!({
                "owner_key": "s1",
                "payload": {"kind": "quiz_result", "personality": "Planner", "score": 9}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn delete_is_idempotent_over_http() {
    let h = Harness::new();
    let id = create_bill(&h, "s1", "Rent", false).await;

    let (status, body) = h
        .request(
            Method::DELETE,
            &format!("/api/records/{id}?owner_key=s1"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, body) = h
        .request(
            Method::DELETE,
            &format!("/api/records/{id}?owner_key=s1"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], false);
}

#[tokio::test]
async fn unsubscribe_clears_opt_in_across_records() {
    let h = Harness::new();
    create_bill(&h, "s1", "Rent", true).await;
    create_bill(&h, "s2", "Power", true).await;

    let (status, body) = h
        .post(
            "/api/bills/unsubscribe",
            json!({"email": "ada@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 2);

    // Opt-in is cleared on the stored records.
    let (_, body) = h.get("/api/bill/dashboard?owner_key=s1").await;
    assert_eq!(body["records"][0]["payload"]["send_email"], false);

    // Second call finds nothing left to clear.
    let (_, body) = h
        .post(
            "/api/bills/unsubscribe",
            json!({"email": "ada@example.com"}),
        )
        .await;
    assert_eq!(body["updated"], 0);
}

#[tokio::test]
async fn invalid_owner_key_is_rejected() {
    let h = Harness::new();
    let (status, body) = h.get("/api/bill/dashboard?owner_key=bad:key").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn health_endpoints_respond() {
    let h = Harness::new();
    create_bill(&h, "s1", "Rent", false).await;

    let (status, body) = h.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store_backend"], "json_file");
    assert_eq!(body["records_total"], 1);

    let (status, _) = h.get("/health/live").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}
