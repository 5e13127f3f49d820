//! Router-level tests over in-memory providers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use outreach_compose::{Composer, TextGenerator};
use outreach_core::{Pipeline, PipelineSettings, Providers, SearchLimits, StageDelays};
use outreach_mailer::{MailReceipt, MailTransport, OutgoingMail};
use outreach_search::SearchProvider;
use outreach_shared::{
    AppConfig, BusinessConfig, EmailTemplateConfig, Result, SearchResult, load_config_from,
};
use outreach_storage::{CheckpointStore, ContactStore};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::events::EventHub;
use crate::router::build_app_router;
use crate::state::{AppState, WizardStatus};

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

struct PagedSearch(Mutex<VecDeque<Vec<SearchResult>>>);

#[async_trait]
impl SearchProvider for PagedSearch {
    async fn search(&self, _query: &str, _start: u32, _num: u32) -> Result<Vec<SearchResult>> {
        Ok(self.0.lock().unwrap().pop_front().unwrap_or_default())
    }
}

struct CannedReply;

#[async_trait]
impl TextGenerator for CannedReply {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok("SUBJECT: Quick idea\nBODY: Hello there".into())
    }
}

#[derive(Default)]
struct CountingMailer(AtomicUsize);

#[async_trait]
impl MailTransport for CountingMailer {
    async fn send(&self, _mail: &OutgoingMail) -> Result<MailReceipt> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MailReceipt {
            message_id: format!("<dash-{n}@test>"),
        })
    }

    async fn verify(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct TestApp {
    _dir: TempDir,
    state: AppState,
    mailer: Arc<CountingMailer>,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let page = vec![
            SearchResult {
                title: "Bloom - Florist".into(),
                url: "https://instagram.com/bloom".into(),
                snippet: "hello@bloom.com".into(),
            },
            SearchResult {
                title: "Petals | Shop".into(),
                url: "https://instagram.com/petals".into(),
                snippet: "Write petals@gmail.com".into(),
            },
        ];
        let business = BusinessConfig {
            name: "Ada".into(),
            email: "ada@ada.dev".into(),
            website: "https://ada.dev".into(),
            company: "Ada Web".into(),
        };
        let mailer = Arc::new(CountingMailer::default());
        let providers = Providers {
            search: Arc::new(PagedSearch(Mutex::new(vec![page].into()))),
            composer: Composer::new(
                Arc::new(CannedReply),
                business.clone(),
                EmailTemplateConfig::default(),
            ),
            mailer: mailer.clone(),
        };
        let settings = PipelineSettings {
            limits: SearchLimits::default(),
            delays: StageDelays::default(),
            max_emails_per_run: 10,
            business,
            clear_on_complete: false,
            retry_warning_threshold: 3,
        };
        let pipeline = Pipeline::new(
            providers,
            Arc::new(ContactStore::open(dir.path().join("data/clients.json"))),
            CheckpointStore::new(dir.path().join(".recovery")),
            settings,
        );
        let state = AppState::new(
            pipeline,
            Arc::new(EventHub::new()),
            AppConfig::default(),
            dir.path().join("outreach.toml"),
        );
        Self {
            _dir: dir,
            state,
            mailer,
        }
    }

    fn app(&self) -> Router {
        build_app_router(self.state.clone(), None)
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> Response {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.app().oneshot(request).await.unwrap()
    }

    async fn run_step1(&self) {
        let response = self.post("/api/automate/step1-search", search_body()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn search_body() -> Value {
    json!({
        "niche": "Florist",
        "country": "Canada",
        "emailProvider": "gmail.com",
        "platforms": "instagram.com"
    })
}

// ---------------------------------------------------------------------------
// Health and stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let t = TestApp::new();
    let response = t.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store_healthy"], true);
}

#[tokio::test]
async fn stats_on_empty_store() {
    let t = TestApp::new();
    let json = body_json(t.get("/api/stats").await).await;
    assert_eq!(json, json!({ "totalClients": 0, "emailsSent": 0, "unsentEmails": 0 }));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let t = TestApp::new();
    assert_eq!(t.get("/api/nope").await.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn step1_rejects_missing_fields_before_searching() {
    let t = TestApp::new();
    let response = t
        .post(
            "/api/automate/step1-search",
            json!({ "niche": " ", "country": "Canada", "emailProvider": "gmail.com", "platforms": [] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(t.state.wizard.lock().await.status, WizardStatus::Idle);
}

#[tokio::test]
async fn step1_rejects_malformed_body() {
    let t = TestApp::new();
    let response = t.post("/api/automate/step1-search", json!({ "niche": 5 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn overlapping_stage_is_rejected() {
    let t = TestApp::new();
    let _running = t.state.begin_stage().unwrap();

    let response = t.post("/api/automate/step1-search", search_body()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BUSY");
    assert_eq!(json["error"], "Automation is already running");

    assert_eq!(t.post("/api/automate/reset", json!({})).await.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn step2_needs_step1_candidates() {
    let t = TestApp::new();
    let response = t.post("/api/automate/step2-generate", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No clients found in Step 1");
}

#[tokio::test]
async fn step4_needs_generated_emails() {
    let t = TestApp::new();
    let response = t.post("/api/automate/step4-send", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No generated emails to send");
}

#[tokio::test]
async fn four_steps_search_generate_confirm_send() {
    let t = TestApp::new();

    let json = body_json(t.post("/api/automate/step1-search", search_body()).await).await;
    assert_eq!(json, json!({ "success": true, "count": 2 }));

    let json = body_json(t.post("/api/automate/step2-generate", json!({})).await).await;
    assert_eq!(json, json!({ "success": true, "count": 2 }));

    let json = body_json(t.post("/api/automate/step3-confirm", json!({})).await).await;
    assert_eq!(json, json!({ "success": true }));

    let json = body_json(t.post("/api/automate/step4-send", json!({})).await).await;
    assert_eq!(json, json!({ "success": true, "sent": 2, "failed": 0 }));
    assert_eq!(t.mailer.0.load(Ordering::SeqCst), 2);

    let snapshot = t.state.wizard.lock().await.snapshot();
    assert_eq!(snapshot.status, WizardStatus::Completed);
    assert_eq!(snapshot.current_step, 4);
    assert_eq!(snapshot.stats.found, 2);
    assert_eq!(snapshot.stats.saved, 2);
    assert_eq!(snapshot.stats.sent, 2);

    let stats = body_json(t.get("/api/stats").await).await;
    assert_eq!(stats["emailsSent"], 2);
    assert_eq!(stats["unsentEmails"], 0);

    // Sending again finds nothing unsent.
    let json = body_json(t.post("/api/automate/step4-send", json!({})).await).await;
    assert_eq!(json["sent"], 0);
}

#[tokio::test]
async fn reset_returns_to_step_zero() {
    let t = TestApp::new();
    t.run_step1().await;

    let json = body_json(t.post("/api/automate/reset", json!({})).await).await;
    assert_eq!(json["success"], true);

    let wizard = t.state.wizard.lock().await;
    assert_eq!(wizard.current_step, 0);
    assert!(wizard.extracted.is_empty());
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clients_filter_by_status_and_niche() {
    let t = TestApp::new();
    t.run_step1().await;

    let all = body_json(t.get("/api/clients").await).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let unsent = body_json(t.get("/api/clients?status=unsent").await).await;
    assert_eq!(unsent.as_array().unwrap().len(), 2);

    let sent = body_json(t.get("/api/clients?status=sent").await).await;
    assert!(sent.as_array().unwrap().is_empty());

    let florists = body_json(t.get("/api/clients?niche=flor").await).await;
    assert_eq!(florists.as_array().unwrap().len(), 2);

    let plumbers = body_json(t.get("/api/clients?niche=plumber").await).await;
    assert!(plumbers.as_array().unwrap().is_empty());

    let everything = body_json(t.get("/api/clients?niche=all").await).await;
    assert_eq!(everything.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn update_then_delete_client() {
    let t = TestApp::new();
    t.run_step1().await;
    let all = body_json(t.get("/api/clients").await).await;
    let id = all[0]["id"].as_str().unwrap().to_string();

    let response = t
        .send(
            Method::PUT,
            &format!("/api/clients/{id}"),
            Some(json!({ "emailSubject": "Hand written" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["client"]["emailSubject"], "Hand written");

    let response = t.send(Method::DELETE, &format!("/api/clients/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = t.send(Method::DELETE, &format!("/api/clients/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn update_unknown_client_is_404() {
    let t = TestApp::new();
    let response = t
        .send(Method::PUT, "/api/clients/missing", Some(json!({ "name": "x" })))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn regenerate_and_send_one_client() {
    let t = TestApp::new();
    t.run_step1().await;
    let all = body_json(t.get("/api/clients").await).await;
    let id = all[0]["id"].as_str().unwrap().to_string();

    let json = body_json(t.post(&format!("/api/clients/{id}/regenerate"), json!({})).await).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["client"]["emailSubject"], "Quick idea");

    let json = body_json(t.post(&format!("/api/clients/{id}/send"), json!({})).await).await;
    assert_eq!(json, json!({ "success": true }));

    let sent = body_json(t.get("/api/clients?status=sent").await).await;
    assert_eq!(sent.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn regenerate_waits_for_running_stage() {
    let t = TestApp::new();
    t.run_step1().await;
    let all = body_json(t.get("/api/clients").await).await;
    let id = all[0]["id"].as_str().unwrap().to_string();

    let running = t.state.begin_stage().unwrap();
    let response = t.post(&format!("/api/clients/{id}/regenerate"), json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "BUSY");
    let stored = t.state.pipeline.contacts().find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.email_subject, None);

    drop(running);
    let response = t.post(&format!("/api/clients/{id}/regenerate"), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn settings_round_trip_through_config_file() {
    let t = TestApp::new();

    let json = body_json(t.get("/api/settings").await).await;
    assert_eq!(json["SMTP_PORT"], "587");
    assert_eq!(json["SMTP_PASS_ENV"], "SMTP_PASS");

    let response = t
        .post("/api/settings", json!({ "SMTP_PORT": "465", "YOUR_NAME": "Ada" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["restartRequired"], true);

    let saved = load_config_from(&t.state.config_path).unwrap();
    assert_eq!(saved.smtp.port, 465);
    assert_eq!(saved.business.name, "Ada");

    let json = body_json(t.get("/api/settings").await).await;
    assert_eq!(json["SMTP_PORT"], "465");
}

#[tokio::test]
async fn invalid_setting_leaves_config_untouched() {
    let t = TestApp::new();
    let response = t.post("/api/settings", json!({ "EMAIL_DELAY": "soon" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!t.state.config_path.exists());
    assert_eq!(t.state.config.read().await.rate_limit.email_delay_ms, 5000);
}
