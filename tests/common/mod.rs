//! Shared harness for the HTTP integration tests: in-process fakes for the
//! language model, TTS and storage, plus a wiremock render worker.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use lesson_studio::models::auth::Claims;
use lesson_studio::providers::{LanguageModel, ModelRequest, ObjectStorage, ProviderError, SpeechSynthesizer};
use lesson_studio::render_client::RenderWorkerClient;
use lesson_studio::{build_router, AppConfig, AppState, Clients, MemoryStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WEBHOOK_SECRET: &str = "callback-secret";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_AUDIO_URL: &str = "https://cdn.example.com/test-audio.mp3";

/// Canned script with scenes deliberately out of order
pub fn canned_script() -> Value {
    json!({
        "title": "Derivatives",
        "explanation": "How slopes of curves are measured",
        "scenes": [
            {"sceneNumber": 2, "manimScript": "self.play(Write(slope))", "narration": "The slope changes.", "duration": 12},
            {"sceneNumber": 1, "manimScript": "self.play(Create(curve))", "narration": "Here is a curve.", "duration": 8}
        ]
    })
}

/// Answers script requests with a canned script and translation requests
/// with a fixed prefix, recording every prompt it sees
pub struct FakeLanguageModel {
    pub script: Mutex<Option<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLanguageModel {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Some(canned_script().to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(script: Option<&str>) -> Self {
        let model = Self::new();
        *model.script.lock().unwrap() = script.map(str::to_string);
        model
    }

    pub fn translation_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with("Translate"))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn generate(&self, request: &ModelRequest) -> Result<Option<String>, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if request.response_schema.is_some() {
            return Ok(self.script.lock().unwrap().clone());
        }
        Ok(Some("TRADUIT: narration".to_string()))
    }

    fn name(&self) -> &str {
        "fake-model"
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        // Raw PCM: no container header
        Ok(vec![0u8, 1, 2, 3, 4, 5, 6, 7])
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<(String, String, usize, String)>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(&self, bucket: &str, object_name: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ProviderError> {
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), object_name.to_string(), bytes.len(), content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, object_name: &str) -> String {
        format!("https://storage.example.com/{}/{}", bucket, object_name)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub model: Arc<FakeLanguageModel>,
    pub speech: Arc<FakeSpeech>,
    pub storage: Arc<FakeStorage>,
    pub worker: MockServer,
}

pub struct TestOptions {
    pub tts_enabled: bool,
    pub webhook_secret: Option<&'static str>,
    pub model: FakeLanguageModel,
    /// Overrides the mock worker address, e.g. with a closed port
    pub backend_url: Option<String>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            tts_enabled: false,
            webhook_secret: Some(WEBHOOK_SECRET),
            model: FakeLanguageModel::new(),
            backend_url: None,
        }
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(TestOptions::default()).await
}

pub async fn spawn_app_with(options: TestOptions) -> TestApp {
    let worker = MockServer::start().await;
    let backend_url = options.backend_url.clone().unwrap_or_else(|| worker.uri());

    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("GEMINI_API_KEY".into(), "test-key".into());
    vars.insert("BACKEND_URL".into(), backend_url.clone());
    vars.insert("APP_BASE_URL".into(), "http://lesson.test".into());
    vars.insert("TEST_AUDIO_URL".into(), TEST_AUDIO_URL.into());
    vars.insert("JWT_SECRET".into(), JWT_SECRET.into());
    vars.insert("RETRY_MAX_ATTEMPTS".into(), "2".into());
    vars.insert("RETRY_BASE_DELAY_MS".into(), "1".into());
    if let Some(secret) = options.webhook_secret {
        vars.insert("VIDEO_WEBHOOK_SECRET".into(), secret.into());
    }
    if options.tts_enabled {
        vars.insert("ENABLE_TTS".into(), "true".into());
        vars.insert("ELEVEN_LABS_API_KEY".into(), "xi-test".into());
        vars.insert("SUPABASE_URL".into(), "https://storage.example.com".into());
        vars.insert("SUPABASE_SERVICE_ROLE_KEY".into(), "service-role".into());
    }
    let config = AppConfig::from_map(&vars).unwrap();

    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(options.model);
    let speech = Arc::new(FakeSpeech::default());
    let storage = Arc::new(FakeStorage::default());

    let clients = Clients {
        language_model: model.clone(),
        speech: Some(speech.clone()),
        storage: Some(storage.clone()),
        render: Arc::new(RenderWorkerClient::new(&backend_url)),
    };
    let state = AppState::build(&config, store.clone(), clients).unwrap();

    TestApp {
        router: build_router(Arc::new(state)),
        store,
        model,
        speech,
        storage,
        worker,
    }
}

/// Worker accepts render jobs with the given id
pub async fn mount_render_accepts(worker: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/render-and-upload-async"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"job_id": job_id, "status": "queued"})))
        .mount(worker)
        .await;
}

/// Address nothing listens on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

pub fn bearer(subject: &str) -> String {
    let claims = Claims {
        sub: subject.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        iat: None,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap();
    format!("Bearer {}", token)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse { status, body }
    }

    pub async fn post_json(&self, uri: &str, body: Value, auth: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(subject) = auth {
            builder = builder.header(header::AUTHORIZATION, bearer(subject));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn get(&self, uri: &str, auth: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(subject) = auth {
            builder = builder.header(header::AUTHORIZATION, bearer(subject));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn callback(&self, secret: Option<&str>, body: Value) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhooks/video-generation")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(secret) = secret {
            builder = builder.header("x-callback-secret", secret);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Run `/generate` against a worker that accepts with `job_id`
    pub async fn generate(&self, prompt: &str, job_id: &str) -> TestResponse {
        mount_render_accepts(&self.worker, job_id).await;
        self.post_json("/generate", json!({"prompt": prompt}), None).await
    }
}
