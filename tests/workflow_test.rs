//! End-to-end `/generate` flows against fakes and a mocked render worker.
mod common;

use axum::http::StatusCode;
use common::*;
use lesson_studio::providers::RenderJobRequest;
use lesson_studio::JobStatus;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn generate_queues_a_render_job_with_placeholder_audio() {
    let app = spawn_app().await;

    let res = app.generate("Explain derivatives", "job-123").await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["jobId"], "job-123");
    assert_eq!(res.body["jobStatus"], "PROCESSING");
    assert_eq!(res.body["audioUrl"], TEST_AUDIO_URL);
    assert_eq!(res.body["usedTestAudio"], true);
    assert_eq!(res.body["result"]["title"], "Derivatives");
    assert_eq!(res.body["result"]["scenes"].as_array().unwrap().len(), 2);
    assert_eq!(res.body["result"]["fullNarration"], "Here is a curve. The slope changes.");
    assert_eq!(
        res.body["result"]["fullManimScript"],
        "# Scene 1\nself.play(Create(curve))\n\n# Scene 2\nself.play(Write(slope))"
    );

    // Placeholder mode never reaches the speech provider
    assert_eq!(app.speech.call_count(), 0);

    let videos = app.store.videos().await;
    let muxes = app.store.muxes().await;
    assert_eq!(videos.len(), 1);
    assert_eq!(muxes.len(), 1);
    assert_eq!(videos[0].status, JobStatus::Processing);
    assert_eq!(muxes[0].status, JobStatus::Processing);
    assert_eq!(videos[0].job_id.as_deref(), Some("job-123"));
    assert_eq!(muxes[0].job_id.as_deref(), Some("job-123"));
    assert_eq!(app.store.user_count().await, 1);
}

#[tokio::test]
async fn render_request_carries_records_and_callback() {
    let app = spawn_app().await;
    let res = app.generate("Explain derivatives", "job-9").await;
    assert_eq!(res.status, StatusCode::ACCEPTED);

    let requests = app.worker.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let sent: RenderJobRequest = requests[0].body_json().unwrap();

    assert_eq!(sent.scene_name, "auto");
    assert_eq!(sent.quality, "low");
    assert_eq!(sent.audio_url, TEST_AUDIO_URL);
    assert_eq!(sent.bucket_name, "muxvideos");
    assert_eq!(sent.audio_speed, 1.0);
    assert_eq!(sent.language, "english");
    assert_eq!(sent.callback_url, "http://lesson.test/webhooks/video-generation");
    assert_eq!(sent.callback_secret.as_deref(), Some(WEBHOOK_SECRET));
    assert_eq!(sent.prompt_id, res.body["promptId"].as_str().unwrap());
    assert_eq!(sent.script_id, res.body["scriptId"].as_str().unwrap());
    assert_eq!(sent.output_name, format!("final_{}", sent.script_id));
    assert_eq!(sent.video_record_id, res.body["videoRecordId"].as_str().unwrap());
    assert_eq!(sent.mux_record_id, res.body["muxRecordId"].as_str().unwrap());
}

#[tokio::test]
async fn blank_prompt_is_rejected_without_side_effects() {
    let app = spawn_app().await;

    let res = app.post_json("/generate", json!({"prompt": "   "}), None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["success"], false);

    let res = app.post_json("/generate", json!({}), None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.user_count().await, 0);
    assert!(app.worker.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unparseable_model_output_leaves_no_job_records() {
    let app = spawn_app_with(TestOptions {
        model: FakeLanguageModel::returning(Some("this is not json")),
        ..TestOptions::default()
    })
    .await;

    let res = app.generate("Explain derivatives", "job-1").await;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert!(app.store.scripts().await.is_empty());
    assert!(app.store.videos().await.is_empty());
    assert!(app.store.muxes().await.is_empty());
    assert!(app.worker.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_model_output_is_a_gateway_error() {
    let app = spawn_app_with(TestOptions {
        model: FakeLanguageModel::returning(None),
        ..TestOptions::default()
    })
    .await;

    let res = app.generate("Explain derivatives", "job-1").await;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert!(app.store.videos().await.is_empty());
}

#[tokio::test]
async fn dispatch_failure_marks_both_records_failed() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/render-and-upload-async"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "GPU unavailable"})))
        .mount(&app.worker)
        .await;

    let res = app.post_json("/generate", json!({"prompt": "Explain derivatives"}), None).await;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert!(res.body["error"].as_str().unwrap().contains("GPU unavailable"));

    let videos = app.store.videos().await;
    let muxes = app.store.muxes().await;
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].status, JobStatus::Failed);
    assert_eq!(muxes[0].status, JobStatus::Failed);
    assert_eq!(videos[0].error_message.as_deref(), Some("GPU unavailable"));
    assert_eq!(muxes[0].error_message.as_deref(), Some("GPU unavailable"));
}

#[tokio::test]
async fn unreachable_worker_marks_both_records_failed() {
    let app = spawn_app_with(TestOptions {
        backend_url: Some(closed_port_url()),
        ..TestOptions::default()
    })
    .await;

    let res = app.post_json("/generate", json!({"prompt": "Explain derivatives"}), None).await;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert_eq!(res.body["success"], false);

    let videos = app.store.videos().await;
    let muxes = app.store.muxes().await;
    assert_eq!(videos.len(), 1);
    assert_eq!(muxes.len(), 1);
    assert_eq!(videos[0].status, JobStatus::Failed);
    assert_eq!(muxes[0].status, JobStatus::Failed);
    let reason = videos[0].error_message.clone().unwrap();
    assert!(!reason.is_empty());
    assert_eq!(muxes[0].error_message.as_deref(), Some(reason.as_str()));
    assert!(res.body["error"].as_str().unwrap().contains(&reason));
}

#[tokio::test]
async fn missing_worker_job_id_is_replaced_by_the_callback() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/render-and-upload-async"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "queued"})))
        .mount(&app.worker)
        .await;

    let res = app.post_json("/generate", json!({"prompt": "Explain derivatives"}), None).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    let local_id = res.body["jobId"].as_str().unwrap().to_string();
    assert!(local_id.starts_with("local-"));
    assert_eq!(app.store.videos().await[0].job_id.as_deref(), Some(local_id.as_str()));

    let callback = app
        .callback(
            Some(WEBHOOK_SECRET),
            json!({
                "jobId": "worker-77",
                "status": "COMPLETED",
                "videoRecordId": res.body["videoRecordId"],
                "muxRecordId": res.body["muxRecordId"],
                "videoUrl": "https://cdn.example.com/raw.mp4",
                "finalVideoUrl": "https://cdn.example.com/final.mp4"
            }),
        )
        .await;
    assert_eq!(callback.status, StatusCode::OK);

    let videos = app.store.videos().await;
    let muxes = app.store.muxes().await;
    assert_eq!(videos[0].status, JobStatus::Completed);
    assert_eq!(muxes[0].status, JobStatus::Completed);
    assert_eq!(videos[0].job_id.as_deref(), Some("worker-77"));
    assert_eq!(muxes[0].job_id.as_deref(), Some("worker-77"));
}

#[tokio::test]
async fn empty_submission_body_still_queues_the_job() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/render-and-upload-async"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&app.worker)
        .await;

    let res = app.post_json("/generate", json!({"prompt": "Explain derivatives"}), None).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    assert_eq!(res.body["jobStatus"], "PROCESSING");
    assert!(res.body["jobId"].as_str().unwrap().starts_with("local-"));

    let callback = app
        .callback(
            Some(WEBHOOK_SECRET),
            json!({"jobId": "worker-5", "status": "FAILED", "muxRecordId": res.body["muxRecordId"], "error": "oom"}),
        )
        .await;
    assert_eq!(callback.status, StatusCode::OK);
    let muxes = app.store.muxes().await;
    assert_eq!(muxes[0].status, JobStatus::Failed);
    assert_eq!(muxes[0].error_message.as_deref(), Some("oom"));
}

#[tokio::test]
async fn rate_limited_submission_is_retried() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/render-and-upload-async"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"detail": "slow down"})))
        .up_to_n_times(1)
        .mount(&app.worker)
        .await;
    mount_render_accepts(&app.worker, "job-after-retry").await;

    let res = app.post_json("/generate", json!({"prompt": "Explain derivatives"}), None).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    assert_eq!(res.body["jobId"], "job-after-retry");
    assert_eq!(app.worker.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn synthesized_audio_uses_translated_narration() {
    let app = spawn_app_with(TestOptions {
        tts_enabled: true,
        ..TestOptions::default()
    })
    .await;
    mount_render_accepts(&app.worker, "job-hi").await;

    let res = app
        .post_json("/generate", json!({"prompt": "Explain derivatives", "language": "Hindi"}), None)
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    assert_eq!(res.body["usedTestAudio"], false);

    let translations = app.model.translation_prompts();
    assert_eq!(translations.len(), 1);
    assert!(translations[0].contains("Here is a curve. The slope changes."));

    assert_eq!(app.speech.call_count(), 1);
    assert_eq!(app.speech.texts.lock().unwrap()[0], "TRADUIT: narration");

    let uploads = app.storage.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    let (bucket, object_name, size, content_type) = &uploads[0];
    assert_eq!(bucket, "audio");
    assert!(object_name.ends_with(".wav"));
    assert_eq!(*size, 44 + 8);
    assert_eq!(content_type, "audio/wav");

    let audio_url = res.body["audioUrl"].as_str().unwrap();
    assert_eq!(audio_url, format!("https://storage.example.com/audio/{}", object_name));

    let sent: RenderJobRequest = app.worker.received_requests().await.unwrap()[0].body_json().unwrap();
    assert_eq!(sent.language, "hindi");
    assert_eq!(sent.audio_url, audio_url);
}

#[tokio::test]
async fn english_narration_is_not_translated() {
    let app = spawn_app().await;
    let res = app.generate("Explain derivatives", "job-1").await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    assert!(app.model.translation_prompts().is_empty());
}

#[tokio::test]
async fn signed_in_caller_owns_the_prompt() {
    let app = spawn_app().await;

    let res = app
        .post_json("/prompts", json!({"prompt": "Fourier series", "language": "Spanish"}), Some("user_7"))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["userId"], "user_7");
    assert_eq!(res.body["language"], "spanish");
    assert_eq!(res.body["prompt"], "Fourier series");

    app.post_json("/prompts", json!({"prompt": "Taylor series"}), Some("user_7")).await;
    assert_eq!(app.store.user_count().await, 1);

    let anonymous = app.post_json("/prompts", json!({"prompt": "Limits"}), None).await;
    assert_eq!(anonymous.body["userId"], "unknown");
}

#[tokio::test]
async fn invalid_token_is_unauthorized() {
    let app = spawn_app().await;
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/prompts")
        .header("content-type", "application/json")
        .header("authorization", "Bearer not-a-token")
        .body(axum::body::Body::from(json!({"prompt": "Limits"}).to_string()))
        .unwrap();

    let res = app.send(request).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.user_count().await, 0);
}
