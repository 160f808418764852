//! Integration tests for ImageJobClient using wiremock.
//!
//! These tests verify submission and status checks against a mock
//! predictions API.

use skyframe_imagegen::{GenerationError, ImageJobClient, JobService, JobStatus};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "black-forest-labs/flux-dev";

fn client(mock_server: &MockServer) -> ImageJobClient {
    ImageJobClient::with_base_url(&mock_server.uri(), Some("test-token".to_string()), MODEL)
        .unwrap()
}

/// Helper to create a prediction payload
fn prediction(id: &str, status: &str, output: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "model": MODEL,
        "status": status,
        "output": output,
        "error": null,
        "urls": {"get": format!("https://api.replicate.com/v1/predictions/{}", id)}
    })
}

#[tokio::test]
async fn test_submit_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/black-forest-labs/flux-dev/predictions"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_partial_json(serde_json::json!({
            "input": {
                "prompt": "A rainy street in London",
                "width": 1024,
                "height": 1024,
                "num_inference_steps": 35,
                "scheduler": "dpmpp_2m",
                "num_outputs": 1
            }
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(prediction(
                "abc123",
                "starting",
                serde_json::Value::Null,
            )),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let job = client(&mock_server)
        .submit("A rainy street in London")
        .await
        .unwrap();

    assert_eq!(job.id, "abc123");
    assert_eq!(job.status, JobStatus::Starting);
    assert!(job.output.is_empty());
}

#[tokio::test]
async fn test_submit_empty_prompt_is_not_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).submit("   ").await;
    assert!(matches!(result, Err(GenerationError::EmptyPrompt)));
}

#[tokio::test]
async fn test_submit_missing_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/black-forest-labs/flux-dev/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "status": "starting"
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).submit("prompt").await;
    assert!(matches!(result, Err(GenerationError::MissingJobId)));
}

#[tokio::test]
async fn test_submit_non_json_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/black-forest-labs/flux-dev/predictions"))
        .respond_with(
            ResponseTemplate::new(502)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>Bad Gateway</body></html>"),
        )
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).submit("prompt").await.unwrap_err();

    match &err {
        GenerationError::NonJsonResponse { status, snippet } => {
            assert_eq!(*status, 502);
            assert!(snippet.contains("Bad Gateway"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("non-JSON"));
}

#[tokio::test]
async fn test_submit_json_error_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/black-forest-labs/flux-dev/predictions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "title": "Unauthenticated",
            "detail": "You did not pass a valid authentication token",
            "status": 401
        })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).submit("prompt").await.unwrap_err();

    match err {
        GenerationError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "You did not pass a valid authentication token");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_error_without_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/black-forest-labs/flux-dev/predictions"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({})))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).submit("prompt").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to start image generation (Status: 422)"
    );
}

#[tokio::test]
async fn test_poll_processing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/predictions/abc123"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(prediction(
            "abc123",
            "processing",
            serde_json::Value::Null,
        )))
        .mount(&mock_server)
        .await;

    let job = client(&mock_server).poll("abc123").await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert!(!job.status.is_terminal());
}

#[tokio::test]
async fn test_poll_succeeded_with_output() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/predictions/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(prediction(
            "abc123",
            "succeeded",
            serde_json::json!(["https://example.com/img.png"]),
        )))
        .mount(&mock_server)
        .await;

    let job = client(&mock_server).poll("abc123").await.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.first_output(), Some("https://example.com/img.png"));
}

#[tokio::test]
async fn test_poll_failed_keeps_reason() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/predictions/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "abc123",
            "status": "failed",
            "output": null,
            "error": "CUDA out of memory"
        })))
        .mount(&mock_server)
        .await;

    let job = client(&mock_server).poll("abc123").await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("CUDA out of memory"));
}

#[tokio::test]
async fn test_poll_not_found_is_permanent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/predictions/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "detail": "Not found."
        })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).poll("missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.is_permanent());
    assert_eq!(err.to_string(), "Not found.");
}

#[tokio::test]
async fn test_poll_server_error_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/predictions/abc123"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "detail": "Internal server error"
        })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).poll("abc123").await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(!err.is_permanent());
}

#[tokio::test]
async fn test_poll_transport_failure_is_transient() {
    // Nothing listens on the discard port
    let client =
        ImageJobClient::with_base_url("http://127.0.0.1:9", Some("t".to_string()), MODEL).unwrap();
    let err = client.poll("abc123").await.unwrap_err();
    assert!(matches!(err, GenerationError::Network(_)));
    assert!(!err.is_permanent());
}

#[tokio::test]
async fn test_poll_empty_id_is_not_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).poll("").await;
    assert!(matches!(result, Err(GenerationError::MissingJobId)));
}
