//! End-to-end workflow tests against mock weather and predictions APIs.

use std::sync::Arc;
use std::time::Duration;

use skyframe_imagegen::ImageJobClient;
use skyframe_weather::{FixedLocator, Location, WeatherProvider};
use skyframe_workflow::Orchestrator;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "black-forest-labs/flux-dev";
const INTERVAL: Duration = Duration::from_millis(50);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

fn prediction(status: &str, output: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": "abc123",
        "model": MODEL,
        "status": status,
        "output": output,
        "error": null
    })
}

async fn mount_weather(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "London",
            "weather": [{"description": "light rain"}],
            "main": {"temp": 14.0},
            "sys": {"country": "GB"}
        })))
        .mount(server)
        .await;
}

async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/models/black-forest-labs/flux-dev/predictions"))
        .and(body_string_contains("London"))
        .and(body_string_contains("51.5000, -0.1200"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(prediction("starting", serde_json::Value::Null)),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn orchestrator(server: &MockServer) -> Orchestrator {
    let weather_url = format!("{}/weather", server.uri());
    let weather = WeatherProvider::with_base_url(&weather_url, Some("weather-key".into())).unwrap();
    let jobs = ImageJobClient::with_base_url(&server.uri(), Some("image-token".into()), MODEL)
        .unwrap();

    Orchestrator::new(
        Arc::new(FixedLocator::new(Location::new(51.5, -0.12))),
        Arc::new(weather),
        Arc::new(jobs),
        INTERVAL,
    )
}

#[tokio::test]
async fn test_generation_completes() {
    let server = MockServer::start().await;
    mount_weather(&server).await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/predictions/abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(prediction("processing", serde_json::Value::Null)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/predictions/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(prediction(
            "succeeded",
            serde_json::json!(["https://replicate.delivery/abc123/out-0.png"]),
        )))
        .mount(&server)
        .await;

    let mut orch = orchestrator(&server);
    orch.generate().await.unwrap();
    assert_eq!(orch.state().job_id.as_deref(), Some("abc123"));

    let state = tokio::time::timeout(SETTLE_TIMEOUT, orch.wait_until_settled())
        .await
        .unwrap();

    assert_eq!(
        state.image_url.as_deref(),
        Some("https://replicate.delivery/abc123/out-0.png")
    );
    assert_eq!(state.status, "Image generation successful!");
    assert_eq!(state.job_id, None);
    assert!(!state.loading);
    assert!(!state.is_error);
}

#[tokio::test]
async fn test_unknown_job_stops_polling() {
    let server = MockServer::start().await;
    mount_weather(&server).await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/predictions/abc123"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "detail": "Not found."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut orch = orchestrator(&server);
    orch.generate().await.unwrap();

    let state = tokio::time::timeout(SETTLE_TIMEOUT, orch.wait_until_settled())
        .await
        .unwrap();
    assert!(state.is_error);
    assert_eq!(
        state.status,
        "Failed to fetch status: Not found. Stopping checks."
    );
    assert!(!state.show_fetch_control);

    // No further checks after the permanent failure
    tokio::time::sleep(INTERVAL * 4).await;
    assert!(!orch.is_polling());
}

#[tokio::test]
async fn test_weather_outage_does_not_block_generation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/black-forest-labs/flux-dev/predictions"))
        .and(body_string_contains("unknown conditions"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(prediction("starting", serde_json::Value::Null)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut orch = orchestrator(&server);
    orch.generate().await.unwrap();

    assert!(orch.state().weather.as_ref().unwrap().is_unknown());
    assert!(orch.is_polling());
    orch.cancel();
    assert!(!orch.is_polling());
}
