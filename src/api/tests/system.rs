use super::*;
use crate::types::{Event, TaskId};

#[tokio::test]
async fn health_reports_version() {
    let (app, _service, _temp_dir) =
        create_test_app(StubRunner::new(Outcome::Chapters(vec![]))).await;

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn stats_reflect_pool_configuration() {
    let runner = StubRunner::gated(Outcome::Chapters(vec![]));
    let (app, service, _temp_dir) = create_test_app(runner.clone()).await;

    service.submit(URL).await.unwrap();
    crate::orchestrator::test_helpers::wait_for(|| runner.running() == 1).await;

    let response = get(&app, "/stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["active"], 1);
    assert_eq!(body["max_concurrent"], 3);
    assert_eq!(body["tracked"], 1);

    runner.release(1);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _service, _temp_dir) =
        create_test_app(StubRunner::new(Outcome::Chapters(vec![]))).await;

    let response = get(&app, "/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/pdf-chapter"].is_object());
}

#[tokio::test]
async fn event_stream_is_sse() {
    let (app, service, _temp_dir) =
        create_test_app(StubRunner::new(Outcome::Chapters(vec![]))).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/events")
                .header("Accept", "text/event-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.contains("text/event-stream"));

    // Read the first frame after emitting an event
    let mut body = response.into_body().into_data_stream();
    service.emit_event(Event::TaskStarted {
        id: TaskId::from_source(URL),
    });

    use futures::StreamExt;
    let frame = tokio::time::timeout(Duration::from_secs(2), body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: task_started"));
    assert!(text.contains(TaskId::from_source(URL).as_str()));
}
