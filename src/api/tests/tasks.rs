use super::*;
use crate::types::TaskId;

async fn post_task(app: &Router, body: serde_json::Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn submit_without_url_is_rejected() {
    let (app, service, _temp_dir) =
        create_test_app(StubRunner::new(Outcome::Chapters(vec![]))).await;

    let response = post_task(&app, serde_json::json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "missing_parameter");

    assert_eq!(service.stats().tracked, 0, "no task created");
}

#[tokio::test]
async fn submit_with_unsupported_scheme_is_rejected() {
    let (app, _service, _temp_dir) =
        create_test_app(StubRunner::new(Outcome::Chapters(vec![]))).await;

    let response = post_task(&app, serde_json::json!({"url": "file:///etc/passwd"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "invalid_parameter");
}

#[tokio::test]
async fn submit_then_poll_until_completed() {
    let runner = StubRunner::gated(Outcome::Chapters(sample_chapters()));
    let (app, service, _temp_dir) = create_test_app(runner.clone()).await;

    let response = post_task(&app, serde_json::json!({"url": URL})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    let id = TaskId::from_source(URL);
    assert_eq!(body["task_id"], id.as_str());
    assert_eq!(body["status"], "processing");
    assert!(body.get("chapters").is_none());

    let response = get(&app, &format!("/tasks/{id}")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    runner.release(1);
    wait_until_finished(&service, URL).await;

    let response = get(&app, &format!("/tasks/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["chapters"].as_array().unwrap().len(), 2);
    assert_eq!(body["chapters"][1]["start_page"], 5);

    // Resubmission answers from the stored result
    let response = post_task(&app, serde_json::json!({"url": URL})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "completed");
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn failed_task_reports_error() {
    let (app, service, _temp_dir) =
        create_test_app(StubRunner::new(Outcome::Fail("upstream 404".to_string()))).await;

    post_task(&app, serde_json::json!({"url": URL})).await;
    wait_until_finished(&service, URL).await;

    let response = get(&app, &format!("/tasks/{}", TaskId::from_source(URL))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert!(body["error"].as_str().unwrap().contains("upstream 404"));
}

#[tokio::test]
async fn poll_unknown_task_reports_unknown() {
    let (app, _service, _temp_dir) =
        create_test_app(StubRunner::new(Outcome::Chapters(vec![]))).await;

    let id = TaskId::from_source("https://example.com/never.pdf");
    let response = get(&app, &format!("/tasks/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "unknown");
}

#[tokio::test]
async fn poll_malformed_task_id_is_rejected() {
    let (app, _service, _temp_dir) =
        create_test_app(StubRunner::new(Outcome::Chapters(vec![]))).await;

    let response = get(&app, "/tasks/not-a-task").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_parameter");
    assert_eq!(body["error"]["details"]["parameter"], "task_id");
}
