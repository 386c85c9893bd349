use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::gateway_support::{TestApp, json_body};

async fn app_with_upstream() -> (TestApp, MockServer) {
    let upstream = MockServer::start().await;
    let app = TestApp::new(Vec::new(), &upstream.uri());
    (app, upstream)
}

#[tokio::test]
async fn answers_are_forwarded_as_form_fields() {
    let (app, upstream) = app_with_upstream().await;
    Mock::given(method("POST"))
        .and(path("/1FAIpQLSe/formResponse"))
        .and(header_matcher(
            "content-type",
            "application/x-www-form-urlencoded",
        ))
        .and(body_string_contains("entry.111=Ada+Lovelace"))
        .and(body_string_contains("entry.222=Tea&entry.222=Cake"))
        .and(body_string_contains("submit=Submit"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;

    let (status, body) = app
        .post_json(
            "/api/submit/1FAIpQLSe",
            &json!({
                "entry.111": "Ada Lovelace",
                "entry.222": ["Tea", "Cake"],
                "entry.333": "",
            }),
        )
        .await;

    assert_eq!(status, 200, "{body}");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn upstream_redirect_counts_as_success() {
    let (app, upstream) = app_with_upstream().await;
    Mock::given(method("POST"))
        .and(path("/abc/formResponse"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "https://docs.google.com/done"),
        )
        .mount(&upstream)
        .await;

    let (status, _) = app
        .post_json("/api/submit/abc", &json!({ "entry.1": "x" }))
        .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn plain_text_bodies_are_read_as_json() {
    let (app, upstream) = app_with_upstream().await;
    Mock::given(method("POST"))
        .and(path("/abc/formResponse"))
        .and(body_string_contains("entry.1=x"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;

    let request = Request::post("/api/submit/abc")
        .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
        .body(Body::from(r#"{"entry.1":"x"}"#))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn undecodable_body_is_a_bad_request() {
    let (app, upstream) = app_with_upstream().await;
    let request = Request::post("/api/submit/abc")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("entry.1=x"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upstream_rejection_reports_its_status() {
    let (app, upstream) = app_with_upstream().await;
    Mock::given(method("POST"))
        .and(path("/abc/formResponse"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&upstream)
        .await;

    let (status, body) = app
        .post_json("/api/submit/abc", &json!({ "entry.1": "x" }))
        .await;
    assert_eq!(status, 500);
    assert_eq!(body["upstreamStatus"], 400);
}

#[tokio::test]
async fn malformed_form_ids_and_payloads_are_rejected_locally() {
    let (app, upstream) = app_with_upstream().await;

    let (status, _) = app
        .post_json("/api/submit/bad%20id", &json!({ "entry.1": "x" }))
        .await;
    assert_eq!(status, 400);

    let (status, _) = app
        .post_json("/api/submit/abc", &json!(["not", "an", "object"]))
        .await;
    assert_eq!(status, 400);

    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn preflight_allows_any_origin() {
    let (app, _upstream) = app_with_upstream().await;
    let request = Request::options("/api/submit/abc")
        .header(header::ORIGIN, "null")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap();
    assert!(methods.contains("POST"));
}
