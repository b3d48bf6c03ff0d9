use authpoint_auth::RegisteredClient;
use authpoint_server::{AppConfig, build_app, build_router, build_state};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

const USER_HEADER: &str = "x-authenticated-user";

fn config() -> AppConfig {
    AppConfig {
        clients: vec![
            RegisteredClient::new("webapp")
                .with_redirect_uri("https://app.example.com/callback")
                .with_grant_type("authorization_code")
                .with_grant_type("implicit"),
            RegisteredClient::new("trusted")
                .with_redirect_uri("https://trusted.example.com/cb")
                .with_grant_type("authorization_code")
                .with_auto_approve("read*"),
        ],
        ..AppConfig::default()
    }
}

fn app() -> Router {
    build_app(&config()).expect("build app")
}

fn authorize(query: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/oauth/authorize?{query}"))
        .header(USER_HEADER, "user-1")
        .body(Body::empty())
        .unwrap()
}

fn approve(form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/oauth/authorize")
        .header(USER_HEADER, "user-1")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(resp: &Response<Body>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .unwrap()
        .to_string()
}

async fn snapshot_id(app: &Router, query: &str) -> String {
    let resp = app.clone().oneshot(authorize(query)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["approval_parameter"], "user_oauth_approval");
    body["snapshot"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_endpoints_work() {
    let app = app();

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["status"], "ok");

    let resp = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json(resp).await["service"], "authpoint");
}

#[tokio::test]
async fn anonymous_request_is_rejected() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/oauth/authorize?client_id=webapp&response_type=code")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(resp).await["error"], "access_denied");
}

#[tokio::test]
async fn unknown_client_is_answered_directly() {
    let resp = app()
        .oneshot(authorize("client_id=nobody&response_type=code"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = json(resp).await;
    assert_eq!(body["error"], "invalid_client");
    assert!(body["error_description"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn redirect_mismatch_is_answered_directly() {
    let resp = app()
        .oneshot(authorize(
            "client_id=webapp&response_type=code&redirect_uri=https%3A%2F%2Fevil.example.com",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(resp).await["error"], "redirect_mismatch");
}

#[tokio::test]
async fn code_flow_through_approval() {
    let app = app();
    let id = snapshot_id(&app, "client_id=webapp&response_type=code&scope=read&state=s1").await;

    let resp = app
        .clone()
        .oneshot(approve(&format!("snapshot_id={id}&user_oauth_approval=true")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = location(&resp);
    assert!(location.starts_with("https://app.example.com/callback?code="));
    assert!(location.ends_with("&state=s1"));

    // The snapshot is consumed.
    let resp = app
        .oneshot(approve(&format!("snapshot_id={id}&user_oauth_approval=true")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn implicit_flow_denied() {
    let app = app();
    let id = snapshot_id(&app, "client_id=webapp&response_type=token&state=s2").await;

    let resp = app
        .oneshot(approve(&format!("snapshot_id={id}&user_oauth_approval=false")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = location(&resp);
    assert!(location.starts_with("https://app.example.com/callback#error=access_denied"));
    assert!(location.contains("state=s2"));
}

#[tokio::test]
async fn tampered_approval_is_rejected() {
    let app = app();
    let id = snapshot_id(&app, "client_id=webapp&response_type=code&scope=read").await;

    let resp = app
        .oneshot(approve(&format!(
            "snapshot_id={id}&user_oauth_approval=true&scope=read+admin"
        )))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(resp).await["error"], "invalid_request");
}

#[tokio::test]
async fn unknown_snapshot_is_rejected() {
    let resp = app()
        .oneshot(approve(
            "snapshot_id=00000000-0000-0000-0000-000000000000&user_oauth_approval=true",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(resp).await["error"], "invalid_request");
}

#[tokio::test]
async fn auto_approved_client_is_redirected_immediately() {
    let resp = app()
        .oneshot(authorize("client_id=trusted&response_type=code&scope=read"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).starts_with("https://trusted.example.com/cb?code="));
}

#[tokio::test]
async fn snapshot_cannot_be_answered_by_another_user() {
    let app = app();
    let id = snapshot_id(&app, "client_id=webapp&response_type=code&scope=read").await;

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/oauth/authorize")
                .header(USER_HEADER, "user-2")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("snapshot_id={id}&user_oauth_approval=true")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // The owner can still answer it.
    let resp = app
        .oneshot(approve(&format!("snapshot_id={id}&user_oauth_approval=true")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn issued_code_is_redeemable_once() {
    let cfg = config();
    let state = build_state(&cfg).expect("build state");
    let codes = state.codes.clone();
    let app = build_router(state, &cfg);

    let resp = app
        .oneshot(authorize("client_id=trusted&response_type=code&scope=read"))
        .await
        .unwrap();
    let location = location(&resp);
    let code = location
        .split_once("code=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest))
        .unwrap();

    assert_eq!(codes.len(), 1);
    assert_eq!(codes.cleanup_expired(), 0);
    let issued = codes.redeem(code).expect("code is stored");
    assert_eq!(issued.subject_id, "user-1");
    assert_eq!(issued.request.client_id, "trusted");
    assert!(codes.redeem(code).is_none());
}
