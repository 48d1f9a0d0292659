#![cfg(feature = "web")]

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{FakeBackend, sample_pdf, signature_png};
use payslip_signer::app::{AppState, router};

fn app(backend: FakeBackend) -> (Arc<AppState<FakeBackend>>, Router) {
    let state = Arc::new(AppState::new(backend, Duration::from_secs(3600)));
    let router = router(state.clone(), "static");
    (state, router)
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn login_request(form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

fn sign_request(signature: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/sign")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(json!({ "signature": signature }).to_string()))
        .unwrap()
}

fn data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Log in and return the `session=<id>` pair to send back as a cookie
async fn logged_in(router: &Router, form: &str) -> String {
    let response = router.clone().oneshot(login_request(form)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sign");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn login_page_lists_every_employee() {
    let (_, router) = app(FakeBackend::new());

    let response = router.oneshot(get("/login", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains("<option value=\"Ana Souza\">Ana Souza</option>"));
    assert!(page.contains("<option value=\"Duda Reis\">Duda Reis</option>"));
    assert!(page.contains("type=\"password\""));
}

#[tokio::test]
async fn empty_roster_shows_a_warning() {
    let (_, router) = app(FakeBackend::empty());

    let response = router.oneshot(get("/login", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains("Não foram encontrados dados na planilha."));
    assert!(!page.contains("<form method=\"post\" action=\"/login\""));
}

#[tokio::test]
async fn unavailable_roster_is_a_bad_gateway() {
    let mut backend = FakeBackend::new();
    backend.fail_roster = true;
    let (_, router) = app(backend);

    let response = router.oneshot(get("/login", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(body_text(response).await.contains("Não foi possível carregar a planilha."));
}

#[tokio::test]
async fn root_redirects_to_login() {
    let (_, router) = app(FakeBackend::new());

    let response = router.oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn wrong_password_rerenders_with_name_selected() {
    let (state, router) = app(FakeBackend::new());

    let response = router
        .oneshot(login_request("name=Bruno+Lima&password=nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let page = body_text(response).await;
    assert!(page.contains("Senha incorreta."));
    assert!(page.contains("<option value=\"Bruno Lima\" selected>Bruno Lima</option>"));
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn unreadable_link_is_reported_on_the_login_page() {
    let (_, router) = app(FakeBackend::new());

    let response = router
        .oneshot(login_request("name=Duda+Reis&password=pw"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("Não foi possível carregar seu holerite"));
}

#[tokio::test]
async fn sign_page_requires_a_session() {
    let (_, router) = app(FakeBackend::new());

    let response = router.clone().oneshot(get("/sign", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = router
        .oneshot(get("/sign", Some("session=not-a-session")))
        .await
        .unwrap();
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn login_opens_the_signing_page() {
    let (state, router) = app(FakeBackend::new());
    let cookie = logged_in(&router, "name=Ana+Souza&password=1234").await;
    assert_eq!(state.sessions.len(), 1);

    let response = router
        .clone()
        .oneshot(get("/sign", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Ana Souza"));
    assert!(page.contains("<canvas"));

    // a logged-in visitor skips the login form
    let response = router.oneshot(get("/login", Some(&cookie))).await.unwrap();
    assert_eq!(location(&response), "/sign");
}

#[tokio::test]
async fn document_serves_the_unsigned_pdf() {
    let (_, router) = app(FakeBackend::new());
    let cookie = logged_in(&router, "name=Ana+Souza&password=1234").await;

    let response = router
        .clone()
        .oneshot(get("/document", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.to_vec(), sample_pdf(1));

    let response = router.oneshot(get("/document", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signing_returns_the_recorded_link() {
    let (state, router) = app(FakeBackend::new());
    let cookie = logged_in(&router, "name=Ana+Souza&password=1234").await;

    let response = router
        .oneshot(sign_request(&data_url(&signature_png(true)), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["link"], "https://drive.google.com/file/d/signed-1/view");

    let recorded = state.backend.recorded.lock().unwrap();
    assert_eq!(
        *recorded,
        vec![(2, "https://drive.google.com/file/d/signed-1/view".to_string())]
    );
}

#[tokio::test]
async fn roster_failure_after_upload_is_partial() {
    let mut backend = FakeBackend::new();
    backend.fail_record = true;
    let (_, router) = app(backend);
    let cookie = logged_in(&router, "name=Ana+Souza&password=1234").await;

    let response = router
        .oneshot(sign_request(&data_url(&signature_png(true)), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "partial");
    assert_eq!(body["link"], "https://drive.google.com/file/d/signed-1/view");
}

#[tokio::test]
async fn blank_canvas_is_a_bad_request() {
    let (state, router) = app(FakeBackend::new());
    let cookie = logged_in(&router, "name=Ana+Souza&password=1234").await;

    let response = router
        .oneshot(sign_request(&data_url(&signature_png(false)), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Desenhe sua assinatura antes de assinar.");
    assert!(state.backend.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn upload_failure_is_a_bad_gateway() {
    let mut backend = FakeBackend::new();
    backend.fail_upload = true;
    let (_, router) = app(backend);
    let cookie = logged_in(&router, "name=Ana+Souza&password=1234").await;

    let response = router
        .oneshot(sign_request(&data_url(&signature_png(true)), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["status"], "error");
}

#[tokio::test]
async fn signing_without_a_session_is_unauthorized() {
    let (state, router) = app(FakeBackend::new());

    let response = router
        .oneshot(sign_request(&data_url(&signature_png(true)), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["status"], "error");
    assert!(state.backend.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn logout_ends_the_session() {
    let (state, router) = app(FakeBackend::new());
    let cookie = logged_in(&router, "name=Ana+Souza&password=1234").await;

    let logout = Request::builder()
        .method("POST")
        .uri("/logout")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(logout).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(state.sessions.is_empty());

    let response = router.oneshot(get("/sign", Some(&cookie))).await.unwrap();
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn malformed_sign_body_gets_a_json_error() {
    let (state, router) = app(FakeBackend::new());
    let cookie = logged_in(&router, "name=Ana+Souza&password=1234").await;

    let garbled = Request::builder()
        .method("POST")
        .uri("/api/sign")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &cookie)
        .body(Body::from("{\"signature\": "))
        .unwrap();
    let response = router.clone().oneshot(garbled).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["link"].is_null());

    let untyped = Request::builder()
        .method("POST")
        .uri("/api/sign")
        .header(header::COOKIE, &cookie)
        .body(Body::from("signature=abc"))
        .unwrap();
    let response = router.oneshot(untyped).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], "error");

    assert!(state.backend.uploads.lock().unwrap().is_empty());
}
