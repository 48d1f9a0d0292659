use axum::{
    Form, Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::auth::{SESSION_COOKIE, Session, SessionStore};
use crate::backend::{Backend, GoogleWorkspace};
use crate::config::Config;
use crate::error::Error;
use crate::signing::{self, SignOutcome};
use crate::stamp::{StampLayout, decode_data_url};

/// Shared state of the web application
pub struct AppState<B> {
    pub backend: B,
    pub sessions: SessionStore,
    pub layout: StampLayout,
}

impl<B> AppState<B> {
    pub fn new(backend: B, session_duration: Duration) -> Self {
        AppState {
            backend,
            sessions: SessionStore::new(session_duration),
            layout: StampLayout::default(),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    name: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub struct SignPayload {
    /// Canvas export as a `data:image/png;base64,...` URL
    signature: String,
}

#[derive(Serialize)]
struct SignResponse {
    status: String,
    link: Option<String>,
    message: String,
}

const ROSTER_EMPTY: &str = "Não foram encontrados dados na planilha.";
const ROSTER_UNAVAILABLE: &str = "Não foi possível carregar a planilha.";
const WRONG_PASSWORD: &str = "Senha incorreta.";
const SESSION_EXPIRED: &str = "Sessão expirada. Entre novamente.";

/// Build the router; `static_dir` is served under `/static` (logo)
pub fn router<B: Backend>(state: Arc<AppState<B>>, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(index::<B>))
        .route("/login", get(login_page::<B>).post(handle_login::<B>))
        .route("/sign", get(sign_page::<B>))
        .route("/document", get(original_document::<B>))
        .route("/api/sign", post(handle_sign::<B>))
        .route("/logout", post(handle_logout::<B>))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// Serve the signing workflow backed by Google Sheets and Drive
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = GoogleWorkspace::from_config(&config)?;
    let state = Arc::new(AppState::new(backend, config.session_duration()));
    let app = router(state, &config.static_dir);

    let listener = TcpListener::bind(&config.bind).await?;
    log::info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

fn current_session<B>(state: &AppState<B>, jar: &CookieJar) -> Option<Session> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.get(cookie.value()))
}

async fn index<B: Backend>(State(state): State<Arc<AppState<B>>>, jar: CookieJar) -> Redirect {
    if current_session(&state, &jar).is_some() {
        Redirect::to("/sign")
    } else {
        Redirect::to("/login")
    }
}

async fn login_page<B: Backend>(State(state): State<Arc<AppState<B>>>, jar: CookieJar) -> Response {
    if current_session(&state, &jar).is_some() {
        return Redirect::to("/sign").into_response();
    }

    match state.backend.load_roster().await {
        Ok(roster) if roster.is_empty() => {
            Html(render_login(None, None, Some(("warning", ROSTER_EMPTY)))).into_response()
        }
        Ok(roster) => Html(render_login(Some(&roster.names()), None, None)).into_response(),
        Err(e) => {
            log::error!("cannot load roster: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Html(render_login(None, None, Some(("error", ROSTER_UNAVAILABLE)))),
            )
                .into_response()
        }
    }
}

async fn handle_login<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match signing::login(&state.backend, &form.name, &form.password).await {
        Ok(session) => {
            let session_id = state.sessions.create(session);
            let cookie = Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            (jar.add(cookie), Redirect::to("/sign")).into_response()
        }
        Err(e) => {
            let (status, message) = login_failure(&form.name, e);
            let names = state.backend.load_roster().await.ok().map(|r| r.names());
            let page = render_login(
                names.as_deref(),
                Some(&form.name),
                Some(("error", message.as_str())),
            );
            (status, Html(page)).into_response()
        }
    }
}

async fn sign_page<B: Backend>(State(state): State<Arc<AppState<B>>>, jar: CookieJar) -> Response {
    let Some(session) = current_session(&state, &jar) else {
        return Redirect::to("/login").into_response();
    };

    let page = include_str!("./static/sign.html")
        .replace("{{EMPLOYEE}}", &escape_html(&session.employee))
        .replace("{{DOCUMENT_LINK}}", &escape_html(&session.document_link));
    Html(page).into_response()
}

async fn original_document<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    jar: CookieJar,
) -> Response {
    let Some(session) = current_session(&state, &jar) else {
        return (StatusCode::UNAUTHORIZED, SESSION_EXPIRED).into_response();
    };

    (
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"holerite.pdf\""),
        ],
        (*session.document).clone(),
    )
        .into_response()
}

async fn handle_sign<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    jar: CookieJar,
    payload: Result<Json<SignPayload>, JsonRejection>,
) -> Response {
    let Some(session) = current_session(&state, &jar) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(SignResponse {
                status: "error".to_string(),
                link: None,
                message: SESSION_EXPIRED.to_string(),
            }),
        )
            .into_response();
    };

    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return Error::InvalidSignature(rejection.body_text()).into_response(),
    };

    let signature = match decode_data_url(&payload.signature) {
        Ok(bytes) => bytes,
        Err(e) => return e.into_response(),
    };

    let signed_at = Local::now().naive_local();
    match signing::sign(&state.backend, &session, &signature, signed_at, &state.layout).await {
        Ok(SignOutcome::Recorded { link, .. }) => Json(SignResponse {
            status: "ok".to_string(),
            link: Some(link),
            message: "Holerite assinado com sucesso e link atualizado na planilha!".to_string(),
        })
        .into_response(),
        Ok(SignOutcome::Unrecorded { link, .. }) => Json(SignResponse {
            status: "partial".to_string(),
            link: Some(link),
            message: "Holerite assinado com sucesso, mas não foi possível atualizar o link \
                      na planilha."
                .to_string(),
        })
        .into_response(),
        Err(e) => {
            log::error!("signing failed for {}: {}", session.employee, e);
            e.into_response()
        }
    }
}

async fn handle_logout<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/login"),
    )
}

fn login_failure(name: &str, error: Error) -> (StatusCode, String) {
    match error {
        Error::AuthenticationFailed => (StatusCode::UNAUTHORIZED, WRONG_PASSWORD.to_string()),
        other => {
            log::error!("login for {:?} failed: {}", name, other);
            (
                error_status(&other),
                format!("Não foi possível carregar seu holerite: {}", other),
            )
        }
    }
}

fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::AuthenticationFailed => StatusCode::UNAUTHORIZED,
        Error::EmptySignature | Error::InvalidSignature(_) | Error::Image(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::EmployeeNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidDocumentLink(_) | Error::InvalidDocument(_) | Error::Pdf(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        Error::Http(_) | Error::Api { .. } | Error::Credentials(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = match &self {
            Error::EmptySignature => "Desenhe sua assinatura antes de assinar.".to_string(),
            Error::AuthenticationFailed => WRONG_PASSWORD.to_string(),
            Error::Http(_) | Error::Api { .. } => {
                "Não foi possível salvar o arquivo assinado.".to_string()
            }
            other => format!("Ocorreu um erro durante o processo de assinatura: {}", other),
        };

        (
            error_status(&self),
            Json(SignResponse {
                status: "error".to_string(),
                link: None,
                message,
            }),
        )
            .into_response()
    }
}

/// Fill the login template; `names` is `None` when no form can be shown
fn render_login(
    names: Option<&[String]>,
    selected: Option<&str>,
    message: Option<(&str, &str)>,
) -> String {
    let message_html = match message {
        Some((class, text)) => format!(
            "<div class=\"message {}\">{}</div>",
            class,
            escape_html(text)
        ),
        None => String::new(),
    };

    let form_html = match names {
        Some(names) if !names.is_empty() => {
            let options: String = names
                .iter()
                .map(|name| {
                    let escaped = escape_html(name);
                    let marker = if selected == Some(name.as_str()) { " selected" } else { "" };
                    format!("<option value=\"{}\"{}>{}</option>", escaped, marker, escaped)
                })
                .collect::<Vec<_>>()
                .join("\n            ");

            format!(
                r#"<form method="post" action="/login">
        <label for="name">Selecione seu nome:</label>
        <select id="name" name="name">
            {}
        </select>
        <label for="password">Digite sua senha:</label>
        <input id="password" name="password" type="password" autocomplete="current-password">
        <button type="submit">Entrar</button>
    </form>"#,
                options
            )
        }
        _ => String::new(),
    };

    include_str!("./static/login.html")
        .replace("{{MESSAGE}}", &message_html)
        .replace("{{FORM}}", &form_html)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
