//!
//! foxhub HTTP server
//! ------------------
//! Axum-based HTTP surface for the foxhub access gate.
//!
//! Responsibilities:
//! - Session management with an HttpOnly cookie bound to the in-process
//!   session registry.
//! - Login/logout endpoints backed by the configured `CredentialBackend`.
//! - The request guard applied to every protected page and API route:
//!   pass-through with the principal on a live session, redirect to the
//!   login page otherwise.
//! - Public connectivity-status endpoint that never errors to the caller.
//!
//! All process-lifetime state (credential backend, session registry) lives in
//! `AppState` and is injected into handlers; nothing here is a global.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{routing::{get, post}, Router, extract::State, Json};
use axum::response::{IntoResponse, Redirect, Response};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use anyhow::Context;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::credentials::{CredentialBackend, FixedCredentials, StoredCredentials, VerifyError};
use crate::error::AppError;
use crate::identity::{Principal, SessionManager};
use crate::users::UserStore;

pub const SESSION_COOKIE: &str = "foxhub_session";
const SESSION_MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// Fixed route table: gate-guarded path -> page file under the pages root.
pub const PROTECTED_PAGES: &[(&str, &str)] = &[
    ("/inventory.html", "Inventory.html"),
    ("/barcode.html", "Barcode.html"),
    ("/materialshipments.html", "MaterialShipments.html"),
    ("/ordershipments.html", "OrderShipments.html"),
    ("/reports.html", "Reports.html"),
    ("/stocktracking.html", "StockTracking.html"),
    ("/warehouselayandopti.html", "WarehouseLayAndOpti.html"),
];

const LOGIN_PAGE: &str = "/login.html";
const LANDING_PAGE: &str = "/inventory.html";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn CredentialBackend>,
    pub sessions: SessionManager,
    pub pages_root: PathBuf,
}

/// Start the gate with configuration taken from the environment.
pub async fn run() -> anyhow::Result<()> {
    let http_port: u16 = std::env::var("FOXHUB_HTTP_PORT").ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3000);
    let data_root = std::env::var("FOXHUB_DATA_FOLDER").unwrap_or_else(|_| "data".to_string());
    let pages_root = std::env::var("FOXHUB_PAGES_FOLDER").unwrap_or_else(|_| "pages".to_string());
    let auth_mode = std::env::var("FOXHUB_AUTH").unwrap_or_else(|_| "store".to_string());
    run_with_options(http_port, &data_root, &pages_root, &auth_mode).await
}

/// Start the foxhub HTTP server bound to the given port.
///
/// Selects the credential backend (`fixed` or `store`), seeds the bootstrap
/// admin record for the stored backend, and mounts all routes.
pub async fn run_with_options(
    http_port: u16,
    data_root: &str,
    pages_root: &str,
    auth_mode: &str,
) -> anyhow::Result<()> {
    let backend: Arc<dyn CredentialBackend> = match auth_mode {
        "fixed" => {
            info!("auth backend: fixed credential pair (no store)");
            Arc::new(FixedCredentials::new(
                crate::credentials::BOOTSTRAP_USERNAME,
                crate::credentials::BOOTSTRAP_PASSWORD,
            ))
        }
        _ => {
            std::fs::create_dir_all(data_root)
                .with_context(|| format!("Failed to create or access data root: {}", data_root))?;
            let creds = StoredCredentials::new(UserStore::new(Path::new(data_root)));
            creds.ensure_bootstrap_admin()
                .with_context(|| format!("While seeding bootstrap admin under data root: {}", data_root))?;
            info!("auth backend: hashed user table under '{}'", data_root);
            Arc::new(creds)
        }
    };

    let state = AppState {
        backend,
        sessions: SessionManager::default(),
        pages_root: PathBuf::from(pages_root),
    };
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting foxhub gate on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the full route table over the given state.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .route(LOGIN_PAGE, get(login_page))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/api/user", get(current_user))
        .route("/api/db-status", get(db_status));
    for &(route, file) in PROTECTED_PAGES {
        app = app.route(
            route,
            get(move |State(state): State<AppState>, headers: HeaderMap| async move {
                protected_page(&state, &headers, file).await
            }),
        );
    }
    app.with_state(state)
}

/// Outcome of evaluating the gate for one request.
#[derive(Debug)]
pub enum GateOutcome {
    /// Active, unexpired session; the principal flows to the handler.
    Pass(Principal),
    /// No session (or an expired one); navigate to the login entry point.
    LoginRedirect,
}

/// The request-level guard: cookie -> token -> session registry.
pub fn evaluate_gate(sessions: &SessionManager, headers: &HeaderMap) -> GateOutcome {
    match parse_cookie(headers, SESSION_COOKIE).and_then(|t| sessions.validate(&t)) {
        Some(principal) => GateOutcome::Pass(principal),
        None => GateOutcome::LoginRedirect,
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // HttpOnly keeps the token away from page scripts; Max-Age matches the
    // 24h session horizon.
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE, token, SESSION_MAX_AGE_SECS
    )).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/",
        SESSION_COOKIE
    )).unwrap()
}

fn status_of(err: &AppError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Debug, Deserialize)]
struct LoginPayload { username: String, password: String }

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    match state.backend.verify(&payload.username, &payload.password) {
        Ok(record) => {
            let session = state.sessions.issue(Principal::from(record));
            info!(user = %session.principal.username, "login ok");
            let mut headers = HeaderMap::new();
            headers.insert(header::SET_COOKIE, set_session_cookie(&session.token));
            (StatusCode::OK, headers, Json(json!({"success": true, "message": "Login successful"})))
        }
        Err(VerifyError::Rejected) => {
            let err = AppError::auth("invalid_credentials", "Invalid username or password");
            (status_of(&err), HeaderMap::new(), Json(json!({"success": false, "message": err.message()})))
        }
        Err(VerifyError::Unavailable(cause)) => {
            // Cause goes to the operator log only; the response stays generic.
            error!("login failed, credential store unavailable: {cause:#}");
            let err = AppError::store_unavailable("store_unavailable", "Server error");
            (status_of(&err), HeaderMap::new(), Json(json!({"success": false, "message": err.message()})))
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = parse_cookie(&headers, SESSION_COOKIE) {
        state.sessions.logout(&token);
    }
    // The client-side cookie is invalidated regardless of whether a live
    // session was found for it.
    let mut h = HeaderMap::new();
    h.insert(header::SET_COOKIE, clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"success": true, "message": "Logout successful"})))
}

async fn current_user(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match evaluate_gate(&state.sessions, &headers) {
        GateOutcome::Pass(p) => Json(json!({"username": p.username, "role": p.role})).into_response(),
        GateOutcome::LoginRedirect => {
            let err = AppError::not_authenticated("no_session", "login required");
            debug!("{err}");
            Redirect::to(LOGIN_PAGE).into_response()
        }
    }
}

async fn db_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.backend.probe())
}

async fn root(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    match evaluate_gate(&state.sessions, &headers) {
        GateOutcome::Pass(_) => Redirect::to(LANDING_PAGE),
        GateOutcome::LoginRedirect => Redirect::to(LOGIN_PAGE),
    }
}

async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match evaluate_gate(&state.sessions, &headers) {
        GateOutcome::Pass(_) => Redirect::to(LANDING_PAGE).into_response(),
        GateOutcome::LoginRedirect => serve_page(&state.pages_root, "login.html").await,
    }
}

async fn protected_page(state: &AppState, headers: &HeaderMap, file: &'static str) -> Response {
    match evaluate_gate(&state.sessions, headers) {
        GateOutcome::Pass(_) => serve_page(&state.pages_root, file).await,
        GateOutcome::LoginRedirect => Redirect::to(LOGIN_PAGE).into_response(),
    }
}

async fn serve_page(root: &Path, file: &str) -> Response {
    match tokio::fs::read(root.join(file)).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            bytes,
        ).into_response(),
        Err(e) => {
            debug!("page '{}' not served: {}", file, e);
            (StatusCode::NOT_FOUND, "page not found").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parse_cookie_picks_named_value() {
        let headers = headers_with_cookie("other=1; foxhub_session=abc123; theme=dark");
        assert_eq!(parse_cookie(&headers, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(parse_cookie(&headers, "theme").as_deref(), Some("dark"));
        assert!(parse_cookie(&HeaderMap::new(), SESSION_COOKIE).is_none());
    }

    #[test]
    fn session_cookie_resists_scripts_and_expires() {
        let v = set_session_cookie("tok");
        let s = v.to_str().unwrap();
        assert!(s.starts_with("foxhub_session=tok"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("Max-Age=86400"));
        let cleared = clear_session_cookie().to_str().unwrap().to_string();
        assert!(cleared.contains("Expires=Thu, 01 Jan 1970"));
    }

    #[test]
    fn gate_without_cookie_redirects() {
        let sessions = SessionManager::default();
        assert!(matches!(evaluate_gate(&sessions, &HeaderMap::new()), GateOutcome::LoginRedirect));
    }

    #[test]
    fn gate_with_stale_token_redirects() {
        let sessions = SessionManager::default();
        let headers = headers_with_cookie("foxhub_session=unknown-token");
        assert!(matches!(evaluate_gate(&sessions, &headers), GateOutcome::LoginRedirect));
    }

    #[test]
    fn route_table_covers_all_protected_pages() {
        assert_eq!(PROTECTED_PAGES.len(), 7);
        for (route, file) in PROTECTED_PAGES {
            assert!(route.starts_with('/'));
            assert!(file.ends_with(".html"));
        }
    }
}
