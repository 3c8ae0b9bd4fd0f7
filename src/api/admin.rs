#![forbid(unsafe_code)]

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

use super::{AppState, Success, json_body, success};
use crate::admin::{AdminSession, token_from_headers};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{AdminInfo, Game, TableCount};

#[derive(Deserialize)]
pub(super) struct LoginRequest {
    #[serde(default)]
    password: String,
}

pub(super) async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ServiceResult<Json<Success<AdminSession>>> {
    let request = json_body(payload)?;
    if !state.admin.is_enabled() {
        return Err(ServiceError::ServiceUnavailable(
            "ADMIN_PASSWORD is not configured".into(),
        ));
    }
    state
        .admin
        .login(&request.password)
        .map(success)
        .ok_or_else(|| ServiceError::Unauthorized("wrong password".into()))
}

#[derive(Serialize)]
pub(super) struct LogoutResponse {
    logged_out: bool,
}

pub(super) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Success<LogoutResponse>> {
    let logged_out = token_from_headers(&headers)
        .map(|token| state.admin.logout(token))
        .unwrap_or(false);
    success(LogoutResponse { logged_out })
}

#[derive(Serialize)]
pub(super) struct SessionStatus {
    enabled: bool,
    authenticated: bool,
}

pub(super) async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<SessionStatus> {
    let authenticated = token_from_headers(&headers)
        .map(|token| state.admin.verify(token))
        .unwrap_or(false);
    Json(SessionStatus {
        enabled: state.admin.is_enabled(),
        authenticated,
    })
}

#[derive(Serialize)]
pub(super) struct Dashboard {
    admin_info: Option<AdminInfo>,
    games: Vec<Game>,
    tables: Vec<TableCount>,
}

pub(super) async fn dashboard(State(state): State<AppState>) -> ServiceResult<Json<Dashboard>> {
    let store = state.store()?;
    Ok(Json(Dashboard {
        admin_info: store.admin_info().await?,
        games: store.list_games().await?,
        tables: store.table_counts().await?,
    }))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};

    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::admin::ADMIN_TOKEN_HEADER;
    use crate::api::test_support::*;
    use crate::testing::{FakeGenerator, FakePlatform};

    fn with_token(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(ADMIN_TOKEN_HEADER, token)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn dashboard_requires_a_live_session() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;

        let (status, body) = send_json(&h.state, get("/admin/dashboard")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "admin session missing or expired");

        let (status, body) = send_json(
            &h.state,
            post_json("/admin/login", json!({ "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "wrong password");

        let (status, body) = send_json(
            &h.state,
            post_json("/admin/login", json!({ "password": "letmein" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(body["expires_in_secs"], 3600);

        let (status, body) =
            send_json(&h.state, with_token("GET", "/admin/dashboard", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tables"].as_array().unwrap().len(), 12);
        assert!(body["admin_info"].is_null());

        let (_, body) = send_json(&h.state, with_token("GET", "/admin/session", &token)).await;
        assert_eq!(body["authenticated"], true);

        let (_, body) = send_json(&h.state, with_token("POST", "/admin/logout", &token)).await;
        assert_eq!(body["logged_out"], true);
        let (status, _) =
            send_json(&h.state, with_token("GET", "/admin/dashboard", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn gate_without_password_is_unavailable() {
        let mut state = bare_state();
        state.admin = std::sync::Arc::new(crate::admin::AdminGate::new(None));
        let (status, _) = send_json(
            &state,
            post_json("/admin/login", json!({ "password": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, body) = send_json(&state, get("/admin/dashboard")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "ServiceUnavailable");
    }

    #[tokio::test]
    async fn mutation_endpoints_do_not_check_the_admin_token() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;
        let (status, _) = send_json(
            &h.state,
            post_json("/generate-article", json!({ "video_id": "missing0000" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
