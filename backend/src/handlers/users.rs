use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use newsdesk_shared::UserRecord;
use serde::{Deserialize, Serialize};

use crate::auth::{issue, require_session, revoke};
use crate::error::{error_response, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    /// Username or email address.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserRecord,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserBody {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state
        .users
        .verify_login(&body.username, &body.password)
        .await
        .map_err(error_response)?;
    let token = issue(&state.sessions, &user.id);
    tracing::info!(user = %user.username, "logged in");
    Ok(Json(LoginResponse { token, user }))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    revoke(&state.sessions, &headers);
    StatusCode::OK
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<(StatusCode, Json<UserRecord>)> {
    let user = state
        .users
        .register(&body.username, &body.email, &body.password)
        .await
        .map_err(error_response)?;
    tracing::info!(user = %user.username, "registered");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<UserRecord>>> {
    require_session(&state.sessions, &headers)?;
    let users = state.users.list().await.map_err(error_response)?;
    Ok(Json(users))
}

pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserBody>,
) -> ApiResult<Json<UserRecord>> {
    require_session(&state.sessions, &headers)?;
    let user = state
        .users
        .update(&id, body.username.as_deref(), body.email.as_deref(), body.password.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require_session(&state.sessions, &headers)?;
    state.users.delete(&id).await.map_err(error_response)?;
    // Any sessions the deleted account held stop working immediately.
    state.sessions.retain(|_, user_id| *user_id != id);
    Ok(StatusCode::NO_CONTENT)
}
