use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use newsdesk_shared::{TagRecord, UrlKind};
use serde::{Deserialize, Serialize};

use crate::auth::require_session;
use crate::error::{bad_request, error_response, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TagPayload {
    #[serde(flatten)]
    pub tag: TagRecord,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagBody {
    pub name: String,
}

pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<TagPayload>>> {
    let tags = state.taxonomy.list_tags().await.map_err(error_response)?;
    let mut payloads = Vec::with_capacity(tags.len());
    for tag in tags {
        let url = state
            .urls
            .find(&tag.id, UrlKind::Tag)
            .await
            .map_err(error_response)?
            .map(|r| r.url);
        payloads.push(TagPayload { tag, url });
    }
    Ok(Json(payloads))
}

pub async fn create_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTagBody>,
) -> ApiResult<(StatusCode, Json<TagPayload>)> {
    require_session(&state.sessions, &headers)?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(bad_request("tag name is required"));
    }

    let tag = state.taxonomy.create_tag(name).await.map_err(error_response)?;
    let record = state
        .urls
        .create_url(&tag.id, UrlKind::Tag, None, Some(&tag.name))
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(TagPayload { tag, url: Some(record.url) })))
}
