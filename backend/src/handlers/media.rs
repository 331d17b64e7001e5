//! Serves uploaded images out of the media directory.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn serve_media(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    // Filenames are flat; anything that looks like a path is rejected.
    if filename.contains('/') || filename.contains("..") || filename.contains('\\') {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.config.media_dir.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("png") => "image/png",
                Some("jpg") | Some("jpeg") => "image/jpeg",
                _ => "application/octet-stream",
            };
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
        },
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
