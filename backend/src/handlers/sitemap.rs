//! Sitemap feed, robots.txt and reverse URL lookup.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use newsdesk_shared::document::escape_text;
use newsdesk_shared::UrlKind;

use crate::error::{bad_request, error_response, ApiResult};
use crate::state::AppState;

pub async fn sitemap_xml(State(state): State<AppState>) -> Response {
    let records = match state.urls.list_all().await {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!("sitemap: failed to enumerate url records: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to generate sitemap")
                .into_response();
        },
    };

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
"#,
    );

    // Homepage first.
    xml.push_str(&format!(
        "  <url>\n    <loc>{}</loc>\n    <changefreq>daily</changefreq>\n    \
         <priority>1.0</priority>\n  </url>\n",
        escape_text(state.urls.domain())
    ));
    for record in records {
        xml.push_str(&format!(
            "  <url>\n    <loc>{}</loc>\n    <changefreq>{}</changefreq>\n    \
             <priority>{:.1}</priority>\n  </url>\n",
            escape_text(&record.url),
            escape_text(&record.changefreq),
            record.priority
        ));
    }
    xml.push_str("</urlset>\n");

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        xml,
    )
        .into_response()
}

pub async fn robots_txt(State(state): State<AppState>) -> Response {
    let body = format!(
        "User-agent: *\nAllow: /\n\nSitemap: {}sitemap.xml\n",
        state.urls.domain()
    );
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// Resolve a public URL (percent-encoded as one path segment) back to the
/// entity it belongs to.
pub async fn check_url(
    State(state): State<AppState>,
    Path(encoded): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let url = urlencoding::decode(&encoded)
        .map_err(|_| bad_request("url is not valid percent-encoding"))?
        .into_owned();
    let record = state.urls.lookup_by_url(&url).await.map_err(error_response)?;

    let payload = match record.kind {
        UrlKind::Article => {
            let article = state.articles.get(&record.original_id).await.map_err(error_response)?;
            serde_json::json!({ "type": "article", "data": article })
        },
        UrlKind::Category => {
            let category = state
                .taxonomy
                .get_category(&record.original_id)
                .await
                .map_err(error_response)?;
            serde_json::json!({ "type": "category", "data": category })
        },
        UrlKind::Tag => {
            let tag = state.taxonomy.get_tag(&record.original_id).await.map_err(error_response)?;
            serde_json::json!({ "type": "tag", "data": tag })
        },
    };
    Ok(Json(payload))
}
