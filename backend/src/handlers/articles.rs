//! Article endpoints: the draft pipeline (create/update), admin listing,
//! public listings, bulk delete and the publish tick.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use newsdesk_shared::{
    now_ms, render_document, ArticleFilter, ArticlePatch, ArticleRecord, CategoryRecord,
    ClassificationResolver, CmsError, CmsResult, Field, NewArticle, ScheduleState, TagRecord,
    UrlKind,
};
use serde::{Deserialize, Serialize};

use crate::auth::require_session;
use crate::draft::ArticleDraft;
use crate::error::{bad_request, error_response, ApiResult};
use crate::scheduler::run_due_transitions;
use crate::state::AppState;
use crate::upload::{process_image, remove_media, ImageKind};

#[derive(Debug, Serialize)]
pub struct ArticlePayload {
    #[serde(flatten)]
    pub article: ArticleRecord,
    /// Derived schedule state, for the admin UI.
    pub state: &'static str,
    pub url: Option<String>,
    pub category: Option<CategoryRecord>,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Serialize)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticlePayload>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub title: Option<String>,
    pub created_from: Option<i64>,
    pub created_to: Option<i64>,
    pub status: Option<ScheduleState>,
    #[serde(default)]
    pub include_hidden: bool,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct DeleteArticlesBody {
    pub ids: Vec<String>,
}

pub async fn create_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ArticlePayload>)> {
    require_session(&state.sessions, &headers)?;
    let draft = ArticleDraft::from_multipart(multipart).await.map_err(error_response)?;

    let title = draft
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| bad_request("title is required"))?
        .to_string();
    let content = draft
        .content
        .clone()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| bad_request("content is required"))?;
    let html_content = render_document(&content).map_err(error_response)?;

    let resolver = ClassificationResolver::new(&state.taxonomy, state.urls.as_ref());
    let tags = resolver
        .resolve_tags(draft.tags.as_deref().unwrap_or_default())
        .await
        .map_err(error_response)?;
    let category_id = match resolver
        .resolve_category(draft.categories.as_deref().unwrap_or_default())
        .await
        .map_err(error_response)?
    {
        Some(category) => category.id,
        None => state.uncategorized_id.clone(),
    };

    let home_image_path = match draft.home_image {
        Some(part) => Some(
            process_image(part.bytes, &part.filename, &state.config.media_dir, ImageKind::Home)
                .await
                .map_err(error_response)?,
        ),
        None => None,
    };
    let content_image_path = match draft.content_image {
        Some(part) => Some(
            process_image(part.bytes, &part.filename, &state.config.media_dir, ImageKind::Content)
                .await
                .map_err(error_response)?,
        ),
        None => None,
    };

    let manual_url = set_value(&draft.manual_url);
    let created = state
        .articles
        .create(NewArticle {
            title,
            content,
            html_content,
            category_id: Some(category_id.clone()),
            tag_ids: tags.iter().map(|t| t.id.clone()).collect(),
            head_title: set_value(&draft.head_title),
            head_keyword: set_value(&draft.head_keyword),
            head_description: set_value(&draft.head_description),
            manual_url: manual_url.clone(),
            alt_text: set_value(&draft.alt_text),
            hidden: draft.hidden.unwrap_or(false),
            scheduled_at: set_value(&draft.scheduled_at),
            draft: false,
            top_sorting: set_value(&draft.top_sorting),
            recommend_sorting: set_value(&draft.recommend_sorting),
            home_image_path,
            content_image_path,
        })
        .await
        .map_err(error_response)?;

    state
        .urls
        .create_url(
            &created.id,
            UrlKind::Article,
            Some((category_id.as_str(), UrlKind::Category)),
            manual_url.as_deref(),
        )
        .await
        .map_err(error_response)?;

    let payload = enrich(&state, created).await.map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(payload)))
}

pub async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ArticleListQuery>,
) -> ApiResult<Json<ArticleListResponse>> {
    let filter = ArticleFilter {
        category_id: query.category.clone(),
        tag_id: query.tag.clone(),
        title: query.title.clone(),
        created_from: query.created_from,
        created_to: query.created_to,
        status: query.status,
        include_hidden: query.include_hidden,
        page: query.page,
        per_page: query.per_page,
    };
    let (records, total) = state.articles.list(&filter).await.map_err(error_response)?;
    let articles = enrich_all(&state, records).await.map_err(error_response)?;
    Ok(Json(ArticleListResponse { articles, total, page: query.page, per_page: query.per_page }))
}

pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ArticlePayload>> {
    let record = state.articles.get(&id).await.map_err(error_response)?;
    let payload = enrich(&state, record).await.map_err(error_response)?;
    Ok(Json(payload))
}

pub async fn update_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<ArticlePayload>> {
    require_session(&state.sessions, &headers)?;
    let draft = ArticleDraft::from_multipart(multipart).await.map_err(error_response)?;
    let existing = state.articles.get(&id).await.map_err(error_response)?;

    let mut patch = ArticlePatch {
        title: draft.title.clone(),
        head_title: draft.head_title.clone(),
        head_keyword: draft.head_keyword.clone(),
        head_description: draft.head_description.clone(),
        alt_text: draft.alt_text.clone(),
        hidden: draft.hidden,
        scheduled_at: draft.scheduled_at.clone(),
        top_sorting: draft.top_sorting.clone(),
        recommend_sorting: draft.recommend_sorting.clone(),
        ..ArticlePatch::default()
    };

    if let Some(content) = draft.content.clone() {
        patch.html_content = Some(render_document(&content).map_err(error_response)?);
        patch.content = Some(content);
    }

    let resolver = ClassificationResolver::new(&state.taxonomy, state.urls.as_ref());
    if let Some(labels) = &draft.tags {
        let tags = resolver.resolve_tags(labels).await.map_err(error_response)?;
        patch.tag_ids = Some(tags.into_iter().map(|t| t.id).collect());
    }
    if let Some(labels) = &draft.categories {
        let category_id = match resolver.resolve_category(labels).await.map_err(error_response)? {
            Some(category) => category.id,
            None => state.uncategorized_id.clone(),
        };
        if existing.category_id.as_deref() != Some(category_id.as_str()) {
            state
                .urls
                .reparent_url(&id, UrlKind::Article, &category_id, UrlKind::Category)
                .await
                .map_err(error_response)?;
        }
        patch.category_id = Field::Set(category_id);
    }

    match &draft.manual_url {
        Field::Keep => {},
        Field::Set(slug) => {
            state
                .urls
                .rename_url(&id, UrlKind::Article, slug)
                .await
                .map_err(error_response)?;
            patch.manual_url = Field::Set(slug.clone());
        },
        // Dropping the manual slug falls back to the id segment.
        Field::Clear => {
            state
                .urls
                .rename_url(&id, UrlKind::Article, &id)
                .await
                .map_err(error_response)?;
            patch.manual_url = Field::Clear;
        },
    }

    if let Some(part) = draft.home_image {
        let stored =
            process_image(part.bytes, &part.filename, &state.config.media_dir, ImageKind::Home)
                .await
                .map_err(error_response)?;
        if let Some(old) = &existing.home_image_path {
            remove_media(&state.config.media_dir, old).await;
        }
        patch.home_image_path = Field::Set(stored);
    }
    if let Some(part) = draft.content_image {
        let stored =
            process_image(part.bytes, &part.filename, &state.config.media_dir, ImageKind::Content)
                .await
                .map_err(error_response)?;
        if let Some(old) = &existing.content_image_path {
            remove_media(&state.config.media_dir, old).await;
        }
        patch.content_image_path = Field::Set(stored);
    }

    let updated = state.articles.update(&id, patch).await.map_err(error_response)?;
    let payload = enrich(&state, updated).await.map_err(error_response)?;
    Ok(Json(payload))
}

pub async fn delete_articles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DeleteArticlesBody>,
) -> ApiResult<Json<serde_json::Value>> {
    require_session(&state.sessions, &headers)?;
    if body.ids.is_empty() {
        return Err(bad_request("no ids given"));
    }

    // Burn the URL records first and reconcile the count; a shortfall
    // aborts the whole batch while the articles are still intact.
    for id in &body.ids {
        state.articles.get(id).await.map_err(error_response)?;
    }
    let removed = state
        .urls
        .delete_urls(&body.ids, UrlKind::Article)
        .await
        .map_err(error_response)?;
    if removed != body.ids.len() {
        return Err(error_response(CmsError::PartialDelete {
            expected: body.ids.len(),
            removed,
        }));
    }

    let records = state.articles.delete_many(&body.ids).await.map_err(error_response)?;
    for record in &records {
        if let Some(path) = &record.home_image_path {
            remove_media(&state.config.media_dir, path).await;
        }
        if let Some(path) = &record.content_image_path {
            remove_media(&state.config.media_dir, path).await;
        }
    }
    Ok(Json(serde_json::json!({ "deleted": records.len() })))
}

pub async fn page_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let count = state.articles.increment_page_view(&id).await.map_err(error_response)?;
    Ok(Json(serde_json::json!({ "pageView": count })))
}

pub async fn related_articles(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ArticlePayload>>> {
    let records = state.articles.related(&id, 6).await.map_err(error_response)?;
    let payloads = enrich_all(&state, records).await.map_err(error_response)?;
    Ok(Json(payloads))
}

pub async fn pinned_articles(State(state): State<AppState>) -> ApiResult<Json<Vec<ArticlePayload>>> {
    let records = state.articles.list_pinned().await.map_err(error_response)?;
    Ok(Json(enrich_all(&state, records).await.map_err(error_response)?))
}

pub async fn recommended_articles(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ArticlePayload>>> {
    let records = state.articles.list_recommended().await.map_err(error_response)?;
    Ok(Json(enrich_all(&state, records).await.map_err(error_response)?))
}

pub async fn popular_articles(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ArticlePayload>>> {
    let records = state.articles.list_popular(10).await.map_err(error_response)?;
    Ok(Json(enrich_all(&state, records).await.map_err(error_response)?))
}

/// Manual trigger for the publish tick; idempotent, so it can be hit any
/// time, not only by the timer.
pub async fn publish_due(State(state): State<AppState>) -> Json<serde_json::Value> {
    let updated = run_due_transitions(&state.articles, now_ms()).await;
    Json(serde_json::json!({ "updated": updated }))
}

async fn enrich(state: &AppState, record: ArticleRecord) -> CmsResult<ArticlePayload> {
    let url = state
        .urls
        .find(&record.id, UrlKind::Article)
        .await?
        .map(|r| r.url);
    let category = match &record.category_id {
        Some(id) => state.taxonomy.find_category(id).await?,
        None => None,
    };
    let mut tags = Vec::with_capacity(record.tag_ids.len());
    for tag_id in &record.tag_ids {
        match state.taxonomy.get_tag(tag_id).await {
            Ok(tag) => tags.push(tag),
            // A stale tag reference should not break the whole payload.
            Err(CmsError::NotFound(_)) => {
                tracing::warn!(article = %record.id, tag = %tag_id, "dangling tag reference");
            },
            Err(err) => return Err(err),
        }
    }
    Ok(ArticlePayload {
        state: ScheduleState::derive(record.hidden, record.scheduled_at).as_str(),
        url,
        category,
        tags,
        article: record,
    })
}

async fn enrich_all(
    state: &AppState,
    records: Vec<ArticleRecord>,
) -> CmsResult<Vec<ArticlePayload>> {
    let mut payloads = Vec::with_capacity(records.len());
    for record in records {
        payloads.push(enrich(state, record).await?);
    }
    Ok(payloads)
}

fn set_value<T: Clone>(field: &Field<T>) -> Option<T> {
    match field {
        Field::Set(v) => Some(v.clone()),
        Field::Keep | Field::Clear => None,
    }
}
