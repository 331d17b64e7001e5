//! Category endpoints. Categories form a tree; their URLs nest under the
//! parent's path, and structural edits (rename, reparent, delete) cascade
//! into the URL registry.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use newsdesk_shared::{
    CategoryPatch, CategoryRecord, CmsError, CmsResult, Field, NewCategory, UrlKind,
};
use serde::{Deserialize, Serialize};

use crate::auth::require_session;
use crate::error::{bad_request, error_response, ApiResult};
use crate::handlers::articles::{ArticleListQuery, ArticleListResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryPayload {
    #[serde(flatten)]
    pub category: CategoryRecord,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MenuEntry {
    #[serde(flatten)]
    pub category: CategoryRecord,
    pub children: Vec<CategoryRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryBody {
    pub name: String,
    pub upper_category: Option<String>,
    pub head_title: Option<String>,
    pub head_keyword: Option<String>,
    pub head_description: Option<String>,
    pub manual_url: Option<String>,
}

/// PATCH body. Double options keep "absent" apart from an explicit null.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryBody {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub upper_category: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub head_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub head_keyword: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub head_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub manual_url: Option<Option<String>>,
}

fn deserialize_nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::<String>::deserialize(deserializer)?))
}

#[derive(Debug, Deserialize)]
pub struct DeleteCategoriesBody {
    pub ids: Vec<String>,
}

pub async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateCategoryBody>,
) -> ApiResult<(StatusCode, Json<CategoryPayload>)> {
    require_session(&state.sessions, &headers)?;
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(bad_request("category name is required"));
    }

    // A prospective parent must exist and must not hold articles itself.
    if let Some(upper) = &body.upper_category {
        state.taxonomy.is_upper_candidate(upper).await.map_err(error_response)?;
    }

    let created = state
        .taxonomy
        .create_category(NewCategory {
            name,
            upper_category: body.upper_category.clone(),
            head_title: body.head_title,
            head_keyword: body.head_keyword,
            head_description: body.head_description,
            manual_url: body.manual_url.clone(),
        })
        .await
        .map_err(error_response)?;

    let parent = body.upper_category.as_deref().map(|id| (id, UrlKind::Category));
    let record = state
        .urls
        .create_url(&created.id, UrlKind::Category, parent, body.manual_url.as_deref())
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(CategoryPayload { category: created, url: Some(record.url) }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CategoryListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    10
}

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryPayload>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryListQuery>,
) -> ApiResult<Json<CategoryListResponse>> {
    let (categories, total) = state
        .taxonomy
        .list_categories(query.page, query.per_page)
        .await
        .map_err(error_response)?;
    let payloads = with_urls(&state, categories).await.map_err(error_response)?;
    Ok(Json(CategoryListResponse {
        categories: payloads,
        total,
        page: query.page,
        per_page: query.per_page,
    }))
}

/// Roots with their direct children, for the site navigation.
pub async fn category_menu(State(state): State<AppState>) -> ApiResult<Json<Vec<MenuEntry>>> {
    let mut grouped = state.taxonomy.upper_category_map().await.map_err(error_response)?;
    let roots = grouped.remove(&None).unwrap_or_default();
    let menu = roots
        .into_iter()
        .map(|category| {
            let children = grouped.remove(&Some(category.id.clone())).unwrap_or_default();
            MenuEntry { category, children }
        })
        .collect();
    Ok(Json(menu))
}

pub async fn category_children(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<CategoryPayload>>> {
    state.taxonomy.get_category(&id).await.map_err(error_response)?;
    let children = state.taxonomy.children_of(&id).await.map_err(error_response)?;
    let payloads = with_urls(&state, children).await.map_err(error_response)?;
    Ok(Json(payloads))
}

pub async fn get_category_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<CategoryPayload>> {
    let category = state
        .taxonomy
        .find_category_by_name(&name)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(CmsError::NotFound(format!("category: {name}"))))?;
    let url = state
        .urls
        .find(&category.id, UrlKind::Category)
        .await
        .map_err(error_response)?
        .map(|r| r.url);
    Ok(Json(CategoryPayload { category, url }))
}

/// Visible articles filed under a category, paged.
pub async fn category_articles(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ArticleListQuery>,
) -> ApiResult<Json<ArticleListResponse>> {
    state.taxonomy.get_category(&id).await.map_err(error_response)?;
    let query = ArticleListQuery { category: Some(id), include_hidden: false, ..query };
    super::articles::list_articles(State(state), Query(query)).await
}

pub async fn update_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateCategoryBody>,
) -> ApiResult<Json<CategoryPayload>> {
    require_session(&state.sessions, &headers)?;
    let existing = state.taxonomy.get_category(&id).await.map_err(error_response)?;

    let mut patch = CategoryPatch { name: body.name.clone(), ..CategoryPatch::default() };
    patch.head_title = to_field(body.head_title);
    patch.head_keyword = to_field(body.head_keyword);
    patch.head_description = to_field(body.head_description);

    match body.upper_category {
        None => {},
        Some(Some(upper_id)) => {
            if upper_id == id {
                return Err(bad_request("a category cannot be its own parent"));
            }
            state.taxonomy.is_upper_candidate(&upper_id).await.map_err(error_response)?;
            if existing.upper_category.as_deref() != Some(upper_id.as_str()) {
                state
                    .urls
                    .reparent_url(&id, UrlKind::Category, &upper_id, UrlKind::Category)
                    .await
                    .map_err(error_response)?;
            }
            patch.upper_category = Field::Set(upper_id);
        },
        Some(None) => {
            if existing.upper_category.is_some() {
                state
                    .urls
                    .reparent_to_root(&id, UrlKind::Category)
                    .await
                    .map_err(error_response)?;
            }
            patch.upper_category = Field::Clear;
        },
    }

    match body.manual_url {
        None => {},
        Some(Some(slug)) => {
            state
                .urls
                .rename_url(&id, UrlKind::Category, &slug)
                .await
                .map_err(error_response)?;
            patch.manual_url = Field::Set(slug);
        },
        Some(None) => {
            state
                .urls
                .rename_url(&id, UrlKind::Category, &id)
                .await
                .map_err(error_response)?;
            patch.manual_url = Field::Clear;
        },
    }

    let updated = state.taxonomy.update_category(&id, patch).await.map_err(error_response)?;
    let url = state
        .urls
        .find(&id, UrlKind::Category)
        .await
        .map_err(error_response)?
        .map(|r| r.url);
    Ok(Json(CategoryPayload { category: updated, url }))
}

pub async fn delete_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DeleteCategoriesBody>,
) -> ApiResult<Json<serde_json::Value>> {
    require_session(&state.sessions, &headers)?;
    if body.ids.is_empty() {
        return Err(bad_request("no ids given"));
    }
    if body.ids.iter().any(|id| *id == state.uncategorized_id) {
        return Err(bad_request("the uncategorized category cannot be deleted"));
    }

    // Collect each category's URL segment before the records go away, so
    // descendant URLs can collapse up one level.
    let mut slugs = Vec::new();
    for id in &body.ids {
        state.taxonomy.get_category(id).await.map_err(error_response)?;
        if let Some(record) = state
            .urls
            .find(id, UrlKind::Category)
            .await
            .map_err(error_response)?
        {
            let segment = record.url.rsplit('/').next().unwrap_or_default();
            slugs.push(segment.strip_suffix(".html").unwrap_or(segment).to_string());
        }
    }
    for slug in &slugs {
        state
            .urls
            .bulk_reparent_on_category_delete(slug)
            .await
            .map_err(error_response)?;
    }

    let removed = state
        .urls
        .delete_urls(&body.ids, UrlKind::Category)
        .await
        .map_err(error_response)?;
    if removed != body.ids.len() {
        return Err(error_response(CmsError::PartialDelete {
            expected: body.ids.len(),
            removed,
        }));
    }

    let deleted = state.taxonomy.delete_categories(&body.ids).await.map_err(error_response)?;
    Ok(Json(serde_json::json!({ "deleted": deleted.len() })))
}

async fn with_urls(
    state: &AppState,
    categories: Vec<CategoryRecord>,
) -> CmsResult<Vec<CategoryPayload>> {
    let mut payloads = Vec::with_capacity(categories.len());
    for category in categories {
        let url = state.urls.find(&category.id, UrlKind::Category).await?.map(|r| r.url);
        payloads.push(CategoryPayload { category, url });
    }
    Ok(payloads)
}

fn to_field(value: Option<Option<String>>) -> Field<String> {
    match value {
        None => Field::Keep,
        Some(None) => Field::Clear,
        Some(Some(v)) => Field::Set(v),
    }
}
