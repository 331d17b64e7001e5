use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::request_context::request_context_middleware;
use crate::state::AppState;
use crate::handlers::{articles, categories, media, sitemap, tags, users};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/articles",
            post(articles::create_article)
                .get(articles::list_articles)
                .delete(articles::delete_articles),
        )
        .route("/api/articles/pinned", get(articles::pinned_articles))
        .route("/api/articles/recommended", get(articles::recommended_articles))
        .route("/api/articles/popular", get(articles::popular_articles))
        .route("/api/articles/publish-due", patch(articles::publish_due))
        .route(
            "/api/articles/:id",
            get(articles::get_article).patch(articles::update_article),
        )
        .route("/api/articles/:id/related", get(articles::related_articles))
        .route("/api/articles/:id/page-view", patch(articles::page_view))
        .route(
            "/api/categories",
            post(categories::create_category)
                .get(categories::list_categories)
                .delete(categories::delete_categories),
        )
        .route("/api/categories/menu", get(categories::category_menu))
        .route("/api/categories/:id", patch(categories::update_category))
        .route("/api/categories/:id/children", get(categories::category_children))
        .route("/api/categories/:id/articles", get(categories::category_articles))
        .route("/api/category/:name", get(categories::get_category_by_name))
        .route("/api/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/api/login", post(users::login))
        .route("/api/logout", post(users::logout))
        .route("/api/register", post(users::register))
        .route("/api/users", get(users::list_users))
        .route(
            "/api/users/:id",
            patch(users::update_user).delete(users::delete_user),
        )
        .route("/api/check-url/:url", get(sitemap::check_url))
        .route("/sitemap.xml", get(sitemap::sitemap_xml))
        .route("/robots.txt", get(sitemap::robots_txt))
        .route("/media/:filename", get(media::serve_media))
        .with_state(state)
        .layer(middleware::from_fn(request_context_middleware))
        .layer(cors)
}
