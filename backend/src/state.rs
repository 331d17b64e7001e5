use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use newsdesk_shared::{
    open_database, ArticleStore, NewCategory, TaxonomyStore, UrlKind, UrlRegistry, UserStore,
};

use crate::auth::Sessions;
use crate::config::AppConfig;

pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub articles: ArticleStore,
    pub taxonomy: TaxonomyStore,
    pub users: UserStore,
    pub urls: Arc<UrlRegistry>,
    pub sessions: Sessions,
    /// Fallback category for articles submitted without one.
    pub uncategorized_id: String,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = open_database(&config.db_path)
            .with_context(|| format!("opening database at {}", config.db_path))?;
        let articles = ArticleStore::new(db.clone());
        let taxonomy = TaxonomyStore::new(db.clone());
        let users = UserStore::new(db.clone());
        let urls = Arc::new(UrlRegistry::new(db, config.public_domain.clone()));

        let uncategorized_id = ensure_uncategorized(&taxonomy, &urls).await?;

        tokio::fs::create_dir_all(&config.media_dir)
            .await
            .with_context(|| format!("creating media dir {}", config.media_dir.display()))?;

        Ok(Self {
            config: Arc::new(config),
            articles,
            taxonomy,
            users,
            urls,
            sessions: Arc::new(DashMap::new()),
            uncategorized_id,
        })
    }
}

/// The sentinel category must exist before the first article lands, and it
/// needs a URL record of its own so articles can nest under it.
async fn ensure_uncategorized(taxonomy: &TaxonomyStore, urls: &UrlRegistry) -> Result<String> {
    if let Some(existing) = taxonomy.find_category_by_name(UNCATEGORIZED).await? {
        return Ok(existing.id);
    }
    let created = taxonomy
        .create_category(NewCategory {
            name: UNCATEGORIZED.to_string(),
            manual_url: Some(UNCATEGORIZED.to_string()),
            ..Default::default()
        })
        .await
        .context("creating the uncategorized category")?;
    urls.create_url(&created.id, UrlKind::Category, None, Some(UNCATEGORIZED))
        .await
        .context("registering the uncategorized category url")?;
    tracing::info!(id = %created.id, "created the uncategorized category");
    Ok(created.id)
}
