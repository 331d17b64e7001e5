//! Core library for the newsdesk CMS: persistence stores, the rich-text
//! serializer, the publish schedule rules, and the canonical-URL registry.
//! The HTTP layer lives in the backend crate and only composes what is
//! exported here.

pub mod article_store;
pub mod classification;
pub mod db;
pub mod document;
pub mod error;
pub mod schedule;
pub mod taxonomy_store;
pub mod url_registry;
pub mod user_store;

pub use article_store::{ArticleFilter, ArticlePatch, ArticleRecord, ArticleStore, Field, NewArticle};
pub use classification::{ClassificationLabel, ClassificationResolver};
pub use db::{now_ms, open_database, open_in_memory, Db};
pub use document::render_document;
pub use error::{CmsError, CmsResult};
pub use schedule::{is_due_for_publish, ScheduleState, PUBLISH_LOOKBACK_MS};
pub use taxonomy_store::{CategoryPatch, CategoryRecord, NewCategory, TagRecord, TaxonomyStore};
pub use url_registry::{UrlKind, UrlRecord, UrlRegistry};
pub use user_store::{UserRecord, UserStore};
