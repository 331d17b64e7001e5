//! Article persistence.
//!
//! Articles carry their raw rich-text document alongside the rendered HTML,
//! so the public side never re-renders. Visibility is a single `hidden`
//! flag; together with `scheduled_at` it drives the publish scheduler (see
//! [`crate::schedule`]).

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{new_id, now_ms, Db};
use crate::error::{CmsError, CmsResult};
use crate::schedule::{is_due_for_publish, ScheduleState};

/// Three-state patch field. `Keep` leaves the column alone, `Clear` nulls
/// it, `Set` overwrites it. This keeps "field absent from the request"
/// distinct from "field explicitly cleared".
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Field<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Field<T> {
    fn apply(self, slot: &mut Option<T>) {
        match self {
            Field::Keep => {},
            Field::Clear => *slot = None,
            Field::Set(v) => *slot = Some(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub serial_number: i64,
    pub title: String,
    /// Raw rich-text document, JSON text.
    pub content: String,
    pub html_content: String,
    pub category_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub head_title: Option<String>,
    pub head_keyword: Option<String>,
    pub head_description: Option<String>,
    pub manual_url: Option<String>,
    pub alt_text: Option<String>,
    pub hidden: bool,
    pub scheduled_at: Option<i64>,
    pub draft: bool,
    pub top_sorting: Option<i64>,
    pub recommend_sorting: Option<i64>,
    pub page_view: i64,
    pub home_image_path: Option<String>,
    pub content_image_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub html_content: String,
    pub category_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub head_title: Option<String>,
    pub head_keyword: Option<String>,
    pub head_description: Option<String>,
    pub manual_url: Option<String>,
    pub alt_text: Option<String>,
    pub hidden: bool,
    pub scheduled_at: Option<i64>,
    pub draft: bool,
    pub top_sorting: Option<i64>,
    pub recommend_sorting: Option<i64>,
    pub home_image_path: Option<String>,
    pub content_image_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub html_content: Option<String>,
    pub category_id: Field<String>,
    pub tag_ids: Option<Vec<String>>,
    pub head_title: Field<String>,
    pub head_keyword: Field<String>,
    pub head_description: Field<String>,
    pub manual_url: Field<String>,
    pub alt_text: Field<String>,
    pub hidden: Option<bool>,
    pub scheduled_at: Field<i64>,
    pub draft: Option<bool>,
    pub top_sorting: Field<i64>,
    pub recommend_sorting: Field<i64>,
    pub home_image_path: Field<String>,
    pub content_image_path: Field<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub category_id: Option<String>,
    pub tag_id: Option<String>,
    /// Case-insensitive title substring.
    pub title: Option<String>,
    /// Creation-time range, both bounds inclusive, epoch ms.
    pub created_from: Option<i64>,
    pub created_to: Option<i64>,
    /// Filter on the derived schedule state. Draft and scheduled articles
    /// are hidden, so this only matches together with `include_hidden`.
    pub status: Option<ScheduleState>,
    pub include_hidden: bool,
    /// 1-based. Zero is treated as page 1.
    pub page: u32,
    pub per_page: u32,
}

#[derive(Clone)]
pub struct ArticleStore {
    db: Db,
}

impl ArticleStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewArticle) -> CmsResult<ArticleRecord> {
        let now = now_ms();
        let record = ArticleRecord {
            id: new_id(),
            serial_number: self.next_serial_number().await?,
            title: new.title,
            content: new.content,
            html_content: new.html_content,
            category_id: new.category_id,
            tag_ids: new.tag_ids,
            head_title: new.head_title,
            head_keyword: new.head_keyword,
            head_description: new.head_description,
            manual_url: new.manual_url,
            alt_text: new.alt_text,
            hidden: new.hidden,
            scheduled_at: new.scheduled_at,
            draft: new.draft,
            top_sorting: new.top_sorting,
            recommend_sorting: new.recommend_sorting,
            page_view: 0,
            home_image_path: new.home_image_path,
            content_image_path: new.content_image_path,
            created_at: now,
            updated_at: now,
        };
        self.insert(&record).await?;
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> CmsResult<ArticleRecord> {
        self.find(id)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("article: {id}")))
    }

    pub async fn find(&self, id: &str) -> CmsResult<Option<ArticleRecord>> {
        let conn = self.db.lock().await;
        Ok(conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM articles WHERE id = ?1"),
                params![id],
                row_to_article,
            )
            .optional()?)
    }

    /// Read-modify-write update. The whole row is rewritten, which keeps
    /// the patch logic in one place instead of dynamic SQL.
    pub async fn update(&self, id: &str, patch: ArticlePatch) -> CmsResult<ArticleRecord> {
        let mut record = self.get(id).await?;

        if let Some(v) = patch.title {
            record.title = v;
        }
        if let Some(v) = patch.content {
            record.content = v;
        }
        if let Some(v) = patch.html_content {
            record.html_content = v;
        }
        if let Some(v) = patch.tag_ids {
            record.tag_ids = v;
        }
        if let Some(v) = patch.hidden {
            record.hidden = v;
        }
        if let Some(v) = patch.draft {
            record.draft = v;
        }
        patch.category_id.apply(&mut record.category_id);
        patch.head_title.apply(&mut record.head_title);
        patch.head_keyword.apply(&mut record.head_keyword);
        patch.head_description.apply(&mut record.head_description);
        patch.manual_url.apply(&mut record.manual_url);
        patch.alt_text.apply(&mut record.alt_text);
        patch.scheduled_at.apply(&mut record.scheduled_at);
        patch.top_sorting.apply(&mut record.top_sorting);
        patch.recommend_sorting.apply(&mut record.recommend_sorting);
        patch.home_image_path.apply(&mut record.home_image_path);
        patch.content_image_path.apply(&mut record.content_image_path);
        record.updated_at = now_ms();

        let tag_json = serde_json::to_string(&record.tag_ids)?;
        let conn = self.db.lock().await;
        conn.execute(
            "UPDATE articles SET title = ?1, content = ?2, html_content = ?3, \
             category_id = ?4, tag_ids = ?5, head_title = ?6, head_keyword = ?7, \
             head_description = ?8, manual_url = ?9, alt_text = ?10, hidden = ?11, \
             scheduled_at = ?12, draft = ?13, top_sorting = ?14, recommend_sorting = ?15, \
             home_image_path = ?16, content_image_path = ?17, updated_at = ?18 \
             WHERE id = ?19",
            params![
                record.title,
                record.content,
                record.html_content,
                record.category_id,
                tag_json,
                record.head_title,
                record.head_keyword,
                record.head_description,
                record.manual_url,
                record.alt_text,
                record.hidden as i64,
                record.scheduled_at,
                record.draft as i64,
                record.top_sorting,
                record.recommend_sorting,
                record.home_image_path,
                record.content_image_path,
                record.updated_at,
                record.id,
            ],
        )?;
        Ok(record)
    }

    /// Paginated listing, newest first. Returns the page plus the total
    /// match count so the caller can build page controls.
    pub async fn list(&self, filter: &ArticleFilter) -> CmsResult<(Vec<ArticleRecord>, usize)> {
        let mut conditions = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql + Send>> = Vec::new();

        if !filter.include_hidden {
            conditions.push("hidden = 0".to_string());
        }
        if let Some(cat) = &filter.category_id {
            conditions.push(format!("category_id = ?{}", args.len() + 1));
            args.push(Box::new(cat.clone()));
        }
        if let Some(tag) = &filter.tag_id {
            conditions.push(format!("tag_ids LIKE ?{}", args.len() + 1));
            args.push(Box::new(format!("%\"{tag}\"%")));
        }
        if let Some(title) = &filter.title {
            conditions.push(format!("title LIKE ?{} ESCAPE '\\'", args.len() + 1));
            args.push(Box::new(format!("%{}%", like_escape(title))));
        }
        if let Some(from) = filter.created_from {
            conditions.push(format!("created_at >= ?{}", args.len() + 1));
            args.push(Box::new(from));
        }
        if let Some(to) = filter.created_to {
            conditions.push(format!("created_at <= ?{}", args.len() + 1));
            args.push(Box::new(to));
        }
        match filter.status {
            Some(ScheduleState::Published) => conditions.push("hidden = 0".to_string()),
            Some(ScheduleState::Scheduled) => {
                conditions.push("hidden = 1 AND scheduled_at IS NOT NULL".to_string());
            },
            Some(ScheduleState::Draft) => {
                conditions.push("hidden = 1 AND scheduled_at IS NULL".to_string());
            },
            None => {},
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let per_page = filter.per_page.max(1) as i64;
        let page = filter.page.max(1) as i64;
        let offset = (page - 1) * per_page;

        let conn = self.db.lock().await;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            args.iter().map(|b| b.as_ref() as &dyn rusqlite::ToSql).collect();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM articles {where_clause}"),
            param_refs.as_slice(),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {COLUMNS} FROM articles {where_clause} \
             ORDER BY created_at DESC LIMIT {per_page} OFFSET {offset}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), row_to_article)?;
        let page_rows = rows.collect::<Result<Vec<_>, _>>()?;
        Ok((page_rows, total as usize))
    }

    /// Delete a batch by id. Every id must exist up front; after the
    /// delete the affected count is reconciled against the batch size.
    pub async fn delete_many(&self, ids: &[String]) -> CmsResult<Vec<ArticleRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push(self.get(id).await?);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let removed = {
            let conn = self.db.lock().await;
            let mut stmt =
                conn.prepare(&format!("DELETE FROM articles WHERE id IN ({placeholders})"))?;
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
            stmt.execute(param_refs.as_slice())?
        };
        if removed != ids.len() {
            return Err(CmsError::PartialDelete { expected: ids.len(), removed });
        }
        Ok(records)
    }

    pub async fn increment_page_view(&self, id: &str) -> CmsResult<i64> {
        let conn = self.db.lock().await;
        conn.query_row(
            "UPDATE articles SET page_view = page_view + 1 WHERE id = ?1 RETURNING page_view",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| CmsError::NotFound(format!("article: {id}")))
    }

    pub async fn list_pinned(&self) -> CmsResult<Vec<ArticleRecord>> {
        self.query_visible("top_sorting IS NOT NULL", "top_sorting ASC", None).await
    }

    pub async fn list_recommended(&self) -> CmsResult<Vec<ArticleRecord>> {
        self.query_visible("recommend_sorting IS NOT NULL", "recommend_sorting ASC", None)
            .await
    }

    pub async fn list_popular(&self, limit: usize) -> CmsResult<Vec<ArticleRecord>> {
        self.query_visible("1 = 1", "page_view DESC", Some(limit)).await
    }

    /// Visible articles sharing at least one tag with the given one,
    /// strongest overlap first.
    pub async fn related(&self, id: &str, limit: usize) -> CmsResult<Vec<ArticleRecord>> {
        let origin = self.get(id).await?;
        if origin.tag_ids.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = self.query_visible("1 = 1", "created_at DESC", None).await?;
        let mut scored: Vec<(usize, ArticleRecord)> = candidates
            .into_iter()
            .filter(|a| a.id != origin.id)
            .filter_map(|a| {
                let overlap = a.tag_ids.iter().filter(|t| origin.tag_ids.contains(t)).count();
                (overlap > 0).then_some((overlap, a))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.created_at.cmp(&a.1.created_at)));
        Ok(scored.into_iter().take(limit).map(|(_, a)| a).collect())
    }

    /// Articles whose scheduled publish time has arrived. SQL only narrows
    /// to hidden-and-scheduled rows; the window itself is decided by
    /// [`is_due_for_publish`] so the rule lives in one place.
    pub async fn due_for_publish(&self, now: i64) -> CmsResult<Vec<ArticleRecord>> {
        let candidates = {
            let conn = self.db.lock().await;
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM articles \
                 WHERE hidden = 1 AND scheduled_at IS NOT NULL"
            ))?;
            let rows = stmt.query_map([], row_to_article)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        Ok(candidates
            .into_iter()
            .filter(|a| is_due_for_publish(a.hidden, a.scheduled_at, now))
            .collect())
    }

    /// Flip a due article visible. Conditional on the article still being
    /// hidden with the same `scheduled_at` the caller saw, so a concurrent
    /// edit or an earlier tick makes this a no-op rather than a clobber.
    pub async fn mark_published(&self, id: &str, expected_scheduled_at: i64) -> CmsResult<bool> {
        let conn = self.db.lock().await;
        let changed = conn.execute(
            "UPDATE articles SET hidden = 0, updated_at = ?1 \
             WHERE id = ?2 AND hidden = 1 AND scheduled_at = ?3",
            params![now_ms(), id, expected_scheduled_at],
        )?;
        Ok(changed > 0)
    }

    pub async fn next_serial_number(&self) -> CmsResult<i64> {
        let conn = self.db.lock().await;
        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(serial_number), 0) + 1 FROM articles",
            [],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    async fn query_visible(
        &self,
        condition: &str,
        order: &str,
        limit: Option<usize>,
    ) -> CmsResult<Vec<ArticleRecord>> {
        let limit_clause = limit.map(|n| format!("LIMIT {n}")).unwrap_or_default();
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM articles WHERE hidden = 0 AND {condition} \
             ORDER BY {order} {limit_clause}"
        ))?;
        let rows = stmt.query_map([], row_to_article)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert(&self, record: &ArticleRecord) -> CmsResult<()> {
        let tag_json = serde_json::to_string(&record.tag_ids)?;
        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO articles (id, serial_number, title, content, html_content, \
             category_id, tag_ids, head_title, head_keyword, head_description, manual_url, \
             alt_text, hidden, scheduled_at, draft, top_sorting, recommend_sorting, \
             page_view, home_image_path, content_image_path, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
             ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                record.id,
                record.serial_number,
                record.title,
                record.content,
                record.html_content,
                record.category_id,
                tag_json,
                record.head_title,
                record.head_keyword,
                record.head_description,
                record.manual_url,
                record.alt_text,
                record.hidden as i64,
                record.scheduled_at,
                record.draft as i64,
                record.top_sorting,
                record.recommend_sorting,
                record.page_view,
                record.home_image_path,
                record.content_image_path,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }
}

fn like_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

const COLUMNS: &str = "id, serial_number, title, content, html_content, category_id, \
    tag_ids, head_title, head_keyword, head_description, manual_url, alt_text, hidden, \
    scheduled_at, draft, top_sorting, recommend_sorting, page_view, home_image_path, \
    content_image_path, created_at, updated_at";

fn row_to_article(row: &Row<'_>) -> rusqlite::Result<ArticleRecord> {
    let tag_json: String = row.get(6)?;
    let tag_ids: Vec<String> = serde_json::from_str(&tag_json).unwrap_or_default();
    Ok(ArticleRecord {
        id: row.get(0)?,
        serial_number: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        html_content: row.get(4)?,
        category_id: row.get(5)?,
        tag_ids,
        head_title: row.get(7)?,
        head_keyword: row.get(8)?,
        head_description: row.get(9)?,
        manual_url: row.get(10)?,
        alt_text: row.get(11)?,
        hidden: row.get::<_, i64>(12)? != 0,
        scheduled_at: row.get(13)?,
        draft: row.get::<_, i64>(14)? != 0,
        top_sorting: row.get(15)?,
        recommend_sorting: row.get(16)?,
        page_view: row.get(17)?,
        home_image_path: row.get(18)?,
        content_image_path: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::schedule::PUBLISH_LOOKBACK_MS;

    fn store() -> ArticleStore {
        ArticleStore::new(open_in_memory().expect("in-memory db"))
    }

    fn article(title: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            content: "[]".to_string(),
            html_content: String::new(),
            ..NewArticle::default()
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let store = store();
        let created = store.create(article("hello")).await.expect("create");
        let fetched = store.get(&created.id).await.expect("get");
        assert_eq!(fetched, created);
        assert_eq!(fetched.serial_number, 1);
        assert_eq!(fetched.page_view, 0);
    }

    #[tokio::test]
    async fn serial_numbers_increase() {
        let store = store();
        let a = store.create(article("a")).await.expect("a");
        let b = store.create(article("b")).await.expect("b");
        assert_eq!(a.serial_number + 1, b.serial_number);
    }

    #[tokio::test]
    async fn patch_keeps_clears_and_sets() {
        let store = store();
        let created = store
            .create(NewArticle {
                head_title: Some("old head".to_string()),
                alt_text: Some("cover".to_string()),
                ..article("patchable")
            })
            .await
            .expect("create");

        let updated = store
            .update(
                &created.id,
                ArticlePatch {
                    title: Some("new title".to_string()),
                    head_title: Field::Clear,
                    scheduled_at: Field::Set(1_000),
                    ..ArticlePatch::default()
                },
            )
            .await
            .expect("update");

        assert_eq!(updated.title, "new title");
        assert_eq!(updated.head_title, None);
        assert_eq!(updated.scheduled_at, Some(1_000));
        // Untouched field survives.
        assert_eq!(updated.alt_text.as_deref(), Some("cover"));
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let store = store();
        for i in 0..5 {
            store
                .create(NewArticle {
                    category_id: Some("cat".to_string()),
                    tag_ids: vec!["t1".to_string()],
                    ..article(&format!("a{i}"))
                })
                .await
                .expect("create");
        }
        store
            .create(NewArticle {
                category_id: Some("other".to_string()),
                hidden: true,
                ..article("hidden one")
            })
            .await
            .expect("create hidden");

        let filter = ArticleFilter {
            category_id: Some("cat".to_string()),
            page: 1,
            per_page: 3,
            ..ArticleFilter::default()
        };
        let (page, total) = store.list(&filter).await.expect("list");
        assert_eq!(total, 5);
        assert_eq!(page.len(), 3);

        let (rest, _) = store
            .list(&ArticleFilter { page: 2, ..filter.clone() })
            .await
            .expect("page 2");
        assert_eq!(rest.len(), 2);

        // Hidden rows only show up when asked for.
        let (all, total_all) = store
            .list(&ArticleFilter { include_hidden: true, page: 1, per_page: 50, ..Default::default() })
            .await
            .expect("all");
        assert_eq!(total_all, 6);
        assert_eq!(all.len(), 6);

        let (tagged, _) = store
            .list(&ArticleFilter {
                tag_id: Some("t1".to_string()),
                page: 1,
                per_page: 50,
                ..Default::default()
            })
            .await
            .expect("by tag");
        assert_eq!(tagged.len(), 5);
    }

    #[tokio::test]
    async fn list_matches_title_substring() {
        let store = store();
        store.create(article("launch week recap")).await.expect("create");
        store.create(article("weekly digest")).await.expect("create");
        store.create(article("unrelated")).await.expect("create");
        // Literal percent in the title must not act as a wildcard.
        store.create(article("100% sure")).await.expect("create");

        let by_title = |needle: &str| ArticleFilter {
            title: Some(needle.to_string()),
            page: 1,
            per_page: 50,
            ..ArticleFilter::default()
        };

        let (hits, total) = store.list(&by_title("week")).await.expect("list");
        assert_eq!(total, 2);
        assert_eq!(hits.len(), 2);

        let (hits, _) = store.list(&by_title("100%")).await.expect("list");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "100% sure");

        let (hits, _) = store.list(&by_title("%")).await.expect("list");
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_created_range_and_status() {
        let store = store();
        let published = store.create(article("published")).await.expect("create");
        let scheduled = store
            .create(NewArticle {
                hidden: true,
                scheduled_at: Some(9_000_000),
                ..article("scheduled")
            })
            .await
            .expect("create");
        let draft = store
            .create(NewArticle { hidden: true, ..article("draft") })
            .await
            .expect("create");

        let base = ArticleFilter {
            include_hidden: true,
            page: 1,
            per_page: 50,
            ..ArticleFilter::default()
        };

        let by_status = |status| ArticleFilter { status: Some(status), ..base.clone() };
        let (hits, _) = store.list(&by_status(ScheduleState::Published)).await.expect("list");
        assert_eq!(
            hits.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec![published.id.as_str()]
        );

        let (hits, _) = store.list(&by_status(ScheduleState::Scheduled)).await.expect("list");
        assert_eq!(
            hits.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec![scheduled.id.as_str()]
        );

        let (hits, _) = store.list(&by_status(ScheduleState::Draft)).await.expect("list");
        assert_eq!(
            hits.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec![draft.id.as_str()]
        );

        // All three rows fall inside their own creation window; a window in
        // the past matches nothing.
        let (hits, total) = store
            .list(&ArticleFilter {
                created_from: Some(published.created_at),
                created_to: Some(draft.created_at),
                ..base.clone()
            })
            .await
            .expect("list");
        assert_eq!(total, 3);
        assert_eq!(hits.len(), 3);

        let (hits, _) = store
            .list(&ArticleFilter { created_to: Some(published.created_at - 1), ..base })
            .await
            .expect("list");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_many_rejects_unknown_ids_up_front() {
        let store = store();
        let kept = store.create(article("survivor")).await.expect("create");

        let err = store
            .delete_many(&[kept.id.clone(), "ghost".to_string()])
            .await
            .expect_err("must fail");
        assert!(matches!(err, CmsError::NotFound(_)));
        // Pre-check failed, nothing was deleted.
        assert!(store.get(&kept.id).await.is_ok());

        let gone = store.delete_many(&[kept.id.clone()]).await.expect("delete");
        assert_eq!(gone.len(), 1);
        assert!(matches!(store.get(&kept.id).await, Err(CmsError::NotFound(_))));
    }

    #[tokio::test]
    async fn page_view_counts_up() {
        let store = store();
        let a = store.create(article("viewed")).await.expect("create");
        assert_eq!(store.increment_page_view(&a.id).await.expect("inc"), 1);
        assert_eq!(store.increment_page_view(&a.id).await.expect("inc"), 2);
    }

    #[tokio::test]
    async fn due_for_publish_honors_the_window() {
        let store = store();
        let now = 10 * PUBLISH_LOOKBACK_MS;

        let due = store
            .create(NewArticle {
                hidden: true,
                scheduled_at: Some(now - 60_000),
                ..article("due")
            })
            .await
            .expect("due");
        store
            .create(NewArticle {
                hidden: true,
                scheduled_at: Some(now - PUBLISH_LOOKBACK_MS - 1),
                ..article("too old")
            })
            .await
            .expect("stale");
        store
            .create(NewArticle {
                hidden: true,
                scheduled_at: Some(now + 60_000),
                ..article("future")
            })
            .await
            .expect("future");
        store
            .create(NewArticle {
                hidden: false,
                scheduled_at: Some(now - 60_000),
                ..article("already visible")
            })
            .await
            .expect("visible");

        let batch = store.due_for_publish(now).await.expect("query");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, due.id);
    }

    #[tokio::test]
    async fn mark_published_is_conditional() {
        let store = store();
        let a = store
            .create(NewArticle {
                hidden: true,
                scheduled_at: Some(5_000),
                ..article("scheduled")
            })
            .await
            .expect("create");

        // Wrong expectation: someone rescheduled since we read the row.
        assert!(!store.mark_published(&a.id, 9_999).await.expect("noop"));
        assert!(store.get(&a.id).await.expect("get").hidden);

        assert!(store.mark_published(&a.id, 5_000).await.expect("flip"));
        assert!(!store.get(&a.id).await.expect("get").hidden);

        // Second tick sees the article already visible.
        assert!(!store.mark_published(&a.id, 5_000).await.expect("idempotent"));
    }

    #[tokio::test]
    async fn pinned_and_popular_orderings() {
        let store = store();
        let second = store
            .create(NewArticle { top_sorting: Some(2), ..article("second pin") })
            .await
            .expect("create");
        let first = store
            .create(NewArticle { top_sorting: Some(1), ..article("first pin") })
            .await
            .expect("create");
        let plain = store.create(article("plain")).await.expect("create");

        let pinned = store.list_pinned().await.expect("pinned");
        assert_eq!(
            pinned.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec![first.id.as_str(), second.id.as_str()]
        );

        for _ in 0..3 {
            store.increment_page_view(&plain.id).await.expect("inc");
        }
        let popular = store.list_popular(2).await.expect("popular");
        assert_eq!(popular[0].id, plain.id);
        assert_eq!(popular.len(), 2);
    }

    #[tokio::test]
    async fn related_ranks_by_tag_overlap() {
        let store = store();
        let origin = store
            .create(NewArticle {
                tag_ids: vec!["t1".to_string(), "t2".to_string()],
                ..article("origin")
            })
            .await
            .expect("origin");
        let strong = store
            .create(NewArticle {
                tag_ids: vec!["t1".to_string(), "t2".to_string()],
                ..article("both tags")
            })
            .await
            .expect("strong");
        let weak = store
            .create(NewArticle { tag_ids: vec!["t2".to_string()], ..article("one tag") })
            .await
            .expect("weak");
        store
            .create(NewArticle { tag_ids: vec!["t9".to_string()], ..article("unrelated") })
            .await
            .expect("unrelated");
        store
            .create(NewArticle {
                tag_ids: vec!["t1".to_string()],
                hidden: true,
                ..article("hidden match")
            })
            .await
            .expect("hidden");

        let related = store.related(&origin.id, 10).await.expect("related");
        assert_eq!(
            related.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec![strong.id.as_str(), weak.id.as_str()]
        );
    }
}
