//! Canonical-URL registry.
//!
//! Every live content entity owns exactly one URL record; the `url` column
//! is globally unique. Records are created with their entity, rewritten on
//! rename/reparent, and deleted with the entity — bulk deletions are
//! reconciled by count at the call site rather than wrapped in a
//! transaction.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::Db;
use crate::error::{CmsError, CmsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlKind {
    Article,
    Category,
    Tag,
}

impl UrlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlKind::Article => "article",
            UrlKind::Category => "category",
            UrlKind::Tag => "tag",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "article" => Some(UrlKind::Article),
            "category" => Some(UrlKind::Category),
            "tag" => Some(UrlKind::Tag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub original_id: String,
    pub kind: UrlKind,
    pub changefreq: String,
    pub priority: f64,
}

pub struct UrlRegistry {
    db: Db,
    domain: String,
}

impl UrlRegistry {
    /// The public domain is supplied once here; core logic never reads it
    /// from ambient process state.
    pub fn new(db: Db, domain: impl Into<String>) -> Self {
        let mut domain = domain.into();
        if !domain.ends_with('/') {
            domain.push('/');
        }
        Self { db, domain }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Create the record for a freshly created entity.
    ///
    /// With a parent, the URL nests under the parent's path (its trailing
    /// `.html` stripped); without one it sits at the domain root. The path
    /// segment is the manual slug when given, otherwise the entity id —
    /// which keeps URLs unique even with duplicate titles.
    pub async fn create_url(
        &self,
        original_id: &str,
        kind: UrlKind,
        parent: Option<(&str, UrlKind)>,
        manual_slug: Option<&str>,
    ) -> CmsResult<UrlRecord> {
        let segment = manual_slug.unwrap_or(original_id);
        let url = match parent {
            Some((parent_id, parent_kind)) => {
                let parent_record = self
                    .find(parent_id, parent_kind)
                    .await?
                    .ok_or_else(|| CmsError::DependencyMissing(parent_id.to_string()))?;
                format!("{}/{}.html", strip_html_suffix(&parent_record.url), segment)
            },
            None => format!("{}{}.html", self.domain, segment),
        };

        let record = UrlRecord {
            url,
            original_id: original_id.to_string(),
            kind,
            changefreq: "weekly".to_string(),
            priority: 0.5,
        };
        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO url_records (original_id, kind, url, changefreq, priority) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.original_id,
                record.kind.as_str(),
                record.url,
                record.changefreq,
                record.priority
            ],
        )
        .map_err(|err| map_constraint(err, &record.url))?;
        Ok(record)
    }

    /// Replace the last path segment with a new slug, keeping the prefix.
    /// Calling twice with the same slug yields the same URL.
    pub async fn rename_url(
        &self,
        original_id: &str,
        kind: UrlKind,
        new_slug: &str,
    ) -> CmsResult<UrlRecord> {
        let mut record = self
            .find(original_id, kind)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("url record for {original_id}")))?;
        let new_url = match record.url.rfind('/') {
            Some(pos) => format!("{}/{}.html", &record.url[..pos], new_slug),
            None => format!("{}{}.html", self.domain, new_slug),
        };
        self.set_url(original_id, kind, &new_url).await?;
        record.url = new_url;
        Ok(record)
    }

    /// Recompute the URL under a new parent, preserving the entity's own
    /// final segment.
    pub async fn reparent_url(
        &self,
        original_id: &str,
        kind: UrlKind,
        new_parent_id: &str,
        new_parent_kind: UrlKind,
    ) -> CmsResult<UrlRecord> {
        let mut record = self
            .find(original_id, kind)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("url record for {original_id}")))?;
        let parent_record = self
            .find(new_parent_id, new_parent_kind)
            .await?
            .ok_or_else(|| CmsError::DependencyMissing(new_parent_id.to_string()))?;

        let own_segment = record
            .url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let new_url = format!("{}/{}", strip_html_suffix(&parent_record.url), own_segment);
        self.set_url(original_id, kind, &new_url).await?;
        record.url = new_url;
        Ok(record)
    }

    /// Lift an entity to the domain root, keeping its own final segment.
    /// Used when a category loses its parent.
    pub async fn reparent_to_root(&self, original_id: &str, kind: UrlKind) -> CmsResult<UrlRecord> {
        let mut record = self
            .find(original_id, kind)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("url record for {original_id}")))?;
        let own_segment = record
            .url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let new_url = format!("{}{}", self.domain, own_segment);
        self.set_url(original_id, kind, &new_url).await?;
        record.url = new_url;
        Ok(record)
    }

    /// Delete all records for the given ids. Returns the number actually
    /// removed; callers compare it against the entity count and raise
    /// [`CmsError::PartialDelete`] on mismatch.
    pub async fn delete_urls(&self, ids: &[String], kind: UrlKind) -> CmsResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM url_records WHERE kind = ? AND original_id IN ({placeholders})"
        );
        let kind_text = kind.as_str().to_string();
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let mut param_values: Vec<&dyn rusqlite::ToSql> = vec![&kind_text];
        for id in ids {
            param_values.push(id);
        }
        let removed = stmt.execute(param_values.as_slice())?;
        Ok(removed)
    }

    /// When a category is deleted, descendants collapse up one level: the
    /// deleted category's path segment is stripped from every URL that
    /// contains it, rather than deleting those records.
    pub async fn bulk_reparent_on_category_delete(&self, slug: &str) -> CmsResult<usize> {
        let needle = format!("/{slug}/");
        let affected: Vec<UrlRecord> = {
            let conn = self.db.lock().await;
            let mut stmt = conn.prepare(
                "SELECT url, original_id, kind, changefreq, priority FROM url_records \
                 WHERE url LIKE ?1 ESCAPE '\\'",
            )?;
            let pattern = format!("%{}%", like_escape(&needle));
            let rows = stmt.query_map(params![pattern], row_to_record)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut updated = 0;
        for record in affected {
            let collapsed = record.url.replacen(&needle, "/", 1);
            if collapsed == record.url {
                continue;
            }
            tracing::debug!(from = %record.url, to = %collapsed, "collapsing url segment");
            self.set_url(&record.original_id, record.kind, &collapsed).await?;
            updated += 1;
        }
        if updated > 0 {
            tracing::info!(updated, slug, "reparented descendant urls after category delete");
        }
        Ok(updated)
    }

    /// Exact-match reverse lookup from a public URL back to its entity.
    pub async fn lookup_by_url(&self, url: &str) -> CmsResult<UrlRecord> {
        let conn = self.db.lock().await;
        conn.query_row(
            "SELECT url, original_id, kind, changefreq, priority FROM url_records \
             WHERE url = ?1",
            params![url],
            row_to_record,
        )
        .optional()?
        .ok_or_else(|| CmsError::NotFound(format!("url: {url}")))
    }

    pub async fn find(&self, original_id: &str, kind: UrlKind) -> CmsResult<Option<UrlRecord>> {
        let conn = self.db.lock().await;
        Ok(conn
            .query_row(
                "SELECT url, original_id, kind, changefreq, priority FROM url_records \
                 WHERE original_id = ?1 AND kind = ?2",
                params![original_id, kind.as_str()],
                row_to_record,
            )
            .optional()?)
    }

    /// Full enumeration for the sitemap feed.
    pub async fn list_all(&self) -> CmsResult<Vec<UrlRecord>> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(
            "SELECT url, original_id, kind, changefreq, priority FROM url_records ORDER BY url",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn set_url(&self, original_id: &str, kind: UrlKind, url: &str) -> CmsResult<()> {
        let conn = self.db.lock().await;
        let changed = conn
            .execute(
                "UPDATE url_records SET url = ?1 WHERE original_id = ?2 AND kind = ?3",
                params![url, original_id, kind.as_str()],
            )
            .map_err(|err| map_constraint(err, url))?;
        if changed == 0 {
            return Err(CmsError::NotFound(format!("url record for {original_id}")));
        }
        Ok(())
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
    let kind_text: String = row.get(2)?;
    // A kind outside the known set means the table is corrupt; surface it
    // rather than mislabeling the record.
    let kind = UrlKind::parse(&kind_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown url kind: {kind_text}").into(),
        )
    })?;
    Ok(UrlRecord {
        url: row.get(0)?,
        original_id: row.get(1)?,
        kind,
        changefreq: row.get(3)?,
        priority: row.get(4)?,
    })
}

fn strip_html_suffix(url: &str) -> &str {
    url.strip_suffix(".html").unwrap_or(url)
}

fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn map_constraint(err: rusqlite::Error, url: &str) -> CmsError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &err {
        if inner.code == rusqlite::ErrorCode::ConstraintViolation {
            return CmsError::Conflict(format!("url already registered: {url}"));
        }
    }
    CmsError::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn registry() -> UrlRegistry {
        let db = open_in_memory().expect("in-memory db");
        UrlRegistry::new(db, "https://news.example.com/")
    }

    #[tokio::test]
    async fn root_url_uses_manual_slug_or_id() {
        let reg = registry();
        let with_slug = reg
            .create_url("a1", UrlKind::Article, None, Some("launch-day"))
            .await
            .expect("create");
        assert_eq!(with_slug.url, "https://news.example.com/launch-day.html");

        let without = reg
            .create_url("a2", UrlKind::Article, None, None)
            .await
            .expect("create");
        assert_eq!(without.url, "https://news.example.com/a2.html");
    }

    #[tokio::test]
    async fn nested_url_extends_parent_path() {
        let reg = registry();
        reg.create_url("c1", UrlKind::Category, None, Some("sports"))
            .await
            .expect("parent");
        let child = reg
            .create_url("c2", UrlKind::Category, Some(("c1", UrlKind::Category)), Some("tennis"))
            .await
            .expect("child");
        assert_eq!(child.url, "https://news.example.com/sports/tennis.html");
    }

    #[tokio::test]
    async fn missing_parent_record_is_dependency_missing() {
        let reg = registry();
        let err = reg
            .create_url("c2", UrlKind::Category, Some(("ghost", UrlKind::Category)), None)
            .await
            .expect_err("must fail");
        assert!(matches!(err, CmsError::DependencyMissing(_)));
    }

    #[tokio::test]
    async fn duplicate_url_is_a_conflict() {
        let reg = registry();
        reg.create_url("a1", UrlKind::Article, None, Some("same"))
            .await
            .expect("first");
        let err = reg
            .create_url("a2", UrlKind::Article, None, Some("same"))
            .await
            .expect_err("second must conflict");
        assert!(matches!(err, CmsError::Conflict(_)));
    }

    #[tokio::test]
    async fn one_record_per_entity() {
        let reg = registry();
        reg.create_url("a1", UrlKind::Article, None, Some("one"))
            .await
            .expect("first");
        let err = reg
            .create_url("a1", UrlKind::Article, None, Some("two"))
            .await
            .expect_err("second record for same entity must fail");
        assert!(matches!(err, CmsError::Conflict(_)));
        assert_eq!(reg.list_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn rename_is_idempotent() {
        let reg = registry();
        reg.create_url("c1", UrlKind::Category, None, Some("sports"))
            .await
            .expect("parent");
        reg.create_url("a1", UrlKind::Article, Some(("c1", UrlKind::Category)), None)
            .await
            .expect("article");

        let first = reg.rename_url("a1", UrlKind::Article, "foo").await.expect("rename");
        assert_eq!(first.url, "https://news.example.com/sports/foo.html");
        let second = reg.rename_url("a1", UrlKind::Article, "foo").await.expect("rename again");
        assert_eq!(second.url, first.url);
    }

    #[tokio::test]
    async fn reparent_preserves_own_segment() {
        let reg = registry();
        reg.create_url("c1", UrlKind::Category, None, Some("sports"))
            .await
            .expect("old parent");
        reg.create_url("c2", UrlKind::Category, None, Some("culture"))
            .await
            .expect("new parent");
        reg.create_url("a1", UrlKind::Article, Some(("c1", UrlKind::Category)), Some("finals"))
            .await
            .expect("article");

        let moved = reg
            .reparent_url("a1", UrlKind::Article, "c2", UrlKind::Category)
            .await
            .expect("reparent");
        assert_eq!(moved.url, "https://news.example.com/culture/finals.html");
    }

    #[tokio::test]
    async fn reparent_to_root_drops_the_prefix() {
        let reg = registry();
        reg.create_url("c1", UrlKind::Category, None, Some("sports"))
            .await
            .expect("parent");
        reg.create_url("c2", UrlKind::Category, Some(("c1", UrlKind::Category)), Some("tennis"))
            .await
            .expect("child");

        let lifted = reg.reparent_to_root("c2", UrlKind::Category).await.expect("lift");
        assert_eq!(lifted.url, "https://news.example.com/tennis.html");
    }

    #[tokio::test]
    async fn delete_reports_how_many_records_went() {
        let reg = registry();
        reg.create_url("a1", UrlKind::Article, None, None).await.expect("a1");
        reg.create_url("a2", UrlKind::Article, None, None).await.expect("a2");

        // a3 never got a record: the caller sees 2 != 3 and reconciles.
        let ids = vec!["a1".to_string(), "a2".to_string(), "a3".to_string()];
        let removed = reg.delete_urls(&ids, UrlKind::Article).await.expect("delete");
        assert_eq!(removed, 2);
        assert!(reg.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn category_delete_collapses_descendants_up() {
        let reg = registry();
        reg.create_url("c1", UrlKind::Category, None, Some("sports"))
            .await
            .expect("parent");
        reg.create_url("c2", UrlKind::Category, Some(("c1", UrlKind::Category)), Some("tennis"))
            .await
            .expect("child");
        reg.create_url("a1", UrlKind::Article, Some(("c2", UrlKind::Category)), Some("finals"))
            .await
            .expect("grandchild");

        let updated = reg.bulk_reparent_on_category_delete("tennis").await.expect("collapse");
        assert_eq!(updated, 1);
        let article = reg.find("a1", UrlKind::Article).await.expect("find").expect("exists");
        assert_eq!(article.url, "https://news.example.com/sports/finals.html");
    }

    #[tokio::test]
    async fn corrupt_kind_column_is_a_storage_error() {
        let db = open_in_memory().expect("in-memory db");
        let reg = UrlRegistry::new(db.clone(), "https://news.example.com/");
        {
            let conn = db.lock().await;
            conn.execute(
                "INSERT INTO url_records (original_id, kind, url) VALUES ('x1', 'widget', 'https://news.example.com/x1.html')",
                [],
            )
            .expect("raw insert");
        }

        let err = reg.list_all().await.expect_err("corrupt row must not decode");
        assert!(matches!(err, CmsError::Storage(_)));
    }

    #[tokio::test]
    async fn reverse_lookup() {
        let reg = registry();
        reg.create_url("t1", UrlKind::Tag, None, Some("rust"))
            .await
            .expect("tag");

        let hit = reg
            .lookup_by_url("https://news.example.com/rust.html")
            .await
            .expect("lookup");
        assert_eq!(hit.original_id, "t1");
        assert_eq!(hit.kind, UrlKind::Tag);

        let miss = reg.lookup_by_url("https://news.example.com/nope.html").await;
        assert!(matches!(miss, Err(CmsError::NotFound(_))));
    }
}
