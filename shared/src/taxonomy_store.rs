//! Categories and tags.
//!
//! Categories form a tree via `upper_category`; a category that directly
//! holds articles may not become a parent. Tags are flat, unique by name.

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::article_store::Field;
use crate::db::{new_id, now_ms, Db};
use crate::error::{CmsError, CmsResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: String,
    pub name: String,
    pub upper_category: Option<String>,
    pub head_title: Option<String>,
    pub head_keyword: Option<String>,
    pub head_description: Option<String>,
    pub manual_url: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub upper_category: Option<String>,
    pub head_title: Option<String>,
    pub head_keyword: Option<String>,
    pub head_description: Option<String>,
    pub manual_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub upper_category: Field<String>,
    pub head_title: Field<String>,
    pub head_keyword: Field<String>,
    pub head_description: Field<String>,
    pub manual_url: Field<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct TaxonomyStore {
    db: Db,
}

impl TaxonomyStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_category(&self, new: NewCategory) -> CmsResult<CategoryRecord> {
        let record = CategoryRecord {
            id: new_id(),
            name: new.name,
            upper_category: new.upper_category,
            head_title: new.head_title,
            head_keyword: new.head_keyword,
            head_description: new.head_description,
            manual_url: new.manual_url,
            created_at: now_ms(),
        };
        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO categories (id, name, upper_category, head_title, head_keyword, \
             head_description, manual_url, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.name,
                record.upper_category,
                record.head_title,
                record.head_keyword,
                record.head_description,
                record.manual_url,
                record.created_at,
            ],
        )
        .map_err(|err| map_name_conflict(err, &record.name))?;
        Ok(record)
    }

    pub async fn get_category(&self, id: &str) -> CmsResult<CategoryRecord> {
        self.find_category(id)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("category: {id}")))
    }

    pub async fn find_category(&self, id: &str) -> CmsResult<Option<CategoryRecord>> {
        let conn = self.db.lock().await;
        Ok(conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                params![id],
                row_to_category,
            )
            .optional()?)
    }

    pub async fn find_category_by_name(&self, name: &str) -> CmsResult<Option<CategoryRecord>> {
        let conn = self.db.lock().await;
        Ok(conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = ?1"),
                params![name],
                row_to_category,
            )
            .optional()?)
    }

    /// Paginated listing in creation order, with the total count so the
    /// caller can build page controls. `page` is 1-based; zero is page 1.
    pub async fn list_categories(
        &self,
        page: u32,
        per_page: u32,
    ) -> CmsResult<(Vec<CategoryRecord>, usize)> {
        let per_page = per_page.max(1) as i64;
        let offset = (page.max(1) as i64 - 1) * per_page;
        let conn = self.db.lock().await;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY created_at \
             LIMIT {per_page} OFFSET {offset}"
        ))?;
        let rows = stmt.query_map([], row_to_category)?;
        Ok((rows.collect::<Result<Vec<_>, _>>()?, total as usize))
    }

    async fn all_categories(&self) -> CmsResult<Vec<CategoryRecord>> {
        let conn = self.db.lock().await;
        let mut stmt = conn
            .prepare(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY created_at"))?;
        let rows = stmt.query_map([], row_to_category)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn children_of(&self, id: &str) -> CmsResult<Vec<CategoryRecord>> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE upper_category = ?1 \
             ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![id], row_to_category)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Categories grouped by parent id, for building the navigation menu
    /// in one pass. Roots live under the `None` key.
    pub async fn upper_category_map(
        &self,
    ) -> CmsResult<HashMap<Option<String>, Vec<CategoryRecord>>> {
        let all = self.all_categories().await?;
        let mut map: HashMap<Option<String>, Vec<CategoryRecord>> = HashMap::new();
        for category in all {
            map.entry(category.upper_category.clone()).or_default().push(category);
        }
        Ok(map)
    }

    /// Validate a prospective parent: it must exist and must not directly
    /// hold articles. Returns it on success.
    pub async fn is_upper_candidate(&self, id: &str) -> CmsResult<CategoryRecord> {
        let record = self.get_category(id).await?;
        let conn = self.db.lock().await;
        let holds: i64 = conn.query_row(
            "SELECT COUNT(*) FROM articles WHERE category_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if holds > 0 {
            return Err(CmsError::InvalidInput(format!(
                "category '{}' holds articles and cannot be a parent",
                record.name
            )));
        }
        Ok(record)
    }

    pub async fn update_category(
        &self,
        id: &str,
        patch: CategoryPatch,
    ) -> CmsResult<CategoryRecord> {
        let mut record = self.get_category(id).await?;
        if let Some(name) = patch.name {
            record.name = name;
        }
        apply_field(patch.upper_category, &mut record.upper_category);
        apply_field(patch.head_title, &mut record.head_title);
        apply_field(patch.head_keyword, &mut record.head_keyword);
        apply_field(patch.head_description, &mut record.head_description);
        apply_field(patch.manual_url, &mut record.manual_url);

        let conn = self.db.lock().await;
        conn.execute(
            "UPDATE categories SET name = ?1, upper_category = ?2, head_title = ?3, \
             head_keyword = ?4, head_description = ?5, manual_url = ?6 WHERE id = ?7",
            params![
                record.name,
                record.upper_category,
                record.head_title,
                record.head_keyword,
                record.head_description,
                record.manual_url,
                record.id,
            ],
        )
        .map_err(|err| map_name_conflict(err, &record.name))?;
        Ok(record)
    }

    /// Delete a batch of categories. Children of the deleted ones become
    /// roots (their `upper_category` is nulled) instead of being orphaned.
    pub async fn delete_categories(&self, ids: &[String]) -> CmsResult<Vec<CategoryRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push(self.get_category(id).await?);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.db.lock().await;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let removed = conn
            .prepare(&format!("DELETE FROM categories WHERE id IN ({placeholders})"))?
            .execute(param_refs.as_slice())?;
        if removed != ids.len() {
            return Err(CmsError::PartialDelete { expected: ids.len(), removed });
        }
        conn.prepare(&format!(
            "UPDATE categories SET upper_category = NULL WHERE upper_category IN ({placeholders})"
        ))?
        .execute(param_refs.as_slice())?;
        Ok(records)
    }

    pub async fn create_tag(&self, name: &str) -> CmsResult<TagRecord> {
        let record = TagRecord {
            id: new_id(),
            name: name.to_string(),
            created_at: now_ms(),
        };
        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO tags (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![record.id, record.name, record.created_at],
        )
        .map_err(|err| map_name_conflict(err, &record.name))?;
        Ok(record)
    }

    pub async fn get_tag(&self, id: &str) -> CmsResult<TagRecord> {
        let conn = self.db.lock().await;
        conn.query_row(
            "SELECT id, name, created_at FROM tags WHERE id = ?1",
            params![id],
            row_to_tag,
        )
        .optional()?
        .ok_or_else(|| CmsError::NotFound(format!("tag: {id}")))
    }

    pub async fn find_tag_by_name(&self, name: &str) -> CmsResult<Option<TagRecord>> {
        let conn = self.db.lock().await;
        Ok(conn
            .query_row(
                "SELECT id, name, created_at FROM tags WHERE name = ?1",
                params![name],
                row_to_tag,
            )
            .optional()?)
    }

    pub async fn list_tags(&self) -> CmsResult<Vec<TagRecord>> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare("SELECT id, name, created_at FROM tags ORDER BY created_at")?;
        let rows = stmt.query_map([], row_to_tag)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

const CATEGORY_COLUMNS: &str =
    "id, name, upper_category, head_title, head_keyword, head_description, manual_url, created_at";

fn apply_field<T>(field: Field<T>, slot: &mut Option<T>) {
    match field {
        Field::Keep => {},
        Field::Clear => *slot = None,
        Field::Set(v) => *slot = Some(v),
    }
}

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<CategoryRecord> {
    Ok(CategoryRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        upper_category: row.get(2)?,
        head_title: row.get(3)?,
        head_keyword: row.get(4)?,
        head_description: row.get(5)?,
        manual_url: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn row_to_tag(row: &Row<'_>) -> rusqlite::Result<TagRecord> {
    Ok(TagRecord { id: row.get(0)?, name: row.get(1)?, created_at: row.get(2)? })
}

fn map_name_conflict(err: rusqlite::Error, name: &str) -> CmsError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &err {
        if inner.code == rusqlite::ErrorCode::ConstraintViolation {
            return CmsError::Conflict(format!("name already taken: {name}"));
        }
    }
    CmsError::Storage(err)
}
