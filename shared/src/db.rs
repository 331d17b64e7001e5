use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::error::CmsResult;

/// Shared handle to the SQLite database. All stores clone this; the mutex
/// is held only across synchronous statement execution.
pub type Db = Arc<Mutex<Connection>>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id                 TEXT PRIMARY KEY,
    serial_number      INTEGER NOT NULL,
    title              TEXT NOT NULL,
    content            TEXT NOT NULL,
    html_content       TEXT NOT NULL,
    category_id        TEXT,
    tag_ids            TEXT NOT NULL DEFAULT '[]',
    head_title         TEXT,
    head_keyword       TEXT,
    head_description   TEXT,
    manual_url         TEXT,
    alt_text           TEXT,
    hidden             INTEGER NOT NULL DEFAULT 0,
    scheduled_at       INTEGER,
    draft              INTEGER NOT NULL DEFAULT 0,
    top_sorting        INTEGER,
    recommend_sorting  INTEGER,
    page_view          INTEGER NOT NULL DEFAULT 0,
    home_image_path    TEXT,
    content_image_path TEXT,
    created_at         INTEGER NOT NULL,
    updated_at         INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_articles_schedule ON articles (hidden, scheduled_at);
CREATE INDEX IF NOT EXISTS idx_articles_category ON articles (category_id);

CREATE TABLE IF NOT EXISTS categories (
    id               TEXT PRIMARY KEY,
    name             TEXT NOT NULL UNIQUE,
    upper_category   TEXT,
    head_title       TEXT,
    head_keyword     TEXT,
    head_description TEXT,
    manual_url       TEXT,
    created_at       INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS url_records (
    original_id TEXT NOT NULL,
    kind        TEXT NOT NULL,
    url         TEXT NOT NULL UNIQUE,
    changefreq  TEXT NOT NULL DEFAULT 'weekly',
    priority    REAL NOT NULL DEFAULT 0.5,
    PRIMARY KEY (original_id, kind)
);

CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    INTEGER NOT NULL
);
"#;

pub fn open_database(path: &str) -> CmsResult<Db> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Throwaway database for tests.
pub fn open_in_memory() -> CmsResult<Db> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
