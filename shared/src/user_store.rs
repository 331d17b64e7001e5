//! Account storage with Argon2 password hashing.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use crate::db::{new_id, now_ms, Db};
use crate::error::{CmsError, CmsResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct UserStore {
    db: Db,
}

impl UserStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> CmsResult<UserRecord> {
        check_password_policy(password)?;
        let record = UserRecord {
            id: new_id(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            created_at: now_ms(),
        };
        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.username,
                record.email,
                record.password_hash,
                record.created_at,
            ],
        )
        .map_err(|err| map_unique(err, username))?;
        Ok(record)
    }

    /// Log in by username or email. Failure is a single opaque error so a
    /// caller cannot tell "no such user" from "wrong password".
    pub async fn verify_login(&self, identifier: &str, password: &str) -> CmsResult<UserRecord> {
        let found = {
            let conn = self.db.lock().await;
            conn.query_row(
                "SELECT id, username, email, password_hash, created_at FROM users \
                 WHERE username = ?1 OR email = ?1",
                params![identifier],
                row_to_user,
            )
            .optional()?
        };
        let user = found.ok_or_else(invalid_credentials)?;
        let parsed =
            PasswordHash::new(&user.password_hash).map_err(|_| invalid_credentials())?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| invalid_credentials())?;
        Ok(user)
    }

    pub async fn get(&self, id: &str) -> CmsResult<UserRecord> {
        let conn = self.db.lock().await;
        conn.query_row(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = ?1",
            params![id],
            row_to_user,
        )
        .optional()?
        .ok_or_else(|| CmsError::NotFound(format!("user: {id}")))
    }

    pub async fn list(&self) -> CmsResult<Vec<UserRecord>> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, username, email, password_hash, created_at FROM users \
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_user)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn update(
        &self,
        id: &str,
        username: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> CmsResult<UserRecord> {
        let mut record = self.get(id).await?;
        if let Some(username) = username {
            record.username = username.to_string();
        }
        if let Some(email) = email {
            record.email = email.to_string();
        }
        if let Some(password) = password {
            check_password_policy(password)?;
            record.password_hash = hash_password(password)?;
        }
        let conn = self.db.lock().await;
        conn.execute(
            "UPDATE users SET username = ?1, email = ?2, password_hash = ?3 WHERE id = ?4",
            params![record.username, record.email, record.password_hash, record.id],
        )
        .map_err(|err| map_unique(err, &record.username))?;
        Ok(record)
    }

    pub async fn delete(&self, id: &str) -> CmsResult<()> {
        let conn = self.db.lock().await;
        let removed =
            conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(CmsError::NotFound(format!("user: {id}")));
        }
        Ok(())
    }
}

/// At least six characters with both a lowercase and an uppercase letter.
pub fn check_password_policy(password: &str) -> CmsResult<()> {
    let long_enough = password.chars().count() >= 6;
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    if long_enough && has_lower && has_upper {
        Ok(())
    } else {
        Err(CmsError::InvalidInput(
            "password needs at least 6 characters with upper and lower case letters".to_string(),
        ))
    }
}

fn hash_password(password: &str) -> CmsResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CmsError::InvalidInput(format!("password hashing failed: {err}")))
}

fn invalid_credentials() -> CmsError {
    CmsError::InvalidInput("invalid credentials".to_string())
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_unique(err: rusqlite::Error, who: &str) -> CmsError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &err {
        if inner.code == rusqlite::ErrorCode::ConstraintViolation {
            return CmsError::Conflict(format!("username or email already taken: {who}"));
        }
    }
    CmsError::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn store() -> UserStore {
        UserStore::new(open_in_memory().expect("in-memory db"))
    }

    #[tokio::test]
    async fn register_then_login_by_either_identifier() {
        let store = store();
        let user = store
            .register("alice", "alice@example.com", "Secret1")
            .await
            .expect("register");

        let by_name = store.verify_login("alice", "Secret1").await.expect("by username");
        assert_eq!(by_name.id, user.id);
        let by_mail = store
            .verify_login("alice@example.com", "Secret1")
            .await
            .expect("by email");
        assert_eq!(by_mail.id, user.id);
    }

    #[tokio::test]
    async fn bad_credentials_are_indistinguishable() {
        let store = store();
        store
            .register("alice", "alice@example.com", "Secret1")
            .await
            .expect("register");

        let wrong_pw = store.verify_login("alice", "Nope99x").await.expect_err("reject");
        let no_user = store.verify_login("bob", "Secret1").await.expect_err("reject");
        assert_eq!(wrong_pw.to_string(), no_user.to_string());
    }

    #[tokio::test]
    async fn password_policy() {
        assert!(check_password_policy("Secret").is_ok());
        assert!(check_password_policy("abc").is_err());
        assert!(check_password_policy("abcdef").is_err());
        assert!(check_password_policy("ABCDEF").is_err());
        assert!(check_password_policy("Ab1").is_err());
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = store();
        store
            .register("alice", "alice@example.com", "Secret1")
            .await
            .expect("first");
        let err = store
            .register("alice", "other@example.com", "Secret1")
            .await
            .expect_err("dup");
        assert!(matches!(err, CmsError::Conflict(_)));
    }

    #[tokio::test]
    async fn password_change_invalidates_the_old_one() {
        let store = store();
        let user = store
            .register("alice", "alice@example.com", "Secret1")
            .await
            .expect("register");

        store
            .update(&user.id, None, None, Some("Fresh42"))
            .await
            .expect("update");
        assert!(store.verify_login("alice", "Secret1").await.is_err());
        store.verify_login("alice", "Fresh42").await.expect("new password works");
    }
}
