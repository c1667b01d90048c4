use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::parse_datetime,
    models::{toy_password_hash, User},
};

fn row_to_user(row: &Row) -> Result<User> {
    let created_at: String = row.get("created_at")?;
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn register_user(&self, username: &str, password: &str) -> Result<User> {
        let username = username.trim().to_string();
        if username.is_empty() {
            bail!("username must not be empty");
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash: toy_password_hash(password),
            created_at: Utc::now(),
        };
        let record = user.clone();

        self.execute(move |conn| {
            let taken: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    params![record.username],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                bail!("username '{}' is already registered", record.username);
            }

            conn.execute(
                "INSERT INTO users (id, username, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    record.username,
                    record.password_hash,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(user)
    }

    pub async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let username = username.trim().to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, password_hash, created_at
                 FROM users
                 WHERE username = ?1",
            )?;

            let mut rows = stmt.query(params![username])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_user(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// `Ok(None)` for an unknown user or a wrong password.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = self.find_user(username).await?;
        Ok(user.filter(|user| user.password_hash == toy_password_hash(password)))
    }
}
