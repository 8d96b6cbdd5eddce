use crate::Database;
use crate::models::{UserChanges, UserRow};
use anyhow::Result;
use roster_credential::Credential;
use rusqlite::Connection;

impl Database {
    pub fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        is_admin: bool,
        credential: &Credential,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, name, is_admin, password, salt) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![email, name, is_admin, credential.hash, credential.salt],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", rusqlite::params![id]))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", rusqlite::params![email]))
    }

    /// True if `email` belongs to a user other than `id` — the check behind
    /// the email-change conflict response.
    pub fn email_used_by_another_user(&self, email: &str, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?1 AND id != ?2",
                    rusqlite::params![email, id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn list_users(&self, limit: u32, skip: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, name, is_admin, password, salt, created_at
                 FROM users
                 ORDER BY id
                 LIMIT ?1 OFFSET ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![limit, skip], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Apply a partial update. Fields left `None` keep their stored value.
    /// Returns false if no row with `id` exists.
    pub fn update_user(&self, id: i64, changes: &UserChanges) -> Result<bool> {
        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::new();

        if let Some(email) = &changes.email {
            sets.push("email = ?");
            params.push(email);
        }
        if let Some(name) = &changes.name {
            sets.push("name = ?");
            params.push(name);
        }
        if let Some(is_admin) = &changes.is_admin {
            sets.push("is_admin = ?");
            params.push(is_admin);
        }
        if let Some(credential) = &changes.credential {
            sets.push("password = ?");
            params.push(&credential.hash);
            sets.push("salt = ?");
            params.push(&credential.salt);
        }

        if sets.is_empty() {
            // Nothing to change; report whether the row exists at all.
            return Ok(self.get_user(id)?.is_some());
        }

        params.push(&id);
        let sql = format!(
            "UPDATE users SET {} WHERE id = ?",
            sets.join(", ")
        );

        self.with_conn(|conn| {
            let updated = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
            Ok(updated > 0)
        })
    }

    /// Returns false if no row with `id` exists.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", rusqlite::params![id])?;
            Ok(deleted > 0)
        })
    }
}

fn query_user(
    conn: &Connection,
    predicate: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, name, is_admin, password, salt, created_at FROM users WHERE {}",
        predicate
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row(params, map_user_row).optional()?;
    Ok(row)
}

fn map_user_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        is_admin: row.get(3)?,
        password: row.get(4)?,
        salt: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
