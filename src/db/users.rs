use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{clean, merge_text, parse_datetime, parse_uuid, timestamp, Database};
use crate::models::*;

const USER_COLUMNS: &str = "id, name, email, role, class_level, created_at, updated_at";

impl Database {
    pub fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE (?1 IS NULL OR role = ?1)
               AND (?2 IS NULL OR class_level = ?2)
             ORDER BY name, email"
        ))?;

        let users = stmt
            .query_map(
                params![filter.role.map(|r| r.as_str()), filter.class_level],
                user_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn()?;
        query_user(&conn, id)
    }

    /// Creates a user. Emails are unique regardless of case.
    pub fn create_user(&self, input: CreateUserInput) -> Result<User> {
        let conn = self.conn()?;
        let email = input.email.trim().to_string();
        ensure_email_free(&conn, &email, None)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            email,
            role: input.role,
            class_level: clean(input.class_level),
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO users (id, name, email, role, class_level, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.role.as_str(),
                user.class_level,
                timestamp(now),
                timestamp(now),
            ],
        )?;

        Ok(user)
    }

    pub fn update_user(&self, id: Uuid, input: UpdateUserInput) -> Result<Option<User>> {
        let conn = self.conn()?;
        let Some(existing) = query_user(&conn, id)? else {
            return Ok(None);
        };

        let email = match input.email {
            Some(email) => {
                let email = email.trim().to_string();
                ensure_email_free(&conn, &email, Some(id))?;
                email
            }
            None => existing.email,
        };

        let now = Utc::now();
        let user = User {
            id,
            name: input
                .name
                .map(|s| s.trim().to_string())
                .unwrap_or(existing.name),
            email,
            role: input.role.unwrap_or(existing.role),
            class_level: merge_text(input.class_level, existing.class_level),
            created_at: existing.created_at,
            updated_at: now,
        };

        conn.execute(
            "UPDATE users SET name = ?, email = ?, role = ?, class_level = ?, updated_at = ? WHERE id = ?",
            params![
                user.name,
                user.email,
                user.role.as_str(),
                user.class_level,
                timestamp(now),
                id.to_string(),
            ],
        )?;

        Ok(Some(user))
    }

    /// Deletes a user. Their submissions go with them; events and grades
    /// they authored keep existing with the author cleared.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM users WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }
}

pub(super) fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
            [id.to_string()],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

fn ensure_email_free(conn: &Connection, email: &str, except: Option<Uuid>) -> Result<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1 COLLATE NOCASE AND (?2 IS NULL OR id != ?2)",
        params![email, except.map(|id| id.to_string())],
        |row| row.get(0),
    )?;
    if count > 0 {
        return Err(ValidationError::Invalid(format!(
            "A user with email {} already exists",
            email
        ))
        .into());
    }
    Ok(())
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        role: Role::from_str(&row.get::<_, String>(3)?).unwrap_or(Role::Student),
        class_level: row.get(4)?,
        created_at: parse_datetime(row.get(5)?),
        updated_at: parse_datetime(row.get(6)?),
    })
}
