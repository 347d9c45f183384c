use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::curriculum::query_subject;
use super::{clean, merge_text, parse_datetime, parse_uuid, timestamp, Database};
use crate::models::*;

const EVENT_COLUMNS: &str =
    "id, title, description, starts_at, ends_at, class_level, subject_id, created_by, created_at";

impl Database {
    /// Events overlapping `[from, to)`, ordered by start time.
    ///
    /// A class filter also matches events with no class, since those are
    /// school-wide.
    pub fn list_events(&self, filter: &EventFilter) -> Result<Vec<ScheduleEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM schedule_events
             WHERE (?1 IS NULL OR ends_at > ?1)
               AND (?2 IS NULL OR starts_at < ?2)
               AND (?3 IS NULL OR class_level IS NULL OR class_level = ?3)
             ORDER BY starts_at, title"
        ))?;

        let events = stmt
            .query_map(
                params![
                    filter.from.map(timestamp),
                    filter.to.map(timestamp),
                    filter.class_level,
                ],
                event_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    pub fn get_event(&self, id: Uuid) -> Result<Option<ScheduleEvent>> {
        let conn = self.conn()?;
        query_event(&conn, id)
    }

    pub fn create_event(&self, input: CreateEventInput) -> Result<ScheduleEvent> {
        let conn = self.conn()?;
        check_window(input.starts_at, input.ends_at)?;
        if let Some(subject_id) = input.subject_id {
            if query_subject(&conn, subject_id)?.is_none() {
                bail!("Subject not found");
            }
        }
        if let Some(author) = input.created_by {
            if super::users::query_user(&conn, author)?.is_none() {
                bail!("User not found");
            }
        }

        let now = Utc::now();
        let event = ScheduleEvent {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            description: clean(input.description),
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            class_level: clean(input.class_level),
            subject_id: input.subject_id,
            created_by: input.created_by,
            created_at: now,
        };

        conn.execute(
            "INSERT INTO schedule_events (id, title, description, starts_at, ends_at, class_level, subject_id, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                event.id.to_string(),
                event.title,
                event.description,
                timestamp(event.starts_at),
                timestamp(event.ends_at),
                event.class_level,
                event.subject_id.map(|id| id.to_string()),
                event.created_by.map(|id| id.to_string()),
                timestamp(now),
            ],
        )?;

        Ok(event)
    }

    /// Partially updates an event. The merged window must still end after it starts.
    pub fn update_event(
        &self,
        id: Uuid,
        input: UpdateEventInput,
    ) -> Result<Option<ScheduleEvent>> {
        let conn = self.conn()?;
        let Some(existing) = query_event(&conn, id)? else {
            return Ok(None);
        };

        if let Some(Some(subject_id)) = input.subject_id {
            if query_subject(&conn, subject_id)?.is_none() {
                bail!("Subject not found");
            }
        }

        let event = ScheduleEvent {
            title: input
                .title
                .map(|s| s.trim().to_string())
                .unwrap_or(existing.title),
            description: merge_text(input.description, existing.description),
            starts_at: input.starts_at.unwrap_or(existing.starts_at),
            ends_at: input.ends_at.unwrap_or(existing.ends_at),
            class_level: merge_text(input.class_level, existing.class_level),
            subject_id: input.subject_id.unwrap_or(existing.subject_id),
            ..existing
        };
        check_window(event.starts_at, event.ends_at)?;

        conn.execute(
            "UPDATE schedule_events SET title = ?, description = ?, starts_at = ?, ends_at = ?, class_level = ?, subject_id = ?
             WHERE id = ?",
            params![
                event.title,
                event.description,
                timestamp(event.starts_at),
                timestamp(event.ends_at),
                event.class_level,
                event.subject_id.map(|id| id.to_string()),
                id.to_string(),
            ],
        )?;

        Ok(Some(event))
    }

    pub fn delete_event(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM schedule_events WHERE id = ?",
            [id.to_string()],
        )?;
        Ok(rows > 0)
    }
}

fn query_event(conn: &Connection, id: Uuid) -> Result<Option<ScheduleEvent>> {
    let event = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM schedule_events WHERE id = ?"),
            [id.to_string()],
            event_from_row,
        )
        .optional()?;
    Ok(event)
}

fn event_from_row(row: &Row) -> rusqlite::Result<ScheduleEvent> {
    Ok(ScheduleEvent {
        id: parse_uuid(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        starts_at: parse_datetime(row.get(3)?),
        ends_at: parse_datetime(row.get(4)?),
        class_level: row.get(5)?,
        subject_id: row.get::<_, Option<String>>(6)?.map(parse_uuid),
        created_by: row.get::<_, Option<String>>(7)?.map(parse_uuid),
        created_at: parse_datetime(row.get(8)?),
    })
}
