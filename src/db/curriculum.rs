use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{clean, merge_text, parse_datetime, parse_uuid, timestamp, Database};
use crate::models::*;

const SUBJECT_COLUMNS: &str =
    "id, name, class_level, medium, stream, description, created_at, updated_at";
const CHAPTER_COLUMNS: &str = "id, subject_id, number, title, summary, created_at, updated_at";
const TOPIC_COLUMNS: &str = "id, chapter_id, title, content, position, created_at";
const OUTCOME_COLUMNS: &str = "id, chapter_id, description, position, created_at";
const VIDEO_COLUMNS: &str = "id, chapter_id, title, url, duration_seconds, created_at";

impl Database {
    // ============================================================
    // Subjects
    // ============================================================

    /// Subjects matching every set filter, ordered by class then name.
    pub fn list_subjects(&self, filter: &SubjectFilter) -> Result<Vec<Subject>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects
             WHERE (?1 IS NULL OR class_level = ?1)
               AND (?2 IS NULL OR medium = ?2 COLLATE NOCASE)
               AND (?3 IS NULL OR stream = ?3 COLLATE NOCASE)
             ORDER BY class_level, name"
        ))?;

        let subjects = stmt
            .query_map(
                params![filter.class_level, filter.medium, filter.stream],
                subject_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(subjects)
    }

    pub fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
        let conn = self.conn()?;
        query_subject(&conn, id)
    }

    pub fn create_subject(&self, input: CreateSubjectInput) -> Result<Subject> {
        let conn = self.conn()?;
        insert_subject(&conn, input)
    }

    pub fn update_subject(&self, id: Uuid, input: UpdateSubjectInput) -> Result<Option<Subject>> {
        let conn = self.conn()?;
        let Some(existing) = query_subject(&conn, id)? else {
            return Ok(None);
        };

        let now = Utc::now();
        let subject = Subject {
            id,
            name: input.name.map(|s| s.trim().to_string()).unwrap_or(existing.name),
            class_level: input
                .class_level
                .map(|s| s.trim().to_string())
                .unwrap_or(existing.class_level),
            medium: input
                .medium
                .map(|s| s.trim().to_string())
                .unwrap_or(existing.medium),
            stream: merge_text(input.stream, existing.stream),
            description: merge_text(input.description, existing.description),
            created_at: existing.created_at,
            updated_at: now,
        };

        conn.execute(
            "UPDATE subjects SET name = ?, class_level = ?, medium = ?, stream = ?, description = ?, updated_at = ?
             WHERE id = ?",
            params![
                subject.name,
                subject.class_level,
                subject.medium,
                subject.stream,
                subject.description,
                timestamp(now),
                id.to_string(),
            ],
        )?;

        Ok(Some(subject))
    }

    /// Deletes the subject and, through cascading keys, its chapters and their content.
    pub fn delete_subject(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM subjects WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Chapters
    // ============================================================

    pub fn list_chapters(&self, subject_id: Uuid) -> Result<Vec<Chapter>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE subject_id = ? ORDER BY number"
        ))?;

        let chapters = stmt
            .query_map([subject_id.to_string()], chapter_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(chapters)
    }

    pub fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>> {
        let conn = self.conn()?;
        query_chapter(&conn, id)
    }

    /// A chapter together with its topics, learning outcomes and videos.
    ///
    /// Read under one lock so a concurrent delete cannot split the result.
    pub fn get_chapter_detail(&self, id: Uuid) -> Result<Option<ChapterDetail>> {
        let conn = self.conn()?;
        let Some(chapter) = query_chapter(&conn, id)? else {
            return Ok(None);
        };

        Ok(Some(ChapterDetail {
            topics: query_topics(&conn, id)?,
            learning_outcomes: query_outcomes(&conn, id)?,
            videos: query_videos(&conn, id)?,
            chapter,
        }))
    }

    pub fn create_chapter(&self, subject_id: Uuid, input: CreateChapterInput) -> Result<Chapter> {
        let conn = self.conn()?;
        insert_chapter(&conn, subject_id, input)
    }

    pub fn update_chapter(&self, id: Uuid, input: UpdateChapterInput) -> Result<Option<Chapter>> {
        let conn = self.conn()?;
        let Some(existing) = query_chapter(&conn, id)? else {
            return Ok(None);
        };

        let number = input.number.unwrap_or(existing.number);
        if number != existing.number {
            ensure_chapter_number_free(&conn, existing.subject_id, number)?;
        }

        let now = Utc::now();
        let chapter = Chapter {
            id,
            subject_id: existing.subject_id,
            number,
            title: input
                .title
                .map(|s| s.trim().to_string())
                .unwrap_or(existing.title),
            summary: merge_text(input.summary, existing.summary),
            created_at: existing.created_at,
            updated_at: now,
        };

        conn.execute(
            "UPDATE chapters SET number = ?, title = ?, summary = ?, updated_at = ? WHERE id = ?",
            params![
                chapter.number,
                chapter.title,
                chapter.summary,
                timestamp(now),
                id.to_string(),
            ],
        )?;

        Ok(Some(chapter))
    }

    pub fn delete_chapter(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM chapters WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Topics
    // ============================================================

    pub fn list_topics(&self, chapter_id: Uuid) -> Result<Vec<Topic>> {
        let conn = self.conn()?;
        query_topics(&conn, chapter_id)
    }

    pub fn create_topic(&self, chapter_id: Uuid, input: CreateTopicInput) -> Result<Topic> {
        let conn = self.conn()?;
        insert_topic(&conn, chapter_id, input)
    }

    pub fn update_topic(&self, id: Uuid, input: UpdateTopicInput) -> Result<Option<Topic>> {
        let conn = self.conn()?;
        let existing = conn
            .query_row(
                &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?"),
                [id.to_string()],
                topic_from_row,
            )
            .optional()?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let topic = Topic {
            title: input
                .title
                .map(|s| s.trim().to_string())
                .unwrap_or(existing.title),
            content: merge_text(input.content, existing.content),
            position: input.position.unwrap_or(existing.position),
            ..existing
        };

        conn.execute(
            "UPDATE topics SET title = ?, content = ?, position = ? WHERE id = ?",
            params![topic.title, topic.content, topic.position, id.to_string()],
        )?;

        Ok(Some(topic))
    }

    pub fn delete_topic(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM topics WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Learning outcomes
    // ============================================================

    pub fn list_outcomes(&self, chapter_id: Uuid) -> Result<Vec<LearningOutcome>> {
        let conn = self.conn()?;
        query_outcomes(&conn, chapter_id)
    }

    pub fn create_outcome(
        &self,
        chapter_id: Uuid,
        input: CreateOutcomeInput,
    ) -> Result<LearningOutcome> {
        let conn = self.conn()?;
        insert_outcome(&conn, chapter_id, input)
    }

    pub fn update_outcome(
        &self,
        id: Uuid,
        input: UpdateOutcomeInput,
    ) -> Result<Option<LearningOutcome>> {
        let conn = self.conn()?;
        let existing = conn
            .query_row(
                &format!("SELECT {OUTCOME_COLUMNS} FROM learning_outcomes WHERE id = ?"),
                [id.to_string()],
                outcome_from_row,
            )
            .optional()?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let outcome = LearningOutcome {
            description: input
                .description
                .map(|s| s.trim().to_string())
                .unwrap_or(existing.description),
            position: input.position.unwrap_or(existing.position),
            ..existing
        };

        conn.execute(
            "UPDATE learning_outcomes SET description = ?, position = ? WHERE id = ?",
            params![outcome.description, outcome.position, id.to_string()],
        )?;

        Ok(Some(outcome))
    }

    pub fn delete_outcome(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM learning_outcomes WHERE id = ?",
            [id.to_string()],
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Videos
    // ============================================================

    pub fn list_videos(&self, chapter_id: Uuid) -> Result<Vec<Video>> {
        let conn = self.conn()?;
        query_videos(&conn, chapter_id)
    }

    pub fn create_video(&self, chapter_id: Uuid, input: CreateVideoInput) -> Result<Video> {
        let conn = self.conn()?;
        insert_video(&conn, chapter_id, input)
    }

    pub fn update_video(&self, id: Uuid, input: UpdateVideoInput) -> Result<Option<Video>> {
        let conn = self.conn()?;
        let existing = conn
            .query_row(
                &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"),
                [id.to_string()],
                video_from_row,
            )
            .optional()?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let video = Video {
            title: input
                .title
                .map(|s| s.trim().to_string())
                .unwrap_or(existing.title),
            url: input.url.map(|s| s.trim().to_string()).unwrap_or(existing.url),
            duration_seconds: input.duration_seconds.unwrap_or(existing.duration_seconds),
            ..existing
        };

        conn.execute(
            "UPDATE videos SET title = ?, url = ?, duration_seconds = ? WHERE id = ?",
            params![video.title, video.url, video.duration_seconds, id.to_string()],
        )?;

        Ok(Some(video))
    }

    pub fn delete_video(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM videos WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }
}

// ============================================================
// Connection-level helpers (shared with the curriculum importer)
// ============================================================

pub(super) fn query_subject(conn: &Connection, id: Uuid) -> Result<Option<Subject>> {
    let subject = conn
        .query_row(
            &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?"),
            [id.to_string()],
            subject_from_row,
        )
        .optional()?;
    Ok(subject)
}

pub(super) fn query_chapter(conn: &Connection, id: Uuid) -> Result<Option<Chapter>> {
    let chapter = conn
        .query_row(
            &format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = ?"),
            [id.to_string()],
            chapter_from_row,
        )
        .optional()?;
    Ok(chapter)
}

fn query_topics(conn: &Connection, chapter_id: Uuid) -> Result<Vec<Topic>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TOPIC_COLUMNS} FROM topics WHERE chapter_id = ? ORDER BY position, created_at"
    ))?;

    let topics = stmt
        .query_map([chapter_id.to_string()], topic_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(topics)
}

fn query_outcomes(conn: &Connection, chapter_id: Uuid) -> Result<Vec<LearningOutcome>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OUTCOME_COLUMNS} FROM learning_outcomes WHERE chapter_id = ?
         ORDER BY position, created_at"
    ))?;

    let outcomes = stmt
        .query_map([chapter_id.to_string()], outcome_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(outcomes)
}

fn query_videos(conn: &Connection, chapter_id: Uuid) -> Result<Vec<Video>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE chapter_id = ? ORDER BY created_at, title"
    ))?;

    let videos = stmt
        .query_map([chapter_id.to_string()], video_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(videos)
}

pub(super) fn insert_subject(conn: &Connection, input: CreateSubjectInput) -> Result<Subject> {
    let now = Utc::now();
    let subject = Subject {
        id: Uuid::new_v4(),
        name: input.name.trim().to_string(),
        class_level: input.class_level.trim().to_string(),
        medium: input.medium.trim().to_string(),
        stream: clean(input.stream),
        description: clean(input.description),
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO subjects (id, name, class_level, medium, stream, description, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            subject.id.to_string(),
            subject.name,
            subject.class_level,
            subject.medium,
            subject.stream,
            subject.description,
            timestamp(now),
            timestamp(now),
        ],
    )?;

    Ok(subject)
}

pub(super) fn insert_chapter(
    conn: &Connection,
    subject_id: Uuid,
    input: CreateChapterInput,
) -> Result<Chapter> {
    if query_subject(conn, subject_id)?.is_none() {
        bail!("Subject not found");
    }
    ensure_chapter_number_free(conn, subject_id, input.number)?;

    let now = Utc::now();
    let chapter = Chapter {
        id: Uuid::new_v4(),
        subject_id,
        number: input.number,
        title: input.title.trim().to_string(),
        summary: clean(input.summary),
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO chapters (id, subject_id, number, title, summary, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            chapter.id.to_string(),
            subject_id.to_string(),
            chapter.number,
            chapter.title,
            chapter.summary,
            timestamp(now),
            timestamp(now),
        ],
    )?;

    Ok(chapter)
}

pub(super) fn insert_topic(
    conn: &Connection,
    chapter_id: Uuid,
    input: CreateTopicInput,
) -> Result<Topic> {
    ensure_chapter_exists(conn, chapter_id)?;

    let now = Utc::now();
    let topic = Topic {
        id: Uuid::new_v4(),
        chapter_id,
        title: input.title.trim().to_string(),
        content: clean(input.content),
        position: next_position(conn, "topics", chapter_id)?,
        created_at: now,
    };

    conn.execute(
        "INSERT INTO topics (id, chapter_id, title, content, position, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            topic.id.to_string(),
            chapter_id.to_string(),
            topic.title,
            topic.content,
            topic.position,
            timestamp(now),
        ],
    )?;

    Ok(topic)
}

pub(super) fn insert_outcome(
    conn: &Connection,
    chapter_id: Uuid,
    input: CreateOutcomeInput,
) -> Result<LearningOutcome> {
    ensure_chapter_exists(conn, chapter_id)?;

    let now = Utc::now();
    let outcome = LearningOutcome {
        id: Uuid::new_v4(),
        chapter_id,
        description: input.description.trim().to_string(),
        position: next_position(conn, "learning_outcomes", chapter_id)?,
        created_at: now,
    };

    conn.execute(
        "INSERT INTO learning_outcomes (id, chapter_id, description, position, created_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
            outcome.id.to_string(),
            chapter_id.to_string(),
            outcome.description,
            outcome.position,
            timestamp(now),
        ],
    )?;

    Ok(outcome)
}

pub(super) fn insert_video(
    conn: &Connection,
    chapter_id: Uuid,
    input: CreateVideoInput,
) -> Result<Video> {
    ensure_chapter_exists(conn, chapter_id)?;

    let now = Utc::now();
    let video = Video {
        id: Uuid::new_v4(),
        chapter_id,
        title: input.title.trim().to_string(),
        url: input.url.trim().to_string(),
        duration_seconds: input.duration_seconds,
        created_at: now,
    };

    conn.execute(
        "INSERT INTO videos (id, chapter_id, title, url, duration_seconds, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            video.id.to_string(),
            chapter_id.to_string(),
            video.title,
            video.url,
            video.duration_seconds,
            timestamp(now),
        ],
    )?;

    Ok(video)
}

fn ensure_chapter_exists(conn: &Connection, chapter_id: Uuid) -> Result<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chapters WHERE id = ?",
        [chapter_id.to_string()],
        |row| row.get(0),
    )?;
    if count == 0 {
        bail!("Chapter not found");
    }
    Ok(())
}

fn ensure_chapter_number_free(conn: &Connection, subject_id: Uuid, number: u32) -> Result<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chapters WHERE subject_id = ? AND number = ?",
        params![subject_id.to_string(), number],
        |row| row.get(0),
    )?;
    if count > 0 {
        return Err(ValidationError::Invalid(format!(
            "Chapter {} already exists in this subject",
            number
        ))
        .into());
    }
    Ok(())
}

/// Next free position within a chapter; `table` is one of the ordered content tables.
fn next_position(conn: &Connection, table: &str, chapter_id: Uuid) -> Result<u32> {
    let position = conn.query_row(
        &format!("SELECT COALESCE(MAX(position) + 1, 0) FROM {table} WHERE chapter_id = ?"),
        [chapter_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(position)
}

// ============================================================
// Row mapping
// ============================================================

fn subject_from_row(row: &Row) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: parse_uuid(row.get(0)?),
        name: row.get(1)?,
        class_level: row.get(2)?,
        medium: row.get(3)?,
        stream: row.get(4)?,
        description: row.get(5)?,
        created_at: parse_datetime(row.get(6)?),
        updated_at: parse_datetime(row.get(7)?),
    })
}

fn chapter_from_row(row: &Row) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: parse_uuid(row.get(0)?),
        subject_id: parse_uuid(row.get(1)?),
        number: row.get(2)?,
        title: row.get(3)?,
        summary: row.get(4)?,
        created_at: parse_datetime(row.get(5)?),
        updated_at: parse_datetime(row.get(6)?),
    })
}

fn topic_from_row(row: &Row) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: parse_uuid(row.get(0)?),
        chapter_id: parse_uuid(row.get(1)?),
        title: row.get(2)?,
        content: row.get(3)?,
        position: row.get(4)?,
        created_at: parse_datetime(row.get(5)?),
    })
}

fn outcome_from_row(row: &Row) -> rusqlite::Result<LearningOutcome> {
    Ok(LearningOutcome {
        id: parse_uuid(row.get(0)?),
        chapter_id: parse_uuid(row.get(1)?),
        description: row.get(2)?,
        position: row.get(3)?,
        created_at: parse_datetime(row.get(4)?),
    })
}

fn video_from_row(row: &Row) -> rusqlite::Result<Video> {
    Ok(Video {
        id: parse_uuid(row.get(0)?),
        chapter_id: parse_uuid(row.get(1)?),
        title: row.get(2)?,
        url: row.get(3)?,
        duration_seconds: row.get(4)?,
        created_at: parse_datetime(row.get(5)?),
    })
}
