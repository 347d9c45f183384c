use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::users::query_user;
use super::{parse_datetime, parse_uuid, timestamp, Database};
use crate::models::*;

const SUBMISSION_COLUMNS: &str = "id, student_id, chapter_id, title, content, status, score, max_score, feedback, graded_by, submitted_at, graded_at";

impl Database {
    /// Submissions matching every set filter, newest first.
    pub fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions
             WHERE (?1 IS NULL OR student_id = ?1)
               AND (?2 IS NULL OR chapter_id = ?2)
               AND (?3 IS NULL OR status = ?3)
             ORDER BY submitted_at DESC"
        ))?;

        let submissions = stmt
            .query_map(
                params![
                    filter.student_id.map(|id| id.to_string()),
                    filter.chapter_id.map(|id| id.to_string()),
                    filter.status.map(|s| s.as_str()),
                ],
                submission_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(submissions)
    }

    pub fn get_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        let conn = self.conn()?;
        query_submission(&conn, id)
    }

    /// Records new student work as `Pending`.
    ///
    /// The submitter must be a student, and the chapter, when given, must exist.
    pub fn create_submission(&self, input: CreateSubmissionInput) -> Result<Submission> {
        let conn = self.conn()?;

        match query_user(&conn, input.student_id)? {
            Some(user) if user.role == Role::Student => {}
            Some(_) => {
                return Err(ValidationError::Invalid(
                    "Only students can hand in submissions".to_string(),
                )
                .into())
            }
            None => bail!("Student not found"),
        }

        if let Some(chapter_id) = input.chapter_id {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chapters WHERE id = ?",
                [chapter_id.to_string()],
                |row| row.get(0),
            )?;
            if count == 0 {
                bail!("Chapter not found");
            }
        }

        let now = Utc::now();
        let submission = Submission {
            id: Uuid::new_v4(),
            student_id: input.student_id,
            chapter_id: input.chapter_id,
            title: input.title.trim().to_string(),
            content: input.content,
            status: SubmissionStatus::Pending,
            score: None,
            max_score: None,
            feedback: None,
            graded_by: None,
            submitted_at: now,
            graded_at: None,
        };

        conn.execute(
            "INSERT INTO submissions (id, student_id, chapter_id, title, content, status, submitted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                submission.id.to_string(),
                submission.student_id.to_string(),
                submission.chapter_id.map(|id| id.to_string()),
                submission.title,
                submission.content,
                submission.status.as_str(),
                timestamp(now),
            ],
        )?;

        Ok(submission)
    }

    /// Grades (or regrades) a submission. Returns `None` if it does not exist.
    pub fn grade_submission(
        &self,
        id: Uuid,
        input: GradeSubmissionInput,
    ) -> Result<Option<Submission>> {
        let conn = self.conn()?;
        let Some(existing) = query_submission(&conn, id)? else {
            return Ok(None);
        };

        if let Some(grader_id) = input.graded_by {
            match query_user(&conn, grader_id)? {
                Some(user) if user.role.is_staff() => {}
                Some(_) => {
                    return Err(ValidationError::Invalid(
                        "Only teachers and admins can grade submissions".to_string(),
                    )
                    .into())
                }
                None => bail!("Grader not found"),
            }
        }

        let now = Utc::now();
        let submission = Submission {
            status: SubmissionStatus::Graded,
            score: Some(input.score),
            max_score: Some(input.max_score),
            feedback: input
                .feedback
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            graded_by: input.graded_by,
            graded_at: Some(now),
            ..existing
        };

        conn.execute(
            "UPDATE submissions SET status = ?, score = ?, max_score = ?, feedback = ?, graded_by = ?, graded_at = ?
             WHERE id = ?",
            params![
                submission.status.as_str(),
                submission.score,
                submission.max_score,
                submission.feedback,
                submission.graded_by.map(|id| id.to_string()),
                timestamp(now),
                id.to_string(),
            ],
        )?;

        tracing::debug!(
            "Graded submission {} at {}/{}",
            id,
            input.score,
            input.max_score
        );

        Ok(Some(submission))
    }

    pub fn delete_submission(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM submissions WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    /// Students ranked by their mean graded percentage.
    ///
    /// Students without graded work are left out. Averages are compared as
    /// reported (two decimals), so ties go to the student with more graded
    /// submissions, then alphabetically.
    pub fn leaderboard(
        &self,
        class_level: Option<&str>,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT u.id, u.name, u.class_level, COUNT(s.id) AS graded,
                    ROUND(AVG(s.score * 100.0 / s.max_score), 2) AS average
             FROM users u
             JOIN submissions s ON s.student_id = u.id
             WHERE u.role = 'student'
               AND s.status = 'graded'
               AND s.max_score > 0
               AND (?1 IS NULL OR u.class_level = ?1)
             GROUP BY u.id, u.name, u.class_level
             ORDER BY average DESC, graded DESC, u.name
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![class_level, limit as i64], |row| {
                Ok((
                    parse_uuid(row.get(0)?),
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let entries = rows
            .into_iter()
            .enumerate()
            .map(
                |(i, (student_id, name, class_level, graded, average))| LeaderboardEntry {
                    rank: i + 1,
                    student_id,
                    name,
                    class_level,
                    graded_count: graded as usize,
                    average_percent: average,
                },
            )
            .collect();

        Ok(entries)
    }
}

fn query_submission(conn: &Connection, id: Uuid) -> Result<Option<Submission>> {
    let submission = conn
        .query_row(
            &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?"),
            [id.to_string()],
            submission_from_row,
        )
        .optional()?;
    Ok(submission)
}

fn submission_from_row(row: &Row) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: parse_uuid(row.get(0)?),
        student_id: parse_uuid(row.get(1)?),
        chapter_id: row.get::<_, Option<String>>(2)?.map(parse_uuid),
        title: row.get(3)?,
        content: row.get(4)?,
        status: SubmissionStatus::from_str(&row.get::<_, String>(5)?)
            .unwrap_or(SubmissionStatus::Pending),
        score: row.get(6)?,
        max_score: row.get(7)?,
        feedback: row.get(8)?,
        graded_by: row.get::<_, Option<String>>(9)?.map(parse_uuid),
        submitted_at: parse_datetime(row.get(10)?),
        graded_at: row.get::<_, Option<String>>(11)?.map(parse_datetime),
    })
}
