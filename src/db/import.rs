use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::curriculum::{insert_chapter, insert_outcome, insert_subject, insert_topic, insert_video};
use super::{parse_uuid, Database};
use crate::models::*;

const SEED_CURRICULUM: &str = include_str!("seed/curriculum.json");

/// The curriculum bundled with the binary, used when the migration trigger
/// is called without a document.
pub fn seed_curriculum() -> Result<CurriculumDocument> {
    serde_json::from_str(SEED_CURRICULUM).context("Bundled seed curriculum is not valid JSON")
}

impl Database {
    /// Loads a nested curriculum document in a single transaction.
    ///
    /// Subjects are matched on name, class and medium (case-insensitive), and
    /// chapters on their number within the subject. Matched records are left
    /// untouched, so importing the same document twice inserts nothing the
    /// second time.
    pub fn import_curriculum(&self, document: &CurriculumDocument) -> Result<ImportReport> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut report = ImportReport::default();

        for subject_doc in &document.subjects {
            let subject_id = match find_subject(&tx, subject_doc)? {
                Some(id) => {
                    report.subjects_existing += 1;
                    id
                }
                None => {
                    report.subjects_created += 1;
                    insert_subject(
                        &tx,
                        CreateSubjectInput {
                            name: subject_doc.name.clone(),
                            class_level: subject_doc.class_level.clone(),
                            medium: subject_doc.medium.clone(),
                            stream: subject_doc.stream.clone(),
                            description: subject_doc.description.clone(),
                        },
                    )?
                    .id
                }
            };

            for chapter_doc in &subject_doc.chapters {
                if chapter_number_taken(&tx, subject_id, chapter_doc.number)? {
                    report.chapters_skipped += 1;
                    continue;
                }

                let chapter = insert_chapter(
                    &tx,
                    subject_id,
                    CreateChapterInput {
                        number: chapter_doc.number,
                        title: chapter_doc.title.clone(),
                        summary: chapter_doc.summary.clone(),
                    },
                )?;
                report.chapters_created += 1;

                for topic in &chapter_doc.topics {
                    insert_topic(&tx, chapter.id, topic.clone())?;
                    report.topics_created += 1;
                }
                for outcome in &chapter_doc.learning_outcomes {
                    insert_outcome(
                        &tx,
                        chapter.id,
                        CreateOutcomeInput {
                            description: outcome.clone(),
                        },
                    )?;
                    report.outcomes_created += 1;
                }
                for video in &chapter_doc.videos {
                    insert_video(&tx, chapter.id, video.clone())?;
                    report.videos_created += 1;
                }
            }
        }

        tx.commit()?;

        tracing::info!(
            "Imported curriculum: {} new subjects, {} new chapters, {} chapters skipped",
            report.subjects_created,
            report.chapters_created,
            report.chapters_skipped
        );

        Ok(report)
    }
}

fn find_subject(conn: &Connection, doc: &SubjectDocument) -> Result<Option<Uuid>> {
    let id = conn
        .query_row(
            "SELECT id FROM subjects
             WHERE name = ?1 COLLATE NOCASE
               AND class_level = ?2
               AND medium = ?3 COLLATE NOCASE",
            params![doc.name.trim(), doc.class_level.trim(), doc.medium.trim()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(id.map(parse_uuid))
}

fn chapter_number_taken(conn: &Connection, subject_id: Uuid, number: u32) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chapters WHERE subject_id = ? AND number = ?",
        params![subject_id.to_string(), number],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
