use chrono::{Duration, TimeZone, Utc};
use educonnect::db::{seed_curriculum, Database};
use educonnect::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn create_test_subject(db: &Database) -> Subject {
    db.create_subject(CreateSubjectInput {
        name: "Science".to_string(),
        class_level: "8".to_string(),
        medium: "English".to_string(),
        stream: None,
        description: None,
    })
    .expect("Failed to create subject")
}

fn create_test_chapter(db: &Database, subject_id: Uuid, number: u32) -> Chapter {
    db.create_chapter(
        subject_id,
        CreateChapterInput {
            number,
            title: format!("Chapter {}", number),
            summary: Some("A short summary".to_string()),
        },
    )
    .expect("Failed to create chapter")
}

fn create_test_user(db: &Database, name: &str, role: Role, class_level: Option<&str>) -> User {
    db.create_user(CreateUserInput {
        name: name.to_string(),
        email: format!("{}@school.test", name.to_lowercase()),
        role,
        class_level: class_level.map(str::to_string),
    })
    .expect("Failed to create user")
}

fn submit(db: &Database, student_id: Uuid) -> Submission {
    db.create_submission(CreateSubmissionInput {
        student_id,
        chapter_id: None,
        title: "Homework".to_string(),
        content: "My answers".to_string(),
    })
    .expect("Failed to create submission")
}

fn grade(db: &Database, id: Uuid, score: f64, max_score: f64) -> Submission {
    db.grade_submission(
        id,
        GradeSubmissionInput {
            score,
            max_score,
            feedback: None,
            graded_by: None,
        },
    )
    .expect("Failed to grade")
    .expect("Submission missing")
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "subjects" {
        it "creates a subject and reads it back" {
            let subject = create_test_subject(&db);

            let found = db.get_subject(subject.id).expect("Query failed").expect("Subject missing");
            assert_eq!(found.name, "Science");
            assert_eq!(found.class_level, "8");
            assert!(found.stream.is_none());
        }

        it "returns None for a missing subject" {
            assert!(db.get_subject(Uuid::new_v4()).expect("Query failed").is_none());
        }

        it "filters by class and medium" {
            create_test_subject(&db);
            db.create_subject(CreateSubjectInput {
                name: "Mathematics".to_string(),
                class_level: "10".to_string(),
                medium: "Hindi".to_string(),
                stream: Some("General".to_string()),
                description: None,
            }).expect("Failed to create");

            let class_ten = db.list_subjects(&SubjectFilter {
                class_level: Some("10".to_string()),
                ..Default::default()
            }).expect("Query failed");
            assert_eq!(class_ten.len(), 1);
            assert_eq!(class_ten[0].name, "Mathematics");

            let english = db.list_subjects(&SubjectFilter {
                medium: Some("English".to_string()),
                ..Default::default()
            }).expect("Query failed");
            assert_eq!(english.len(), 1);
            assert_eq!(english[0].name, "Science");

            assert_eq!(db.list_subjects(&SubjectFilter::default()).expect("Query failed").len(), 2);
        }

        it "applies partial updates" {
            let subject = create_test_subject(&db);

            let updated = db.update_subject(subject.id, UpdateSubjectInput {
                description: Some(Some("Physics, chemistry and biology".to_string())),
                ..Default::default()
            }).expect("Update failed").expect("Subject missing");

            assert_eq!(updated.name, "Science");
            assert_eq!(updated.description.as_deref(), Some("Physics, chemistry and biology"));
        }

        it "returns None when updating a missing subject" {
            let result = db.update_subject(Uuid::new_v4(), UpdateSubjectInput::default()).expect("Update failed");
            assert!(result.is_none());
        }

        it "cascades deletes to chapters and their content" {
            let subject = create_test_subject(&db);
            let chapter = create_test_chapter(&db, subject.id, 1);
            db.create_topic(chapter.id, CreateTopicInput {
                title: "Friction".to_string(),
                content: None,
            }).expect("Failed to create topic");

            assert!(db.delete_subject(subject.id).expect("Delete failed"));

            assert!(db.get_chapter(chapter.id).expect("Query failed").is_none());
            assert!(db.list_topics(chapter.id).expect("Query failed").is_empty());
            assert!(!db.delete_subject(subject.id).expect("Delete failed"));
        }
    }

    describe "chapters" {
        it "lists chapters ordered by number" {
            let subject = create_test_subject(&db);
            create_test_chapter(&db, subject.id, 3);
            create_test_chapter(&db, subject.id, 1);
            create_test_chapter(&db, subject.id, 2);

            let numbers: Vec<u32> = db.list_chapters(subject.id).expect("Query failed")
                .iter().map(|c| c.number).collect();
            assert_eq!(numbers, vec![1, 2, 3]);
        }

        it "rejects a duplicate chapter number as a validation error" {
            let subject = create_test_subject(&db);
            create_test_chapter(&db, subject.id, 1);

            let err = db.create_chapter(subject.id, CreateChapterInput {
                number: 1,
                title: "Again".to_string(),
                summary: None,
            }).expect_err("Duplicate number accepted");

            assert!(err.downcast_ref::<ValidationError>().is_some());
        }

        it "fails when the subject does not exist" {
            let err = db.create_chapter(Uuid::new_v4(), CreateChapterInput {
                number: 1,
                title: "Orphan".to_string(),
                summary: None,
            }).expect_err("Orphan chapter accepted");

            assert!(err.to_string().contains("not found"));
        }

        it "bundles content into the chapter detail" {
            let subject = create_test_subject(&db);
            let chapter = create_test_chapter(&db, subject.id, 1);
            db.create_topic(chapter.id, CreateTopicInput { title: "Contact forces".to_string(), content: None })
                .expect("Failed to create topic");
            db.create_topic(chapter.id, CreateTopicInput { title: "Friction".to_string(), content: None })
                .expect("Failed to create topic");
            db.create_outcome(chapter.id, CreateOutcomeInput { description: "Explain friction".to_string() })
                .expect("Failed to create outcome");
            db.create_video(chapter.id, CreateVideoInput {
                title: "Friction explained".to_string(),
                url: "https://videos.test/friction".to_string(),
                duration_seconds: Some(300),
            }).expect("Failed to create video");

            let detail = db.get_chapter_detail(chapter.id).expect("Query failed").expect("Chapter missing");

            assert_eq!(detail.chapter.id, chapter.id);
            let positions: Vec<u32> = detail.topics.iter().map(|t| t.position).collect();
            assert_eq!(positions, vec![0, 1]);
            assert_eq!(detail.topics[1].title, "Friction");
            assert_eq!(detail.learning_outcomes.len(), 1);
            assert_eq!(detail.videos[0].duration_seconds, Some(300));
        }

        it "updates topics, outcomes and videos in place" {
            let subject = create_test_subject(&db);
            let chapter = create_test_chapter(&db, subject.id, 1);
            let topic = db.create_topic(chapter.id, CreateTopicInput {
                title: "Friction".to_string(),
                content: Some("Opposes motion".to_string()),
            }).expect("Failed to create topic");
            let outcome = db.create_outcome(chapter.id, CreateOutcomeInput { description: "Explain friction".to_string() })
                .expect("Failed to create outcome");
            let video = db.create_video(chapter.id, CreateVideoInput {
                title: "Friction explained".to_string(),
                url: "https://videos.test/friction".to_string(),
                duration_seconds: Some(300),
            }).expect("Failed to create video");

            let topic = db.update_topic(topic.id, UpdateTopicInput {
                position: Some(4),
                content: Some(None),
                ..Default::default()
            }).expect("Update failed").expect("Topic missing");
            assert_eq!(topic.title, "Friction");
            assert_eq!(topic.position, 4);
            assert!(topic.content.is_none());

            let outcome = db.update_outcome(outcome.id, UpdateOutcomeInput {
                description: Some("  Measure friction  ".to_string()),
                ..Default::default()
            }).expect("Update failed").expect("Outcome missing");
            assert_eq!(outcome.description, "Measure friction");

            let video = db.update_video(video.id, UpdateVideoInput {
                duration_seconds: Some(None),
                ..Default::default()
            }).expect("Update failed").expect("Video missing");
            assert_eq!(video.url, "https://videos.test/friction");
            assert!(video.duration_seconds.is_none());

            let detail = db.get_chapter_detail(chapter.id).expect("Query failed").expect("Chapter missing");
            assert_eq!(detail.topics[0].position, 4);
            assert_eq!(detail.learning_outcomes[0].description, "Measure friction");
            assert!(detail.videos[0].duration_seconds.is_none());

            assert!(db.update_topic(Uuid::new_v4(), UpdateTopicInput::default()).expect("Update failed").is_none());
        }
    }

    describe "users" {
        it "rejects a second account with the same email" {
            create_test_user(&db, "Asha", Role::Student, Some("8"));

            let err = db.create_user(CreateUserInput {
                name: "Asha Again".to_string(),
                email: "ASHA@school.test".to_string(),
                role: Role::Teacher,
                class_level: None,
            }).expect_err("Duplicate email accepted");

            assert!(err.downcast_ref::<ValidationError>().is_some());
        }

        it "filters by role" {
            create_test_user(&db, "Asha", Role::Student, Some("8"));
            create_test_user(&db, "Ravi", Role::Teacher, None);

            let teachers = db.list_users(&UserFilter {
                role: Some(Role::Teacher),
                ..Default::default()
            }).expect("Query failed");

            assert_eq!(teachers.len(), 1);
            assert_eq!(teachers[0].name, "Ravi");
        }

        it "keeps absent fields and clears null ones on update" {
            let user = create_test_user(&db, "Asha", Role::Student, Some("8"));

            let renamed = db.update_user(user.id, UpdateUserInput {
                name: Some("Asha K".to_string()),
                ..Default::default()
            }).expect("Update failed").expect("User missing");
            assert_eq!(renamed.class_level.as_deref(), Some("8"));

            let cleared = db.update_user(user.id, UpdateUserInput {
                class_level: Some(None),
                ..Default::default()
            }).expect("Update failed").expect("User missing");
            assert_eq!(cleared.name, "Asha K");
            assert!(cleared.class_level.is_none());
        }
    }

    describe "submissions" {
        it "starts pending and becomes graded" {
            let student = create_test_user(&db, "Asha", Role::Student, Some("8"));
            let submission = submit(&db, student.id);
            assert_eq!(submission.status, SubmissionStatus::Pending);
            assert!(submission.score.is_none());

            let graded = grade(&db, submission.id, 8.0, 10.0);

            assert_eq!(graded.status, SubmissionStatus::Graded);
            assert_eq!(graded.score, Some(8.0));
            assert!(graded.graded_at.is_some());
        }

        it "allows regrading" {
            let student = create_test_user(&db, "Asha", Role::Student, Some("8"));
            let submission = submit(&db, student.id);
            grade(&db, submission.id, 4.0, 10.0);
            grade(&db, submission.id, 9.0, 10.0);

            let stored = db.get_submission(submission.id).expect("Query failed").expect("Missing");
            assert_eq!(stored.score, Some(9.0));
        }

        it "only accepts work from students" {
            let teacher = create_test_user(&db, "Ravi", Role::Teacher, None);

            let err = db.create_submission(CreateSubmissionInput {
                student_id: teacher.id,
                chapter_id: None,
                title: "Homework".to_string(),
                content: "Answers".to_string(),
            }).expect_err("Teacher submission accepted");

            assert!(err.downcast_ref::<ValidationError>().is_some());
        }

        it "only lets staff grade" {
            let student = create_test_user(&db, "Asha", Role::Student, Some("8"));
            let submission = submit(&db, student.id);

            let err = db.grade_submission(submission.id, GradeSubmissionInput {
                score: 5.0,
                max_score: 10.0,
                feedback: None,
                graded_by: Some(student.id),
            }).expect_err("Student grader accepted");

            assert!(err.downcast_ref::<ValidationError>().is_some());
        }

        it "returns None when grading a missing submission" {
            let result = db.grade_submission(Uuid::new_v4(), GradeSubmissionInput {
                score: 1.0,
                max_score: 1.0,
                feedback: None,
                graded_by: None,
            }).expect("Grade failed");
            assert!(result.is_none());
        }

        it "filters by status" {
            let student = create_test_user(&db, "Asha", Role::Student, Some("8"));
            let first = submit(&db, student.id);
            submit(&db, student.id);
            grade(&db, first.id, 5.0, 10.0);

            let pending = db.list_submissions(&SubmissionFilter {
                status: Some(SubmissionStatus::Pending),
                ..Default::default()
            }).expect("Query failed");

            assert_eq!(pending.len(), 1);
            assert_ne!(pending[0].id, first.id);
        }
    }

    describe "leaderboard" {
        it "ranks students by average percentage" {
            let asha = create_test_user(&db, "Asha", Role::Student, Some("8"));
            let ravi = create_test_user(&db, "Ravi", Role::Student, Some("8"));
            let meena = create_test_user(&db, "Meena", Role::Student, Some("9"));
            create_test_user(&db, "Idle", Role::Student, Some("8"));

            let s = submit(&db, asha.id);
            grade(&db, s.id, 6.0, 10.0);
            let s = submit(&db, asha.id);
            grade(&db, s.id, 20.0, 20.0);
            let s = submit(&db, ravi.id);
            grade(&db, s.id, 9.0, 10.0);
            let s = submit(&db, meena.id);
            grade(&db, s.id, 1.0, 2.0);
            submit(&db, meena.id);

            let board = db.leaderboard(None, 10).expect("Query failed");

            let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["Ravi", "Asha", "Meena"]);
            assert_eq!(board[0].rank, 1);
            assert_eq!(board[1].average_percent, 80.0);
            assert_eq!(board[1].graded_count, 2);
            assert_eq!(board[2].graded_count, 1);
        }

        it "filters by class and respects the limit" {
            let asha = create_test_user(&db, "Asha", Role::Student, Some("8"));
            let ravi = create_test_user(&db, "Ravi", Role::Student, Some("8"));
            let meena = create_test_user(&db, "Meena", Role::Student, Some("9"));
            for (student, score) in [(&asha, 7.0), (&ravi, 5.0), (&meena, 10.0)] {
                let s = submit(&db, student.id);
                grade(&db, s.id, score, 10.0);
            }

            let class_eight = db.leaderboard(Some("8"), 10).expect("Query failed");
            assert_eq!(class_eight.len(), 2);
            assert!(class_eight.iter().all(|e| e.class_level.as_deref() == Some("8")));

            let top = db.leaderboard(None, 1).expect("Query failed");
            assert_eq!(top.len(), 1);
            assert_eq!(top[0].name, "Meena");
        }

        it "breaks equal reported averages by graded count" {
            let amy = create_test_user(&db, "Amy", Role::Student, Some("8"));
            let zed = create_test_user(&db, "Zed", Role::Student, Some("8"));

            let s = submit(&db, amy.id);
            grade(&db, s.id, 23.0, 100.0);
            let s = submit(&db, zed.id);
            grade(&db, s.id, 0.0, 10.0);
            let s = submit(&db, zed.id);
            grade(&db, s.id, 4.6, 10.0);

            let board = db.leaderboard(None, 10).expect("Query failed");

            assert_eq!(board[0].name, "Zed");
            assert_eq!(board[0].graded_count, 2);
            assert_eq!(board[1].name, "Amy");
            assert_eq!(board[0].average_percent, board[1].average_percent);
        }
    }

    describe "schedule" {
        it "lists events overlapping a window" {
            let base = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
            for (title, start_hours, class_level) in [
                ("Assembly", 0, None),
                ("Science lab", 2, Some("8")),
                ("Maths test", 30, Some("10")),
            ] {
                db.create_event(CreateEventInput {
                    title: title.to_string(),
                    description: None,
                    starts_at: base + Duration::hours(start_hours),
                    ends_at: base + Duration::hours(start_hours + 1),
                    class_level: class_level.map(str::to_string),
                    subject_id: None,
                    created_by: None,
                }).expect("Failed to create event");
            }

            let first_day = db.list_events(&EventFilter {
                from: Some(base),
                to: Some(base + Duration::hours(24)),
                class_level: None,
            }).expect("Query failed");
            let titles: Vec<&str> = first_day.iter().map(|e| e.title.as_str()).collect();
            assert_eq!(titles, vec!["Assembly", "Science lab"]);

            let class_ten = db.list_events(&EventFilter {
                class_level: Some("10".to_string()),
                ..Default::default()
            }).expect("Query failed");
            let titles: Vec<&str> = class_ten.iter().map(|e| e.title.as_str()).collect();
            assert_eq!(titles, vec!["Assembly", "Maths test"]);
        }

        it "rejects an update that ends before it starts" {
            let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
            let event = db.create_event(CreateEventInput {
                title: "Assembly".to_string(),
                description: None,
                starts_at: start,
                ends_at: start + Duration::hours(1),
                class_level: None,
                subject_id: None,
                created_by: None,
            }).expect("Failed to create event");

            let result = db.update_event(event.id, UpdateEventInput {
                starts_at: Some(start + Duration::hours(2)),
                ..Default::default()
            });

            assert!(result.is_err());
        }
    }

    describe "import_curriculum" {
        it "imports the bundled seed once" {
            let seed = seed_curriculum().expect("Seed did not parse");

            let first = db.import_curriculum(&seed).expect("Import failed");
            assert!(first.subjects_created > 0);
            assert!(first.chapters_created > 0);

            let second = db.import_curriculum(&seed).expect("Import failed");
            assert_eq!(second.subjects_created, 0);
            assert_eq!(second.chapters_created, 0);
            assert_eq!(second.subjects_existing, first.subjects_created);
            assert_eq!(second.chapters_skipped, first.chapters_created);

            let subjects = db.list_subjects(&SubjectFilter::default()).expect("Query failed");
            assert_eq!(subjects.len(), first.subjects_created);
        }

        it "adds new chapters to an existing subject" {
            let subject = create_test_subject(&db);
            create_test_chapter(&db, subject.id, 1);

            let document: CurriculumDocument = serde_json::from_value(serde_json::json!({
                "subjects": [{
                    "name": "science",
                    "class_level": "8",
                    "medium": "English",
                    "chapters": [
                        { "number": 1, "title": "Chapter 1" },
                        { "number": 2, "title": "Force and Pressure", "learning_outcomes": ["Define pressure"] }
                    ]
                }]
            })).expect("Bad document");

            let report = db.import_curriculum(&document).expect("Import failed");

            assert_eq!(report.subjects_existing, 1);
            assert_eq!(report.chapters_created, 1);
            assert_eq!(report.chapters_skipped, 1);
            assert_eq!(report.outcomes_created, 1);
            assert_eq!(db.list_chapters(subject.id).expect("Query failed").len(), 2);
        }
    }

    describe "on-disk database" {
        it "keeps data across reopen" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("educonnect.db");

            {
                let disk = Database::open(path.clone()).expect("Failed to open");
                disk.migrate().expect("Failed to migrate");
                create_test_subject(&disk);
            }

            let reopened = Database::open(path).expect("Failed to reopen");
            reopened.migrate().expect("Failed to migrate again");
            assert_eq!(reopened.list_subjects(&SubjectFilter::default()).expect("Query failed").len(), 1);
        }
    }
}
