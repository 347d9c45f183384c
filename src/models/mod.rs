//! Domain models for EduConnect.
//!
//! # Core Concepts
//!
//! ## Curriculum
//!
//! Content is organized as class → medium/stream → subject → chapter, with
//! each chapter holding topics, learning outcomes and videos.
//!
//! - [`Subject`]: one subject for one class and medium of instruction.
//! - [`Chapter`]: numbered unit of a subject. [`ChapterDetail`] bundles its content.
//! - [`Topic`], [`LearningOutcome`], [`Video`]: chapter content.
//!
//! ## People and work
//!
//! - [`User`]: an account with a [`Role`] (student, teacher or admin).
//! - [`Submission`]: student work that teachers grade.
//! - [`ScheduleEvent`]: timetable entries, optionally scoped to a class.
//!
//! Every `Create*Input` / `Update*Input` implements [`Validate`], which the
//! API runs before touching the database.

mod curriculum;
mod schedule;
mod submission;
mod user;
mod validation;

pub use curriculum::*;
pub use schedule::*;
pub use submission::*;
pub use user::*;
pub use validation::*;
