//! One-file-per-task JSON store with per-task-id advisory locking.

pub mod error;
pub mod lock;
pub mod manager;
pub mod models;

pub use error::TaskFileError;
pub use manager::TaskFileManager;
pub use models::{Task, TaskStatus};

/// Review-subject prefixes the pipeline uses to mark a task as a review task
/// rather than an implementation task, for loop-prevention at the intercept.
pub const REVIEW_SUBJECT_PREFIXES: &[&str] =
    &["[GOVERNANCE]", "[REVIEW]", "[SECURITY]", "[ARCHITECTURE]"];

pub fn is_review_subject(subject: &str) -> bool {
    REVIEW_SUBJECT_PREFIXES.iter().any(|p| subject.starts_with(p))
}
