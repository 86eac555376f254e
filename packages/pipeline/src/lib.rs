//! The task governance pipeline: intercept, holistic settle-check, and
//! individual review runner. Grounded in `governance-task-intercept.py` and
//! `_holistic-settle-check.py`.

pub mod error;
pub mod flag;
pub mod intercept;
pub mod review_runner;
pub mod settle;
pub mod transcript;

pub use error::PipelineError;
pub use flag::HolisticFlag;
pub use intercept::{intercept, InterceptOutcome, TaskCreationEvent};
pub use review_runner::run_individual_review;
pub use settle::{run_settle_check, spawn_settle_check, DEFAULT_SETTLE_SECONDS, MIN_TASKS_FOR_REVIEW};
