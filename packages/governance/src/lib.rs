//! Governance store: decisions, review verdicts, governed tasks, holistic
//! reviews, and evolution proposals, persisted to SQLite.

pub mod error;
pub mod models;
pub mod store;

pub use error::GovernanceError;
pub use models::*;
pub use store::GovernanceStore;
