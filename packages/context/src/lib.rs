//! Context reinforcement: per-session tool-call counting, a two-layer
//! (session-context, static-router) injection resolver, and the
//! distillation/refresh jobs that populate session context. Grounded in
//! `context-reinforcement.py`, `_distill-session-context.py`, and
//! `_update-session-context.py`.

pub mod distillation;
pub mod error;
pub mod injector;
pub mod models;
pub mod router;
pub mod settings;

pub use error::ContextError;
pub use injector::{ContextInjector, DistillationTrigger, InjectionOutcome};
pub use models::{ContextSettings, Discovery, Distillation, KeyPoint, Route, SessionContext};
