//! Scheduling core for Huddle.
//!
//! This crate decides when recurring questions get a new round, keeps each
//! round's response checklist in sync with thread replies, and reminds
//! participants who have not answered:
//! - [`Scheduler`] ticks once a minute and dispatches the sweeps
//! - [`Engine`] owns the store, the team connections and the access tokens
//! - rounds are rendered and edited in place as replies arrive
//! - questions whose channel became unreachable are retired automatically

mod admin;
mod cron_expr;
mod engine;
mod error;
mod events;
mod lifecycle;
mod reconcile;
mod registry;
mod remind;
mod scheduler;
mod tokens;

pub use admin::{MemberChoice, QuestionForm};
pub use cron_expr::{CronError, CronExpr, is_due, is_valid, truncate_to_minute};
pub use engine::{Engine, EngineConfig};
pub use error::EngineError;
pub use events::{MessageEvent, SlashCommand};
pub use lifecycle::{ACKNOWLEDGEMENT, CELEBRATION, GREETINGS, render_round};
pub use reconcile::ReconcileReport;
pub use registry::{TeamConnection, TeamRegistry};
pub use remind::{RemindReport, reminder_text};
pub use scheduler::{DEFAULT_STARTUP_GRACE, RECONCILE_CRON, REMIND_CRON, Scheduler};
pub use tokens::TokenRegistry;
