pub mod cache;
pub mod date;
pub mod error;
pub mod habit;
pub mod ledger;
pub mod performance;
pub mod recurrence;
pub mod service;
pub mod sink;
pub mod streak;
pub mod window;

pub use crate::error::HabitError;
pub use crate::habit::{Habit, HabitId, HabitRecord};
pub use crate::ledger::{CompletionLedger, CompletionRecord};
pub use crate::service::{HabitSession, HabitSessionBuilder};
