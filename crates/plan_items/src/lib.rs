pub mod fields;
pub mod schedule;
pub mod service;

pub use crate::fields::NoteItem;
pub use crate::schedule::{build_schedule, ScheduledOccurrence};
pub use crate::service::PlannerService;
