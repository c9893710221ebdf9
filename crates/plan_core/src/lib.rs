pub mod codec;
pub mod complete;
pub mod expand;
pub mod preset;
pub mod rule;

pub use crate::complete::CompletionRecord;
pub use crate::expand::{expand, Occurrence};
pub use crate::rule::{Frequency, RecurrenceRule};
