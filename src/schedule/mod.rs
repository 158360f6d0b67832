//! # Advisory timeline.
//!
//! [`build_timeline`] turns an [`ExecutionOrder`](crate::ExecutionOrder) into
//! [`ScheduleSlot`]s for display and telemetry. Actual dispatch always follows
//! the execution order and dependency completion, never these offsets.

mod timeline;

pub use timeline::{ScheduleSlot, build_timeline};
