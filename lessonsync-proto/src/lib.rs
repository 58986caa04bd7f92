//! Shared definitions for the `lessonsync` change model and its on-disk format.

pub mod change;
pub mod codec;
pub mod diff;
pub mod record;

pub use change::{Change, FileState, UserChanges};
pub use diff::calculate_changes;
pub use record::Record;
