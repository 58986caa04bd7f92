//! `lessonsync` -- state synchronization for framework lessons.
//!
//! A framework lesson is a sequence of tasks sharing one task directory. As
//! the learner moves between tasks, the files they edited are captured as a
//! change log per task, and the directory is rewritten to the target task's
//! last known state.

pub mod config;
pub mod lesson;
pub mod workspace;
