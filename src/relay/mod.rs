//! Data Relay Module
//!
//! One session per accepted client, two copy loops per session.

pub mod copy;
pub mod session;

pub use copy::{copy_direction, CopyOutcome, CopyStats, Direction};
pub use session::RelaySession;
