//! Core module: the read-aloud runtime.
//!
//! - `events`: reader state and event types
//! - `interrupt`: Ctrl+C handling
//! - `reader`: streaming read-aloud coordinator

pub mod events;
pub mod interrupt;
pub mod reader;
