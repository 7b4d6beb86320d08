//! Test infrastructure for the search compiler.
//!
//! Fixtures build populated SQLite mailboxes; the harness wraps a backend to
//! record statements and override its capabilities.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod harness;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
pub use harness::*;
