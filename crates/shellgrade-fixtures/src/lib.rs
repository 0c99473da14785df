//! Test fixtures for shellgrade.
//!
//! The `shellgrade-fake-shell` binary built by this crate is a tiny
//! deterministic shell used as the program under test; the helpers here set up
//! the directories a grading run expects.

pub mod helpers;

pub use helpers::*;
