//! Shared utilities.

pub mod atomic;
pub mod diff;
