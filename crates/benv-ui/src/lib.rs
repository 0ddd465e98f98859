//! Terminal UI helpers for benv.
//!
//! This crate provides consistent output formatting, spinners, progress
//! bars and error display for the benv CLI.

pub mod output;
pub mod spinner;
pub mod style;

pub use output::{Output, Verbosity};
pub use spinner::{Progress, Spinner};
pub use style::Style;
