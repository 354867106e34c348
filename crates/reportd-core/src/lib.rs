//! Core domain types, configuration, and errors for reportd.

pub mod config;
pub mod error;
pub mod report;

pub use error::{ReportdError, Result};
