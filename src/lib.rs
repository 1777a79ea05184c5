//! benchline: initial comparative report generation
//!
//! Validates that a project is ready for its first comparative report,
//! generates that report at most once per project with retries and
//! templated fallback, builds it peer-chunk by peer-chunk under fixed
//! memory and size ceilings, and backfills projects that never got one.

pub mod backfill;
pub mod cli;
pub mod config;
pub mod delay;
pub mod error;
pub mod generation;
pub mod logging;
pub mod model;
pub mod provider;
pub mod report;
pub mod store;
pub mod types;
pub mod validation;
