//! Property-based tests for scoring and size guarantees

mod priority;
mod truncation;
