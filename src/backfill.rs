//! Batch backfill of initial reports for projects that never got one.

pub mod priority;
pub mod scheduler;
pub mod summary;

pub use priority::{candidate_order, Candidate, PriorityTier, ScoreBreakdown};
pub use scheduler::{BackfillConfig, BackfillOptions, BatchBackfillScheduler};
pub use summary::{BatchSummary, ProcessingResult, ProcessingSummary, ProjectOutcome, TierCounts};
