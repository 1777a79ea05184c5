//! Initial report generation: single-flight coordination, validation with
//! auto-repair, and bounded retries around the report builder.

pub mod coordinator;
pub mod in_flight;
pub mod repair;
pub mod requirements;

pub use coordinator::{CoordinatorConfig, GenerationCoordinator, GenerationResult, GenerationService};
pub use in_flight::{Admission, InFlightGuard, InFlightRegistry};
pub use repair::{auto_repair, RepairOutcome};
pub use requirements::{
    backoff_delay, GenerationContext, GenerationRequirements, Priority, RequestOrigin,
};
