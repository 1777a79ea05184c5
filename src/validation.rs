//! Prerequisite validation: weighted readiness checks that decide whether a
//! project may enter report generation. Validation never fails; every
//! problem becomes part of the structured result.

pub mod checks;
pub mod resources;
pub mod result;
pub mod validator;

pub use resources::{IdleResourceProbe, ResourceProbe, ResourceSnapshot};
pub use result::{CheckKind, CheckResult, ValidationResult};
pub use validator::{CheckWeights, PrerequisiteValidator, ValidateOptions, ValidatorConfig};
