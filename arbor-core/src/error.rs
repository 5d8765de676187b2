use thiserror::Error;

/// Precondition failures surfaced to the caller before any mutation
/// happens; the plant is left untouched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GrowthError {
    #[error("no soil field attached to the plant")]
    MissingSoil,
    #[error("no light field attached to the plant")]
    MissingClimate,
}
