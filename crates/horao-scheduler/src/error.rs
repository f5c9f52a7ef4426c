//! Errors the scheduler's admission algorithm can raise.

/// All variants are validation failures: surfaced to the caller, never
/// retried by the scheduler itself.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The reservation's summed resources exceed the tenant's `Constraint`
    /// in at least one dimension.
    #[error("{0}")]
    TenantLimitExceeded(String),
    /// The reservation's summed resources exceed the remaining
    /// infrastructure capacity (after subtracting overlapping claims) in
    /// at least one dimension.
    #[error("{0}")]
    InfrastructureLimitExceeded(String),
    /// No start date was given and the `DynamicStart` feature is disabled.
    #[error("Claim cannot be realised, no start date specified and dynamic start not enabled")]
    NoStartDate,
    /// Dynamic-start scan exhausted the planning window without finding a
    /// fit.
    #[error("Claim cannot be realised")]
    ClaimCannotBeRealised,
}
