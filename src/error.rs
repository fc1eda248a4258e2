use thiserror::Error;

/// Errors surfaced by the rate resolution core.
#[derive(Debug, Error)]
pub enum RateError {
    /// The client-local daily call ceiling for the rate provider is spent.
    #[error("daily provider call budget exhausted, try again tomorrow")]
    BudgetExceeded,

    /// The rate provider returned a non-success status, a rate-limit notice
    /// or an error payload.
    #[error("rate provider error: {0}")]
    Provider(String),

    /// The shared backend store could not be reached or rejected a request.
    /// Read paths swallow this and fall through to the next tier.
    #[error("backend store error: {0}")]
    Backend(String),
}
