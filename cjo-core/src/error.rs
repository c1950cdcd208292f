//! Error types for cjo-core.

use thiserror::Error;

/// Result type alias using cjo-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during collective-judgment operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A dimension scorer failed after exhausting retries.
    #[error("scorer failure on dimension '{dimension}': {message}")]
    ScorerFailure { dimension: String, message: String },

    /// Too many dimension scorers failed for the judgment to be trustworthy.
    #[error("insufficient signal: {failed}/{total} dimensions failed")]
    InsufficientSignal { failed: usize, total: usize },

    /// A dog did not respond within its soft/hard vote deadline.
    #[error("voter '{dog}' timed out after {duration_ms}ms")]
    VoterTimeout { dog: String, duration_ms: u64 },

    /// The guardian dog vetoed the topic.
    #[error("guardian veto on topic '{topic}': {reason}")]
    GuardianVeto { topic: String, reason: String },

    /// The cost ledger or circuit breaker blocked an operation.
    #[error("budget exhausted for resource '{resource}'")]
    BudgetExhausted { resource: String },

    /// A persistence operation failed.
    #[error("store failure: {0}")]
    StoreFailure(String),

    /// The event bridge refused to forward an event (loop prevention).
    #[error("bus loop suppressed for key '{0}'")]
    BusLoop(String),

    /// The prompt classifier could not classify the item.
    #[error("classifier failure: {0}")]
    ClassifierFailure(String),

    /// The operation was cancelled by its caller.
    #[error("operation cancelled")]
    Cancelled,

    /// A deadline elapsed before the operation completed.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The opaque LLM adapter returned an error.
    #[error("LLM adapter error: {0}")]
    LlmAdapter(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a scorer-failure error.
    pub fn scorer_failure(dimension: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScorerFailure {
            dimension: dimension.into(),
            message: message.into(),
        }
    }

    /// Create an insufficient-signal error.
    pub fn insufficient_signal(failed: usize, total: usize) -> Self {
        Self::InsufficientSignal { failed, total }
    }

    /// Create a voter-timeout error.
    pub fn voter_timeout(dog: impl Into<String>, duration_ms: u64) -> Self {
        Self::VoterTimeout {
            dog: dog.into(),
            duration_ms,
        }
    }

    /// Create a guardian-veto error.
    pub fn guardian_veto(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GuardianVeto {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create a budget-exhausted error.
    pub fn budget_exhausted(resource: impl Into<String>) -> Self {
        Self::BudgetExhausted {
            resource: resource.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }
}
