//! Error taxonomy shared by the plan service and action layers.

/// Errors returned by plan operations.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Input failed validation before anything touched the database.
    #[error("{0}")]
    Validation(String),

    /// A referenced user, workout, or selection does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The database layer failed.
    #[error("{0:#}")]
    Store(#[from] anyhow::Error),
}

impl PlanError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type Result<T, E = PlanError> = std::result::Result<T, E>;
