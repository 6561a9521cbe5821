#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The entity exists but is not in a state that permits the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A collaborator (persistence, delivery) could not be reached. Retryable.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::NotFound`] keyed by anything displayable.
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        CoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Stable, human-readable reason carried by the error.
    ///
    /// The UI branches on these strings, so they never include ids or other
    /// per-request detail (except for `NotFound`, which names the entity).
    pub fn reason(&self) -> String {
        match self {
            CoreError::NotFound { entity, .. } => format!("{} not found", entity.to_lowercase()),
            CoreError::Validation(msg)
            | CoreError::Conflict(msg)
            | CoreError::Unauthorized(msg)
            | CoreError::Forbidden(msg)
            | CoreError::InvalidState(msg)
            | CoreError::Unavailable(msg)
            | CoreError::Internal(msg) => msg.clone(),
        }
    }

    /// Whether a caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Unavailable(_))
    }
}
