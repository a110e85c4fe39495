use std::fmt;

/// Domain failures that callers are expected to branch on. Carried inside
/// `anyhow::Error` and recovered with `downcast_ref` at the HTTP boundary,
/// where NotFound maps to 404 and InvalidState to 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    NotFound { entity: &'static str, id: String },
    InvalidState { detail: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(detail: impl Into<String>) -> Self {
        DomainError::InvalidState {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            DomainError::InvalidState { detail } => write!(f, "invalid state: {detail}"),
        }
    }
}

impl std::error::Error for DomainError {}
