use thiserror::Error;

/// Errors from repository operations (used by trait definitions in
/// siteflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from collaborator service calls (document intelligence,
/// advisory scoring). Nodes catch these and fold them into their own
/// output rather than propagating, so a degraded collaborator never
/// fails a workflow by itself.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("service rejected request: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn collaborator_error_display() {
        let err = CollaboratorError::InvalidResponse("not JSON".to_string());
        assert!(err.to_string().contains("not JSON"));
    }
}
