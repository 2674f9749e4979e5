use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    // Input / state errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Collaborator errors (completion, search, file store)
    #[error("Service error: {0}")]
    Service(String),

    #[error("Parse error: {0}")]
    Parse(String),

    // Workflow errors
    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Workflow exceeded deadline ({0}s)")]
    DeadlineExceeded(u64),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = AgentError::Workflow("router returned unknown route 'x'".into());
        assert_eq!(
            e.to_string(),
            "Workflow error: router returned unknown route 'x'"
        );

        let e = AgentError::DeadlineExceeded(30);
        assert_eq!(e.to_string(), "Workflow exceeded deadline (30s)");
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: AgentError = err.into();
        assert!(matches!(e, AgentError::Json(_)));
    }
}
