use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the retrieval engine.
///
/// Callers that hold an `anyhow::Error` can recover the variant with
/// `err.downcast_ref::<EngineError>()` to tell bad input apart from a
/// missing artifact.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller supplied inconsistent or malformed input. Never corrected
    /// silently.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A persisted index artifact does not exist at the given path.
    #[error("index artifact not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_not_found_are_distinguishable_through_anyhow() {
        let validation: anyhow::Error = EngineError::validation("bad label").into();
        let not_found: anyhow::Error = EngineError::not_found("/tmp/missing.meta").into();

        assert!(matches!(
            validation.downcast_ref::<EngineError>(),
            Some(EngineError::Validation(_))
        ));
        assert!(matches!(
            not_found.downcast_ref::<EngineError>(),
            Some(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn display_includes_context() {
        let err = EngineError::validation("expected 3 vectors, got 2");
        assert!(err.to_string().contains("expected 3 vectors"));
    }
}
