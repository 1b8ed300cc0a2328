use std::time::Duration;

use markup_guard::MarkupError;
use thiserror::Error;

/// Error types for the translation pipeline
#[derive(Debug, Error)]
pub enum MtError {
    /// Masking, tokenization or reinsertion failed
    #[error(transparent)]
    Markup(#[from] MarkupError),

    /// The engine reported a failure
    #[error("Translation error: {0}")]
    Engine(String),

    /// The engine did not answer in time
    #[error("Translation engine '{engine}' timed out after {after:?}")]
    Timeout { engine: String, after: Duration },

    /// The reinsertion strategy needs metadata the engine did not report
    #[error("Engine output has no {0}, which markup reinsertion requires")]
    MissingMetadata(&'static str),
}

/// Result type for pipeline operations
pub type MtResult<T> = Result<T, MtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_errors_convert() {
        fn fails() -> MtResult<()> {
            let markup: Result<(), MarkupError> =
                Err(MarkupError::MalformedMarkup("</b> without opening tag".to_string()));
            markup?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, MtError::Markup(MarkupError::MalformedMarkup(_))));
        assert_eq!(err.to_string(), "Malformed markup: </b> without opening tag");
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            MtError::MissingMetadata("alignment").to_string(),
            "Engine output has no alignment, which markup reinsertion requires"
        );
        assert_eq!(MtError::Engine("boom".to_string()).to_string(), "Translation error: boom");
    }
}
