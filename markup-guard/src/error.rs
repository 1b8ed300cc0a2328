//! Error types for masking, markup tokenization and reinsertion
use thiserror::Error;

/// Everything that can go wrong while protecting or restoring markup
///
/// Only configuration problems are fatal. Positional problems (a placeholder
/// that cannot be traced through the alignment, a tag without a usable
/// alignment target) are logged and resolved best-effort instead of being
/// raised; see [`crate::masking::UnmaskOutcome::into_strict`] for the one place
/// where an incomplete result is turned into an error on request.
#[derive(Debug, Error)]
pub enum MarkupError {
    /// A strategy name that is not one of the known variants
    #[error("Unsupported {kind} strategy: '{name}'")]
    UnsupportedStrategy { kind: &'static str, name: String },

    /// Unbalanced or unparsable markup fed to the markup-aware tokenizer
    #[error("Malformed markup: {0}")]
    MalformedMarkup(String),

    /// A protected pattern that does not compile
    #[error("Invalid protected pattern for category '{category}': {source}")]
    InvalidPattern {
        category: String,
        #[source]
        source: regex::Error,
    },

    /// Alignment or segmentation text reported by an engine that cannot be parsed
    #[error("Invalid engine metadata: {0}")]
    InvalidMetadata(String),

    /// A persisted pattern file that does not follow the `# category` / regex layout
    #[error("Malformed protected patterns file: {0}")]
    PatternFile(String),

    /// A configuration document that does not deserialize
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// Reading or writing a pattern or configuration file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Placeholders survived unmasking (only raised in strict mode)
    #[error("Unmasking incomplete, unresolved placeholders: {remaining:?}")]
    UnmaskingIncomplete { remaining: Vec<String> },
}

impl MarkupError {
    pub(crate) fn unsupported(kind: &'static str, name: &str) -> Self {
        MarkupError::UnsupportedStrategy {
            kind,
            name: name.to_string(),
        }
    }
}

/// Result type for markup operations
pub type MarkupResult<T> = Result<T, MarkupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_strategy_message() {
        let err = MarkupError::unsupported("reinsertion", "magic");
        assert_eq!(err.to_string(), "Unsupported reinsertion strategy: 'magic'");
    }

    #[test]
    fn test_incomplete_lists_remaining() {
        let err = MarkupError::UnmaskingIncomplete {
            remaining: vec!["__xml__".to_string()],
        };
        assert!(err.to_string().contains("__xml__"));
    }
}
