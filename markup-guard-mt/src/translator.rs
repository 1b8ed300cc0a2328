//! Translation engine abstraction
//!
//! The pipeline talks to engines through [`TranslationEngine`], so that a
//! phrase-based decoder, a remote service or the deterministic
//! [`MockEngine`](crate::mock::MockEngine) can be swapped without touching
//! the masking and reinsertion logic.

use async_trait::async_trait;
use markup_guard::{Alignment, Segmentation};
use serde::{Deserialize, Serialize};

use crate::error::MtResult;

/// What an engine returns for one segment
///
/// `alignment` and `segmentation` use token indexes into the engine input
/// and into `translation`, both split on single spaces. Engines behind a
/// JSON API can deserialize their responses straight into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub translation: String,
    #[serde(default)]
    pub alignment: Option<Alignment>,
    #[serde(default)]
    pub segmentation: Option<Segmentation>,
}

impl EngineOutput {
    /// A translation without metadata
    pub fn text(translation: impl Into<String>) -> Self {
        EngineOutput {
            translation: translation.into(),
            ..EngineOutput::default()
        }
    }

    /// Attach a word alignment
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Attach a phrase segmentation
    pub fn with_segmentation(mut self, segmentation: Segmentation) -> Self {
        self.segmentation = Some(segmentation);
        self
    }

    /// Parse Moses-style output: a phrase trace plus `src-tgt` alignment pairs
    ///
    /// # Example
    /// ```
    /// use markup_guard_mt::translator::EngineOutput;
    ///
    /// let output = EngineOutput::from_moses("la maison |0-1| bleue |2-2|", "0-0 1-1 2-2").unwrap();
    /// assert_eq!(output.translation, "la maison bleue");
    /// assert_eq!(output.segmentation.unwrap().len(), 2);
    /// ```
    pub fn from_moses(trace: &str, alignment: &str) -> MtResult<Self> {
        let (translation, segmentation) = Segmentation::from_trace(trace)?;
        Ok(EngineOutput {
            translation,
            alignment: Some(Alignment::parse(alignment)?),
            segmentation: Some(segmentation),
        })
    }
}

/// A machine translation engine
///
/// Input segments are tokenized, space-separated text. Implementations
/// should report word alignment and phrase segmentation when they can,
/// since markup reinsertion and shared-placeholder unmasking depend on them.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Translate one segment
    async fn translate(&self, segment: &str) -> MtResult<EngineOutput>;

    /// Name used in logs
    fn engine_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MtError;
    use markup_guard::{MarkupError, Span};

    #[test]
    fn test_builder() {
        let output = EngineOutput::text("a b").with_alignment(Alignment::from([(0, vec![1])]));
        assert_eq!(output.translation, "a b");
        assert_eq!(output.alignment.unwrap().targets(0), &[1]);
        assert!(output.segmentation.is_none());
    }

    #[test]
    fn test_from_moses() {
        let output = EngineOutput::from_moses("b a |0-1| c |2-2|", "0-1 1-0 2-2").unwrap();
        assert_eq!(output.translation, "b a c");
        let segmentation = output.segmentation.unwrap();
        assert_eq!(segmentation.target_of(Span::new(0, 1)), Some(Span::new(0, 1)));
        assert_eq!(output.alignment.unwrap().targets(0), &[1]);
    }

    #[test]
    fn test_json_response_without_metadata() {
        let output: EngineOutput = serde_json::from_str(r#"{"translation": "le ciel"}"#).unwrap();
        assert_eq!(output, EngineOutput::text("le ciel"));

        let json = serde_json::to_string(&output).unwrap();
        let back: EngineOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, output);
    }

    #[test]
    fn test_from_moses_rejects_bad_alignment() {
        let err = EngineOutput::from_moses("a |0-0|", "0=0").unwrap_err();
        assert!(matches!(err, MtError::Markup(MarkupError::InvalidMetadata(_))));
    }
}
