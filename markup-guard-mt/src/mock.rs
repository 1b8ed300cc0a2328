//! Deterministic translation engine for tests
//!
//! Every mode works token by token and reports a matching word alignment and
//! one phrase per token, so pipeline behaviour can be checked without a real
//! decoder.
//!
//! # Example
//!
//! ```
//! use markup_guard_mt::mock::{MockEngine, MockMode};
//! use markup_guard_mt::translator::TranslationEngine;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let engine = MockEngine::new(MockMode::Reorder);
//! let output = rt.block_on(engine.translate("a b c")).unwrap();
//! assert_eq!(output.translation, "c b a");
//! assert_eq!(output.alignment.unwrap().targets(0), &[2]);
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use markup_guard::{Alignment, Segmentation};
use regex::Regex;
use tracing::debug;

use crate::error::{MtError, MtResult};
use crate::translator::{EngineOutput, TranslationEngine};

/// Forced-translation directive wrapped around a placeholder
static FORCED_TRANSLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<mask translation="([^"]*)">[^<]*</mask>"#)
        .unwrap_or_else(|_| unreachable!("built-in pattern"))
});

/// How the mock engine translates
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Return every token unchanged
    Identity,
    /// Replace tokens found in the dictionary, keep the others
    Dictionary(HashMap<String, String>),
    /// Reverse the token order
    Reorder,
    /// Fail every request with this message
    Error(String),
}

/// Mock engine that simulates the translation scenarios above
#[derive(Debug, Clone)]
pub struct MockEngine {
    mode: MockMode,
    /// Simulated latency in milliseconds
    delay_ms: u64,
    report_metadata: bool,
}

impl MockEngine {
    /// A mock engine answering in `mode`
    pub fn new(mode: MockMode) -> Self {
        MockEngine {
            mode,
            delay_ms: 0,
            report_metadata: true,
        }
    }

    /// Dictionary mode from `(source, target)` word pairs
    pub fn dictionary<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let words = pairs
            .into_iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect();
        Self::new(MockMode::Dictionary(words))
    }

    /// Sleep `delay_ms` milliseconds before every answer
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Return translations without alignment and segmentation
    pub fn without_metadata(mut self) -> Self {
        self.report_metadata = false;
        self
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    /// Translated tokens and, for each of them, the source index it came from
    fn apply_translation(&self, tokens: &[&str]) -> MtResult<Vec<(String, usize)>> {
        match &self.mode {
            MockMode::Identity => Ok(tokens
                .iter()
                .enumerate()
                .map(|(i, token)| (token.to_string(), i))
                .collect()),
            MockMode::Dictionary(words) => Ok(tokens
                .iter()
                .enumerate()
                .map(|(i, token)| {
                    let word = words.get(*token).cloned().unwrap_or_else(|| token.to_string());
                    (word, i)
                })
                .collect()),
            MockMode::Reorder => Ok(tokens
                .iter()
                .enumerate()
                .rev()
                .map(|(i, token)| (token.to_string(), i))
                .collect()),
            MockMode::Error(message) => Err(MtError::Engine(message.clone())),
        }
    }
}

#[async_trait]
impl TranslationEngine for MockEngine {
    async fn translate(&self, segment: &str) -> MtResult<EngineOutput> {
        self.apply_delay().await;

        let input = FORCED_TRANSLATION.replace_all(segment, "$1");
        let tokens: Vec<&str> = input.split(' ').filter(|t| !t.is_empty()).collect();
        let translated = self.apply_translation(&tokens)?;
        debug!(engine = self.engine_name(), tokens = tokens.len(), "translated segment");

        let translation = translated
            .iter()
            .map(|(token, _)| token.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if !self.report_metadata {
            return Ok(EngineOutput::text(translation));
        }

        let alignment: Alignment = translated
            .iter()
            .enumerate()
            .map(|(target, (_, source))| (*source, vec![target]))
            .collect();
        let segmentation: Segmentation = translated
            .iter()
            .enumerate()
            .map(|(target, (_, source))| ((*source, *source), (target, target)))
            .collect();
        Ok(EngineOutput::text(translation)
            .with_alignment(alignment)
            .with_segmentation(segmentation))
    }

    fn engine_name(&self) -> &str {
        "Mock Engine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup_guard::Span;

    #[tokio::test]
    async fn test_identity() {
        let engine = MockEngine::new(MockMode::Identity);
        let output = engine.translate("in the sky").await.unwrap();
        assert_eq!(output.translation, "in the sky");
        let alignment = output.alignment.unwrap();
        assert_eq!(alignment.targets(2), &[2]);
        assert_eq!(output.segmentation.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_dictionary_keeps_unknown_words() {
        let engine = MockEngine::dictionary([("the", "le"), ("sky", "ciel")]);
        let output = engine.translate("in the sky __url_0__").await.unwrap();
        assert_eq!(output.translation, "in le ciel __url_0__");
    }

    #[tokio::test]
    async fn test_reorder_metadata() {
        let engine = MockEngine::new(MockMode::Reorder);
        let output = engine.translate("a b c").await.unwrap();
        assert_eq!(output.translation, "c b a");
        assert_eq!(output.alignment.unwrap().targets(0), &[2]);
        let segmentation = output.segmentation.unwrap();
        assert_eq!(segmentation.target_of(Span::new(2, 2)), Some(Span::new(0, 0)));
    }

    #[tokio::test]
    async fn test_error_mode() {
        let engine = MockEngine::new(MockMode::Error("engine down".to_string()));
        let err = engine.translate("a").await.unwrap_err();
        assert!(matches!(err, MtError::Engine(ref msg) if msg == "engine down"));
    }

    #[tokio::test]
    async fn test_without_metadata() {
        let engine = MockEngine::new(MockMode::Identity).without_metadata();
        let output = engine.translate("a b").await.unwrap();
        assert!(output.alignment.is_none());
        assert!(output.segmentation.is_none());
    }

    #[tokio::test]
    async fn test_forced_translation_directives() {
        let engine = MockEngine::dictionary([("see", "voir")]);
        let output = engine
            .translate("see <mask translation=\"__url_0__\">__url_0__</mask>")
            .await
            .unwrap();
        assert_eq!(output.translation, "voir __url_0__");
        assert_eq!(output.alignment.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delay() {
        let engine = MockEngine::new(MockMode::Identity).with_delay(5);
        let start = std::time::Instant::now();
        engine.translate("a").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
