//! Pre- and postprocessing around one engine call
//!
//! ```text
//! segment ──> mask protected spans ──> strip or mask markup ──> escape
//!                                                                 │
//!                                                              engine
//!                                                                 │
//! result <── reinsert markup <── unmask <── unmask markup <── de-escape
//! ```
//!
//! With `strip_output` set, all markup is removed from the result last.
//!
//! Which steps run is decided by the [`MarkupConfig`]. Segments are
//! independent, so [`SegmentTranslator::translate_batch`] runs them
//! concurrently.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use markup_guard::{
    Alignment, MarkupConfig, MaskEntry, Masker, ProtectedPatterns, Reinserter, Segmentation,
    XmlStrategy, deescape_special_chars, escape_special_chars, strip_markup,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MtError, MtResult};
use crate::translator::{EngineOutput, TranslationEngine};

const MARKUP_CATEGORY: &str = "xml";

/// A segment ready for the engine, with what is needed to restore it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedSegment {
    /// The segment as given by the caller
    pub source: String,
    /// Masked and/or stripped text, before escaping and forced-translation
    /// directives; the index space of the engine's metadata
    pub masked_source: String,
    /// What is sent to the engine
    pub engine_input: String,
    pub mask_mapping: Vec<MaskEntry>,
    pub markup_mapping: Vec<MaskEntry>,
}

/// Translates segments while protecting markup and other sensitive spans
pub struct SegmentTranslator {
    engine: Arc<dyn TranslationEngine>,
    config: MarkupConfig,
    /// Protected spans other than markup
    masker: Option<Masker>,
    /// Markup, under [`XmlStrategy::Mask`]
    markup_masker: Option<Masker>,
    reinserter: Option<Reinserter>,
    timeout: Option<Duration>,
}

impl SegmentTranslator {
    /// A translator over the default protected patterns
    pub fn new(engine: Arc<dyn TranslationEngine>, config: MarkupConfig) -> Self {
        Self::with_patterns(engine, config, ProtectedPatterns::default())
    }

    /// A translator over `patterns`
    ///
    /// The `xml` category is handled according to the XML strategy: masked
    /// together with the other categories under pass-through, by a dedicated
    /// masker under `mask`, and not masked at all when markup is stripped.
    pub fn with_patterns(
        engine: Arc<dyn TranslationEngine>,
        config: MarkupConfig,
        patterns: ProtectedPatterns,
    ) -> Self {
        let masker = config.masking.map(|strategy| {
            let selected = match config.xml {
                XmlStrategy::PassThrough => patterns.clone(),
                _ => patterns.select(|category| category != MARKUP_CATEGORY),
            };
            Masker::with_patterns(selected, strategy).with_escape(false)
        });
        let markup_masker = match config.xml {
            XmlStrategy::Mask => Some(
                Masker::with_patterns(
                    patterns.select(|category| category == MARKUP_CATEGORY),
                    config.markup_masking_strategy(),
                )
                .with_escape(false),
            ),
            _ => None,
        };
        let reinserter = config.reinserter();

        SegmentTranslator {
            engine,
            config,
            masker,
            markup_masker,
            reinserter,
            timeout: None,
        }
    }

    /// Fail engine calls that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The configuration this translator was built with
    pub fn config(&self) -> &MarkupConfig {
        &self.config
    }

    /// Name of the wrapped engine
    pub fn engine_name(&self) -> &str {
        self.engine.engine_name()
    }

    /// Mask, strip and escape `segment` for the engine
    pub fn preprocess(&self, segment: &str) -> MtResult<PreparedSegment> {
        let mut text = segment.to_string();

        let mut mask_mapping = Vec::new();
        if let Some(masker) = &self.masker {
            (text, mask_mapping) = masker.mask_segment(&text);
        }

        let mut markup_mapping = Vec::new();
        match self.config.xml {
            XmlStrategy::PassThrough => {}
            XmlStrategy::Strip | XmlStrategy::StripReinsert => text = strip_markup(&text)?,
            XmlStrategy::Mask => {
                if let Some(masker) = &self.markup_masker {
                    (text, markup_mapping) = masker.mask_segment(&text);
                }
            }
        }

        let masked_source = text;
        let mut engine_input = if self.config.escape {
            escape_special_chars(&masked_source)
        } else {
            masked_source.clone()
        };
        if self.config.force_mask_translation {
            for masker in self.masker.iter().chain(&self.markup_masker) {
                engine_input = masker.force_mask_translation(&engine_input);
            }
        }

        debug!(
            masks = mask_mapping.len(),
            markup_masks = markup_mapping.len(),
            "preprocessed segment"
        );
        Ok(PreparedSegment {
            source: segment.to_string(),
            masked_source,
            engine_input,
            mask_mapping,
            markup_mapping,
        })
    }

    /// Restore protected spans and markup in the engine output
    ///
    /// # Arguments
    /// * `prepared` - what [`SegmentTranslator::preprocess`] returned for the segment
    /// * `output` - the engine's answer to `prepared.engine_input`
    ///
    /// # Errors
    /// [`MtError::MissingMetadata`] when the reinsertion strategy needs an
    /// alignment or segmentation the engine did not report.
    pub fn postprocess(&self, prepared: &PreparedSegment, output: EngineOutput) -> MtResult<String> {
        let mut translation = if self.config.escape {
            deescape_special_chars(&output.translation)
        } else {
            output.translation
        };
        let alignment = output.alignment.as_ref();

        if let Some(masker) = &self.markup_masker {
            translation = masker.unmask_segment(
                &prepared.masked_source,
                &translation,
                &prepared.markup_mapping,
                alignment,
            );
        }
        if let Some(masker) = &self.masker {
            translation = masker.unmask_segment(
                &prepared.masked_source,
                &translation,
                &prepared.mask_mapping,
                alignment,
            );
        }

        if let Some(reinserter) = &self.reinserter {
            let strategy = reinserter.strategy();
            let empty_alignment = Alignment::default();
            let empty_segmentation = Segmentation::default();
            let alignment = match (alignment, strategy.needs_alignment()) {
                (Some(alignment), _) => alignment,
                (None, false) => &empty_alignment,
                (None, true) => return Err(MtError::MissingMetadata("alignment")),
            };
            let segmentation = match (output.segmentation.as_ref(), strategy.needs_segmentation()) {
                (Some(segmentation), _) => segmentation,
                (None, false) => &empty_segmentation,
                (None, true) => return Err(MtError::MissingMetadata("segmentation")),
            };
            translation =
                reinserter.reinsert_markup(&prepared.source, &translation, segmentation, alignment)?;
        }

        if self.config.strip_output {
            translation = strip_markup(&translation)?;
        }

        Ok(translation)
    }

    /// Translate one segment
    pub async fn translate(&self, segment: &str) -> MtResult<String> {
        let prepared = self.preprocess(segment)?;
        let output = self.call_engine(&prepared.engine_input).await?;
        self.postprocess(&prepared, output)
    }

    /// Translate independent segments concurrently, keeping their order
    pub async fn translate_batch(&self, segments: &[String]) -> MtResult<Vec<String>> {
        info!(
            engine = self.engine_name(),
            segments = segments.len(),
            "translating batch"
        );
        join_all(segments.iter().map(|segment| self.translate(segment)))
            .await
            .into_iter()
            .collect()
    }

    async fn call_engine(&self, input: &str) -> MtResult<EngineOutput> {
        match self.timeout {
            None => self.engine.translate(input).await,
            Some(after) => tokio::time::timeout(after, self.engine.translate(input))
                .await
                .map_err(|_| MtError::Timeout {
                    engine: self.engine_name().to_string(),
                    after,
                })?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEngine, MockMode};
    use markup_guard::{MaskingStrategy, ReinsertionStrategy};

    fn translator(engine: MockEngine, config: MarkupConfig) -> SegmentTranslator {
        SegmentTranslator::new(Arc::new(engine), config)
    }

    #[test]
    fn test_preprocess_strip() {
        let translator = translator(
            MockEngine::new(MockMode::Identity),
            MarkupConfig::for_xml(XmlStrategy::StripReinsert),
        );
        let prepared = translator.preprocess("in the <b> sky </b> much").unwrap();
        assert_eq!(prepared.engine_input, "in the sky much");
        assert_eq!(prepared.source, "in the <b> sky </b> much");
        assert!(prepared.markup_mapping.is_empty());
    }

    #[test]
    fn test_preprocess_mask_and_escape() {
        let config = MarkupConfig {
            masking: Some(MaskingStrategy::Identity),
            ..MarkupConfig::for_xml(XmlStrategy::Mask)
        };
        let translator = translator(MockEngine::new(MockMode::Identity), config);
        let prepared = translator
            .preprocess("<a> write to an@ribute.com | now </a>")
            .unwrap();
        assert_eq!(prepared.masked_source, "__xml_0__ write to __email_0__ | now __xml_1__");
        assert_eq!(
            prepared.engine_input,
            "__xml_0__ write to __email_0__ &#124; now __xml_1__"
        );
        assert_eq!(prepared.mask_mapping, vec![MaskEntry::new("__email_0__", "an@ribute.com")]);
        assert_eq!(prepared.markup_mapping.len(), 2);
    }

    #[test]
    fn test_preprocess_forced_translation() {
        let config = MarkupConfig {
            masking: Some(MaskingStrategy::Identity),
            force_mask_translation: true,
            ..MarkupConfig::default()
        };
        let translator = translator(MockEngine::new(MockMode::Identity), config);
        let prepared = translator.preprocess("see www.statmt.org").unwrap();
        assert_eq!(prepared.masked_source, "see __url_0__");
        assert_eq!(
            prepared.engine_input,
            "see <mask translation=\"__url_0__\">__url_0__</mask>"
        );
    }

    #[test]
    fn test_missing_metadata() {
        let translator = translator(
            MockEngine::new(MockMode::Identity),
            MarkupConfig {
                reinsertion: Some(ReinsertionStrategy::Segmentation),
                ..MarkupConfig::for_xml(XmlStrategy::StripReinsert)
            },
        );
        let prepared = translator.preprocess("a <b> b </b>").unwrap();
        let output = EngineOutput::text("A B").with_alignment(Alignment::default());
        let err = translator.postprocess(&prepared, output).unwrap_err();
        assert!(matches!(err, MtError::MissingMetadata("segmentation")));
    }

    #[test]
    fn test_postprocess_ignores_unneeded_metadata() {
        let translator = translator(
            MockEngine::new(MockMode::Identity),
            MarkupConfig::for_xml(XmlStrategy::StripReinsert),
        );
        let prepared = translator.preprocess("a <b> b </b>").unwrap();
        let alignment = Alignment::from([(0, vec![0]), (1, vec![1])]);
        let output = EngineOutput::text("A B").with_alignment(alignment);
        assert_eq!(translator.postprocess(&prepared, output).unwrap(), "A <b> B </b>");
    }

    #[test]
    fn test_postprocess_strips_output() {
        let translator = translator(
            MockEngine::new(MockMode::Identity),
            MarkupConfig {
                strip_output: true,
                ..MarkupConfig::for_xml(XmlStrategy::Mask)
            },
        );
        let prepared = translator.preprocess("<b> a </b> <br/> b").unwrap();
        assert_eq!(prepared.engine_input, "__xml_0__ a __xml_1__ __xml_2__ b");
        let output = EngineOutput::text("__xml_0__ A __xml_1__ __xml_2__ B");
        assert_eq!(translator.postprocess(&prepared, output).unwrap(), "A B");
    }

    #[test]
    fn test_strip_output_rejects_broken_markup() {
        let translator = translator(
            MockEngine::new(MockMode::Identity),
            MarkupConfig {
                strip_output: true,
                ..MarkupConfig::default()
            },
        );
        let prepared = translator.preprocess("a b").unwrap();
        let err = translator
            .postprocess(&prepared, EngineOutput::text("a </b> b"))
            .unwrap_err();
        assert!(matches!(err, MtError::Markup(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let translator = translator(
            MockEngine::new(MockMode::Identity).with_delay(200),
            MarkupConfig::default(),
        )
        .with_timeout(Duration::from_millis(10));
        let err = translator.translate("a").await.unwrap_err();
        assert!(matches!(err, MtError::Timeout { .. }));
    }
}
