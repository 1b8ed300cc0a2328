//! Markup reinsertion
//!
//! When markup is removed from a segment before translation, the engine
//! output carries no tags at all. The reinserter puts the tags of the source
//! segment back into the translation, guided by the word alignment and/or the
//! phrase segmentation the engine reported.
//!
//! Three strategies are available:
//!
//! - [`ReinsertionStrategy::Full`]: per tag region, phrase segmentation first,
//!   word alignment where phrases are not conclusive
//! - [`ReinsertionStrategy::Segmentation`]: tags travel with the phrase that
//!   contains their source position
//! - [`ReinsertionStrategy::Alignment`]: tags are emitted in front of the
//!   target token aligned to their source position
//!
//! # Example
//!
//! ```
//! use markup_guard::metadata::{Alignment, Segmentation};
//! use markup_guard::reinsertion::{Reinserter, ReinsertionStrategy};
//!
//! let reinserter = Reinserter::new(ReinsertionStrategy::Alignment);
//! let alignment = Alignment::from([(0, vec![0]), (1, vec![1]), (2, vec![2]), (3, vec![3])]);
//! let result = reinserter
//!     .reinsert_markup(
//!         "in the <b> sky </b> much",
//!         "dans le ciel beaucoup",
//!         &Segmentation::default(),
//!         &alignment,
//!     )
//!     .unwrap();
//! assert_eq!(result, "dans le <b> ciel </b> beaucoup");
//! ```

pub mod full;
pub mod phrase;
pub mod regions;
pub mod word;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MarkupError, MarkupResult};
use crate::metadata::{Alignment, Segmentation};
use crate::tokenizer::{TagKind, tokenize_keep_markup};

pub use regions::{TagRegion, tag_regions};

/// Which engine metadata drives tag placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReinsertionStrategy {
    /// Segmentation and alignment combined
    Full,
    /// Phrase segmentation only
    #[serde(alias = "segmentation-only")]
    Segmentation,
    /// Word alignment only
    #[default]
    #[serde(alias = "alignment-only")]
    Alignment,
}

impl ReinsertionStrategy {
    /// Name used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            ReinsertionStrategy::Full => "full",
            ReinsertionStrategy::Segmentation => "segmentation",
            ReinsertionStrategy::Alignment => "alignment",
        }
    }

    /// Whether the strategy reads the word alignment
    pub fn needs_alignment(&self) -> bool {
        matches!(self, ReinsertionStrategy::Full | ReinsertionStrategy::Alignment)
    }

    /// Whether the strategy reads the phrase segmentation
    pub fn needs_segmentation(&self) -> bool {
        matches!(self, ReinsertionStrategy::Full | ReinsertionStrategy::Segmentation)
    }
}

impl fmt::Display for ReinsertionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReinsertionStrategy {
    type Err = MarkupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(ReinsertionStrategy::Full),
            "segmentation" | "segmentation-only" => Ok(ReinsertionStrategy::Segmentation),
            "alignment" | "alignment-only" => Ok(ReinsertionStrategy::Alignment),
            other => Err(MarkupError::unsupported("reinsertion", other)),
        }
    }
}

/// Reinserts the markup of a source segment into its tag-free translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reinserter {
    strategy: ReinsertionStrategy,
    force_all: bool,
}

impl Reinserter {
    /// A reinserter that drops tags it cannot place
    pub fn new(strategy: ReinsertionStrategy) -> Self {
        Reinserter {
            strategy,
            force_all: false,
        }
    }

    /// Look the strategy up by name
    pub fn from_name(strategy: &str, force_all: bool) -> MarkupResult<Self> {
        Ok(Self::new(strategy.parse()?).with_force_all(force_all))
    }

    /// Append tags that cannot be placed at the end instead of dropping them
    pub fn with_force_all(mut self, force_all: bool) -> Self {
        self.force_all = force_all;
        self
    }

    /// The strategy this reinserter applies
    pub fn strategy(&self) -> ReinsertionStrategy {
        self.strategy
    }

    /// Whether tags that cannot be placed are appended
    pub fn force_all(&self) -> bool {
        self.force_all
    }

    /// Put the tags of `source_segment` back into `target_segment`
    ///
    /// # Arguments
    /// * `source_segment` - the source before markup was removed
    /// * `target_segment` - the tag-free translation, tokens separated by spaces
    /// * `segmentation` - phrase segmentation in tag-free coordinates
    /// * `alignment` - word alignment in tag-free coordinates
    ///
    /// Only the metadata the strategy needs is consulted.
    pub fn reinsert_markup(
        &self,
        source_segment: &str,
        target_segment: &str,
        segmentation: &Segmentation,
        alignment: &Alignment,
    ) -> MarkupResult<String> {
        let source_tokens = tokenize_keep_markup(source_segment)?;
        let target_tokens = split_tokens(target_segment);
        debug!(
            strategy = %self.strategy,
            source_tokens = source_tokens.len(),
            target_tokens = target_tokens.len(),
            "reinserting markup"
        );

        let output = match self.strategy {
            ReinsertionStrategy::Full => {
                full::reinsert(&source_tokens, &target_tokens, segmentation, alignment)?
            }
            ReinsertionStrategy::Segmentation => {
                phrase::reinsert(&source_tokens, &target_tokens, segmentation, self.force_all)
            }
            ReinsertionStrategy::Alignment => {
                word::reinsert(&source_tokens, &target_tokens, alignment, self.force_all)
            }
        };
        Ok(output.join(" "))
    }
}

fn split_tokens(segment: &str) -> Vec<String> {
    segment
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tags grouped by their position in tag-free coordinates
///
/// The position of a tag is the number of content tokens in front of it.
#[derive(Debug, Default)]
pub(crate) struct TagPositions {
    pub by_position: BTreeMap<usize, Vec<(TagKind, String)>>,
    pub content_len: usize,
}

impl TagPositions {
    pub(crate) fn from_tokens(tokens: &[String]) -> Self {
        let mut positions = TagPositions::default();
        for token in tokens {
            match TagKind::of(token) {
                Some(kind) => positions
                    .by_position
                    .entry(positions.content_len)
                    .or_default()
                    .push((kind, token.clone())),
                None => positions.content_len += 1,
            }
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        assert_eq!("full".parse::<ReinsertionStrategy>().unwrap(), ReinsertionStrategy::Full);
        assert_eq!(
            "segmentation-only".parse::<ReinsertionStrategy>().unwrap(),
            ReinsertionStrategy::Segmentation
        );
        assert_eq!(
            "alignment".parse::<ReinsertionStrategy>().unwrap(),
            ReinsertionStrategy::Alignment
        );
        let err = "guess".parse::<ReinsertionStrategy>().unwrap_err();
        assert!(matches!(err, MarkupError::UnsupportedStrategy { kind: "reinsertion", .. }));
    }

    #[test]
    fn test_from_name() {
        let reinserter = Reinserter::from_name("segmentation", true).unwrap();
        assert_eq!(reinserter.strategy(), ReinsertionStrategy::Segmentation);
        assert!(reinserter.force_all());
        assert!(Reinserter::from_name("nope", false).is_err());
    }

    #[test]
    fn test_strategy_serde_aliases() {
        let parsed: ReinsertionStrategy = serde_json::from_str("\"alignment-only\"").unwrap();
        assert_eq!(parsed, ReinsertionStrategy::Alignment);
        assert_eq!(serde_json::to_string(&ReinsertionStrategy::Full).unwrap(), "\"full\"");
    }

    #[test]
    fn test_metadata_requirements() {
        assert!(ReinsertionStrategy::Full.needs_alignment());
        assert!(ReinsertionStrategy::Full.needs_segmentation());
        assert!(!ReinsertionStrategy::Segmentation.needs_alignment());
        assert!(!ReinsertionStrategy::Alignment.needs_segmentation());
    }

    #[test]
    fn test_tag_positions() {
        let tokens: Vec<String> = ["<p>", "a", "<b>", "</b>", "b", "</p>"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let positions = TagPositions::from_tokens(&tokens);
        assert_eq!(positions.content_len, 2);
        assert_eq!(positions.by_position[&0], vec![(TagKind::Opening, "<p>".to_string())]);
        assert_eq!(positions.by_position[&1].len(), 2);
        assert_eq!(positions.by_position[&2], vec![(TagKind::Closing, "</p>".to_string())]);
    }

    #[test]
    fn test_malformed_source_is_rejected() {
        let reinserter = Reinserter::new(ReinsertionStrategy::Full);
        let result = reinserter.reinsert_markup(
            "a </b> c",
            "x y",
            &Segmentation::default(),
            &Alignment::default(),
        );
        assert!(matches!(result, Err(MarkupError::MalformedMarkup(_))));
    }

    #[test]
    fn test_deterministic_across_strategies() {
        let source = "<p> the <b> big </b> house <br/> </p>";
        let target = "la grande maison";
        let alignment = Alignment::from([(0, vec![0]), (1, vec![1]), (2, vec![2])]);
        let segmentation = Segmentation::from([((0, 0), (0, 0)), ((1, 2), (1, 2))]);
        for strategy in [
            ReinsertionStrategy::Full,
            ReinsertionStrategy::Segmentation,
            ReinsertionStrategy::Alignment,
        ] {
            let reinserter = Reinserter::new(strategy).with_force_all(true);
            let first = reinserter
                .reinsert_markup(source, target, &segmentation, &alignment)
                .unwrap();
            let second = reinserter
                .reinsert_markup(source, target, &segmentation, &alignment)
                .unwrap();
            assert_eq!(first, second, "strategy {}", strategy);
        }
    }
}
