//! Word alignment and phrase segmentation reported by a translation engine
//!
//! Both relations use zero-based token indexes into the tokenized,
//! placeholder- or markup-free source and target segments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MarkupError, MarkupResult};

/// Many-to-many relation from source token index to target token indexes
///
/// A source index without an entry has no aligned target token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment(BTreeMap<usize, Vec<usize>>);

impl Alignment {
    /// An empty alignment
    pub fn new() -> Self {
        Alignment(BTreeMap::new())
    }

    /// Add one link, keeping target indexes in insertion order without duplicates
    pub fn link(&mut self, source: usize, target: usize) {
        let targets = self.0.entry(source).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// Target indexes aligned to `source`, in the order they were reported
    pub fn targets(&self, source: usize) -> &[usize] {
        self.0.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Source indexes with their aligned target indexes, in source order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.0.iter().map(|(s, t)| (*s, t.as_slice()))
    }

    /// Number of aligned source indexes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Map every target index to a single source index
    ///
    /// When a target index is linked to several source indexes, the last one
    /// visited (highest source index) wins.
    pub fn inverted(&self) -> BTreeMap<usize, usize> {
        let mut inverted = BTreeMap::new();
        for (source, targets) in &self.0 {
            for target in targets {
                inverted.insert(*target, *source);
            }
        }
        inverted
    }

    /// Parse `source-target` pairs separated by whitespace, e.g. `0-0 1-2 1-3`
    ///
    /// # Example
    /// ```
    /// use markup_guard::metadata::Alignment;
    /// let alignment = Alignment::parse("0-0 1-2 1-3").unwrap();
    /// assert_eq!(alignment.targets(1), &[2, 3]);
    /// assert!(alignment.targets(2).is_empty());
    /// ```
    pub fn parse(pairs: &str) -> MarkupResult<Self> {
        let mut alignment = Alignment::new();
        for pair in pairs.split_whitespace() {
            let (source, target) = parse_index_pair(pair)?;
            alignment.link(source, target);
        }
        Ok(alignment)
    }

    /// Format as `source-target` pairs, the inverse of [`Alignment::parse`]
    pub fn to_pairs_string(&self) -> String {
        self.0
            .iter()
            .flat_map(|(s, targets)| targets.iter().map(move |t| format!("{}-{}", s, t)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<(usize, Vec<usize>)> for Alignment {
    fn from_iter<I: IntoIterator<Item = (usize, Vec<usize>)>>(iter: I) -> Self {
        Alignment(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(usize, Vec<usize>); N]> for Alignment {
    fn from(entries: [(usize, Vec<usize>); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Inclusive index span `start..=end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Whether `index` lies inside the span
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    /// Every index of the span
    pub fn indexes(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// A source phrase and the target phrase it was translated as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhrasePair {
    pub source: Span,
    pub target: Span,
}

/// Partition of a sentence into phrase pairs
///
/// Source spans are disjoint and cover every source index once. Pairs are
/// kept sorted by source span, also when read from JSON, which is a plain
/// list of pairs in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PhrasePair>", into = "Vec<PhrasePair>")]
pub struct Segmentation {
    pairs: Vec<PhrasePair>,
}

impl Segmentation {
    /// A segmentation over `pairs`, sorted by source span
    pub fn new(mut pairs: Vec<PhrasePair>) -> Self {
        pairs.sort_by_key(|p| p.source);
        Segmentation { pairs }
    }

    /// Pairs in source order
    pub fn pairs(&self) -> &[PhrasePair] {
        &self.pairs
    }

    /// Pairs in target order
    pub fn by_target(&self) -> Vec<PhrasePair> {
        let mut pairs = self.pairs.clone();
        pairs.sort_by_key(|p| p.target);
        pairs
    }

    /// The target span a source span was translated as
    pub fn target_of(&self, source: Span) -> Option<Span> {
        self.pairs
            .iter()
            .find(|p| p.source == source)
            .map(|p| p.target)
    }

    /// Number of phrase pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Split a Moses phrase trace into the plain translation and its segmentation
    ///
    /// A trace interleaves target words with the source span of the phrase they
    /// translate: `das ist |0-1| ein kleines haus |2-4|`.
    ///
    /// # Example
    /// ```
    /// use markup_guard::metadata::{Segmentation, Span};
    /// let (translation, segmentation) =
    ///     Segmentation::from_trace("das ist |0-1| ein kleines haus |2-4|").unwrap();
    /// assert_eq!(translation, "das ist ein kleines haus");
    /// assert_eq!(segmentation.target_of(Span::new(2, 4)), Some(Span::new(2, 4)));
    /// ```
    pub fn from_trace(trace: &str) -> MarkupResult<(String, Segmentation)> {
        let mut words: Vec<&str> = Vec::new();
        let mut pairs = Vec::new();
        let mut phrase_start = 0;

        for token in trace.split_whitespace() {
            let marker = token
                .strip_prefix('|')
                .and_then(|rest| rest.strip_suffix('|'))
                .filter(|inner| !inner.is_empty());
            match marker {
                Some(inner) => {
                    if words.len() == phrase_start {
                        return Err(MarkupError::InvalidMetadata(format!(
                            "phrase marker '{}' without target words",
                            token
                        )));
                    }
                    let (start, end) = parse_index_pair(inner)?;
                    pairs.push(PhrasePair {
                        source: Span::new(start, end),
                        target: Span::new(phrase_start, words.len() - 1),
                    });
                    phrase_start = words.len();
                }
                None => words.push(token),
            }
        }

        if phrase_start != words.len() {
            return Err(MarkupError::InvalidMetadata(
                "trailing target words without a phrase marker".to_string(),
            ));
        }

        Ok((words.join(" "), Segmentation::new(pairs)))
    }
}

impl FromIterator<((usize, usize), (usize, usize))> for Segmentation {
    fn from_iter<I: IntoIterator<Item = ((usize, usize), (usize, usize))>>(iter: I) -> Self {
        Segmentation::new(
            iter.into_iter()
                .map(|((ss, se), (ts, te))| PhrasePair {
                    source: Span::new(ss, se),
                    target: Span::new(ts, te),
                })
                .collect(),
        )
    }
}

impl From<Vec<PhrasePair>> for Segmentation {
    fn from(pairs: Vec<PhrasePair>) -> Self {
        Segmentation::new(pairs)
    }
}

impl From<Segmentation> for Vec<PhrasePair> {
    fn from(segmentation: Segmentation) -> Self {
        segmentation.pairs
    }
}

impl<const N: usize> From<[((usize, usize), (usize, usize)); N]> for Segmentation {
    fn from(entries: [((usize, usize), (usize, usize)); N]) -> Self {
        entries.into_iter().collect()
    }
}

fn parse_index_pair(pair: &str) -> MarkupResult<(usize, usize)> {
    let invalid = || MarkupError::InvalidMetadata(format!("expected 'a-b', found '{}'", pair));
    let (a, b) = pair.split_once('-').ok_or_else(invalid)?;
    let a = a.parse().map_err(|_| invalid())?;
    let b = b.parse().map_err(|_| invalid())?;
    Ok((a, b))
}
