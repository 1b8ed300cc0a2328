//! Masking of protected spans before machine translation
//!
//! Protected spans (markup, e-mail addresses, URLs, ...) are replaced with
//! placeholder tokens so that the translation engine copies them instead of
//! translating them. Afterwards the placeholders are swapped back for their
//! original content.
//!
//! Two placeholder spellings exist:
//!
//! - identity strategy: `__<category>_<n>__`, unique within a segment, where
//!   `n` counts occurrences of the category from zero
//! - alignment strategy: `__<category>__`, shared by every span of a
//!   category; restoring duplicates needs the word alignment of the engine
//!
//! ```text
//! Source:     "Email me at an@ribute.com"
//! Masked:     "Email me at __email_0__"
//! Translated: "Écrivez-moi à __email_0__"
//! Unmasked:   "Écrivez-moi à an@ribute.com"
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use regex::Captures;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MarkupError, MarkupResult};
use crate::escape::escape_special_chars;
use crate::metadata::Alignment;
use crate::patterns::ProtectedPatterns;

/// How placeholder tokens are spelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskingStrategy {
    /// Unique placeholders, `__xml_0__`, `__xml_1__`, ...
    #[default]
    Identity,
    /// Shared placeholders, `__xml__`, restored through word alignment
    Alignment,
}

impl MaskingStrategy {
    /// Name used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            MaskingStrategy::Identity => "identity",
            MaskingStrategy::Alignment => "alignment",
        }
    }
}

impl fmt::Display for MaskingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MaskingStrategy {
    type Err = MarkupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(MaskingStrategy::Identity),
            "alignment" => Ok(MaskingStrategy::Alignment),
            other => Err(MarkupError::unsupported("masking", other)),
        }
    }
}

/// One masked span: the placeholder that replaced it and the original text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaskEntry {
    pub placeholder: String,
    pub original: String,
}

impl MaskEntry {
    pub fn new(placeholder: &str, original: &str) -> Self {
        MaskEntry {
            placeholder: placeholder.to_string(),
            original: original.to_string(),
        }
    }
}

/// Build a placeholder token for `category`
///
/// `index` is `Some(n)` for the identity strategy and `None` for shared placeholders.
pub fn placeholder(category: &str, index: Option<usize>) -> String {
    match index {
        Some(n) => format!("__{}_{}__", category, n),
        None => format!("__{}__", category),
    }
}

/// Result of unmasking, with everything that could not be restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmaskOutcome {
    /// The target segment with all resolvable placeholders restored
    pub segment: String,
    /// Placeholder tokens still present in `segment`
    pub unresolved: Vec<String>,
    /// Mapping entries that were never substituted into the target
    pub unused: Vec<MaskEntry>,
}

impl UnmaskOutcome {
    /// Every mapping entry was restored
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.unused.is_empty()
    }

    /// Turn an incomplete result into [`MarkupError::UnmaskingIncomplete`]
    pub fn into_strict(self) -> MarkupResult<String> {
        if self.is_complete() {
            return Ok(self.segment);
        }
        let mut remaining = self.unresolved;
        remaining.extend(self.unused.into_iter().map(|e| e.placeholder));
        Err(MarkupError::UnmaskingIncomplete { remaining })
    }
}

/// Replaces protected spans with placeholders and restores them
#[derive(Debug, Clone)]
pub struct Masker {
    patterns: ProtectedPatterns,
    strategy: MaskingStrategy,
    escape: bool,
}

impl Masker {
    /// A masker over the default `xml`, `email`, `url` patterns that escapes
    /// Moses-reserved characters
    pub fn new(strategy: MaskingStrategy) -> Self {
        Self::with_patterns(ProtectedPatterns::default(), strategy)
    }

    /// A masker over `patterns` instead of the defaults
    pub fn with_patterns(patterns: ProtectedPatterns, strategy: MaskingStrategy) -> Self {
        Masker {
            patterns,
            strategy,
            escape: true,
        }
    }

    /// Enable or disable escaping of reserved characters in masked output
    pub fn with_escape(mut self, escape: bool) -> Self {
        self.escape = escape;
        self
    }

    /// Placeholder spelling this masker produces
    pub fn strategy(&self) -> MaskingStrategy {
        self.strategy
    }

    /// The categories this masker protects, in masking order
    pub fn patterns(&self) -> &ProtectedPatterns {
        &self.patterns
    }

    /// Replace every protected span in `segment` with a placeholder
    ///
    /// Categories are applied in configuration order. The returned mapping
    /// lists `(placeholder, original)` in that order, and left to right within
    /// a category.
    ///
    /// # Example
    /// ```
    /// use markup_guard::masking::{MaskEntry, Masker, MaskingStrategy};
    ///
    /// let masker = Masker::new(MaskingStrategy::Identity);
    /// let (masked, mapping) = masker.mask_segment("Email me at an@ribute.com . . .");
    /// assert_eq!(masked, "Email me at __email_0__ . . .");
    /// assert_eq!(mapping, vec![MaskEntry::new("__email_0__", "an@ribute.com")]);
    /// ```
    pub fn mask_segment(&self, segment: &str) -> (String, Vec<MaskEntry>) {
        let mut masked = segment.to_string();
        let mut mapping = Vec::new();

        for pattern in self.patterns.iter() {
            let mut occurrences = 0usize;
            let replaced = pattern.regex.replace_all(&masked, |caps: &Captures| {
                let index = match self.strategy {
                    MaskingStrategy::Identity => Some(occurrences),
                    MaskingStrategy::Alignment => None,
                };
                let token = placeholder(&pattern.category, index);
                mapping.push(MaskEntry::new(&token, &caps[0]));
                occurrences += 1;
                token
            });
            masked = replaced.into_owned();
        }

        if self.escape {
            // placeholders consist of word characters only and pass through unchanged
            masked = escape_special_chars(&masked);
        }

        debug!(masks = mapping.len(), "masked segment");
        (masked, mapping)
    }

    /// Token-level variant of [`Masker::mask_segment`]
    pub fn mask_tokens(&self, tokens: &[String]) -> (Vec<String>, Vec<MaskEntry>) {
        let (masked, mapping) = self.mask_segment(&tokens.join(" "));
        let tokens = masked.split(' ').map(str::to_string).collect();
        (tokens, mapping)
    }

    /// Whether `token` is a placeholder produced by this masker's strategy
    pub fn is_mask_token(&self, token: &str) -> bool {
        let Some(inner) = token
            .strip_prefix("__")
            .and_then(|rest| rest.strip_suffix("__"))
        else {
            return false;
        };

        match self.strategy {
            MaskingStrategy::Identity => match inner.rsplit_once('_') {
                Some((category, digits)) => {
                    !digits.is_empty()
                        && digits.bytes().all(|b| b.is_ascii_digit())
                        && self.patterns.categories().any(|c| c == category)
                }
                None => false,
            },
            MaskingStrategy::Alignment => self.patterns.categories().any(|c| c == inner),
        }
    }

    /// Whether any space-separated token of `segment` is a placeholder
    pub fn contains_mask(&self, segment: &str) -> bool {
        segment.split(' ').any(|token| self.is_mask_token(token))
    }

    /// Wrap placeholders in forced-translation directives
    ///
    /// `__url_0__` becomes `<mask translation="__url_0__">__url_0__</mask>`,
    /// which instructs the engine to emit the placeholder verbatim.
    pub fn force_mask_translation(&self, segment: &str) -> String {
        segment
            .split(' ')
            .map(|token| {
                if self.is_mask_token(token) {
                    format!("<mask translation=\"{}\">{}</mask>", token, token)
                } else {
                    token.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Restore original content into a translated segment
    ///
    /// Failures are logged and the partially restored segment is returned;
    /// use [`Masker::unmask_with_report`] to inspect what was left over.
    pub fn unmask_segment(
        &self,
        source_segment: &str,
        target_segment: &str,
        mapping: &[MaskEntry],
        alignment: Option<&Alignment>,
    ) -> String {
        self.unmask_with_report(source_segment, target_segment, mapping, alignment)
            .segment
    }

    /// Restore original content and report unresolved placeholders
    ///
    /// # Arguments
    /// * `source_segment` - the masked segment that was sent to the engine
    /// * `target_segment` - the engine output
    /// * `mapping` - the mapping returned by [`Masker::mask_segment`]
    /// * `alignment` - word alignment between the two, needed only when
    ///   shared placeholders occur more than once
    pub fn unmask_with_report(
        &self,
        source_segment: &str,
        target_segment: &str,
        mapping: &[MaskEntry],
        alignment: Option<&Alignment>,
    ) -> UnmaskOutcome {
        let (segment, unused) = if mapping.is_empty() {
            (target_segment.to_string(), Vec::new())
        } else if self.strategy == MaskingStrategy::Alignment && has_duplicates(mapping) {
            match alignment {
                Some(alignment) => {
                    self.unmask_by_alignment(source_segment, target_segment, mapping, alignment)
                }
                None => {
                    warn!("shared placeholders occur more than once but no alignment was given");
                    (target_segment.to_string(), mapping.to_vec())
                }
            }
        } else {
            unmask_in_order(target_segment, mapping)
        };

        if !unused.is_empty() {
            warn!(?unused, "mapping entries were not used for unmasking");
        }

        let unresolved: Vec<String> = segment
            .split(' ')
            .filter(|token| self.is_mask_token(token))
            .map(str::to_string)
            .collect();
        if !unresolved.is_empty() {
            warn!(segment = %segment, "target segment still contains mask tokens after unmasking");
        }

        UnmaskOutcome {
            segment,
            unresolved,
            unused,
        }
    }

    /// Follow the alignment from every source placeholder to the target
    ///
    /// The k-th source occurrence of a placeholder owns the k-th mapping entry
    /// with that spelling. An occurrence whose aligned target tokens do not
    /// carry the placeholder gives up its entry, so later occurrences keep
    /// their own.
    fn unmask_by_alignment(
        &self,
        source_segment: &str,
        target_segment: &str,
        mapping: &[MaskEntry],
        alignment: &Alignment,
    ) -> (String, Vec<MaskEntry>) {
        let mut pending: HashMap<&str, VecDeque<&MaskEntry>> = HashMap::new();
        for entry in mapping {
            pending
                .entry(entry.placeholder.as_str())
                .or_default()
                .push_back(entry);
        }

        let mut target_tokens: Vec<String> =
            target_segment.split(' ').map(str::to_string).collect();
        let mut unused = Vec::new();

        for (source_index, source_token) in source_segment.split(' ').enumerate() {
            if !self.is_mask_token(source_token) {
                continue;
            }
            let Some(entry) = pending
                .get_mut(source_token)
                .and_then(|queue| queue.pop_front())
            else {
                debug!(mask = source_token, "no mapping entry left for source mask");
                continue;
            };

            let found = alignment.targets(source_index).iter().copied().find(|&t| {
                target_tokens
                    .get(t)
                    .is_some_and(|token| token == source_token)
            });

            match found {
                Some(target_index) => target_tokens[target_index] = entry.original.clone(),
                None => {
                    debug!(
                        mask = source_token,
                        source_index, "unmasking failed, mask is missing in the aligned target tokens"
                    );
                    unused.push(entry.clone());
                }
            }
        }

        for queue in pending.into_values() {
            unused.extend(queue.into_iter().cloned());
        }
        // deterministic report order: mapping order
        unused.sort_by_key(|e| mapping.iter().position(|m| m == e));

        (target_tokens.join(" "), unused)
    }
}

fn has_duplicates(mapping: &[MaskEntry]) -> bool {
    let mut seen = HashSet::new();
    mapping.iter().any(|e| !seen.insert(e.placeholder.as_str()))
}

/// Replace the first occurrence of each placeholder, in mapping order
fn unmask_in_order(target_segment: &str, mapping: &[MaskEntry]) -> (String, Vec<MaskEntry>) {
    let mut segment = target_segment.to_string();
    let mut unused = Vec::new();
    for entry in mapping {
        if segment.contains(&entry.placeholder) {
            segment = segment.replacen(&entry.placeholder, &entry.original, 1);
        } else {
            unused.push(entry.clone());
        }
    }
    (segment, unused)
}
