//! Reinsertion driven by phrase segmentation only
//!
//! Tags travel with the phrase that contains their source position: opening
//! and self-closing tags are emitted in front of the phrase's target tokens,
//! closing tags right after them. Phrases are visited in target order.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::metadata::Segmentation;
use crate::tokenizer::TagKind;

/// Tags waiting to be emitted, keyed by source content index
#[derive(Debug, Default)]
struct PendingTags {
    /// Emitted before the phrase containing the index
    leading: BTreeMap<usize, Vec<String>>,
    /// Emitted after the phrase containing the index. `None` is a closing tag
    /// with no content in front of it, which no phrase can contain.
    trailing: BTreeMap<Option<usize>, Vec<String>>,
}

impl PendingTags {
    fn from_tokens(tokens: &[String]) -> Self {
        let mut pending = PendingTags::default();
        let mut open: Vec<usize> = Vec::new();
        let mut content = 0usize;

        for token in tokens {
            match TagKind::of(token) {
                None => content += 1,
                Some(TagKind::SelfClosing) => {
                    pending.leading.entry(content).or_default().push(token.clone());
                }
                Some(TagKind::Opening) => {
                    open.push(content);
                    pending.leading.entry(content).or_default().push(token.clone());
                }
                Some(TagKind::Closing) => {
                    if open.pop() == Some(content) {
                        // empty element: keep the closing tag next to its opening tag
                        pending.leading.entry(content).or_default().push(token.clone());
                    } else {
                        pending
                            .trailing
                            .entry(content.checked_sub(1))
                            .or_default()
                            .push(token.clone());
                    }
                }
            }
        }
        pending
    }

    fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.trailing.is_empty()
    }

    fn len(&self) -> usize {
        self.leading.values().chain(self.trailing.values()).map(Vec::len).sum()
    }
}

/// Reinsert the tags of `source_tokens` into `target_tokens`
///
/// Target tokens not covered by any phrase are kept in place. With
/// `force_all`, tags whose position lies outside every phrase are appended:
/// opening tags first, then closing tags, each by source position.
pub fn reinsert(
    source_tokens: &[String],
    target_tokens: &[String],
    segmentation: &Segmentation,
    force_all: bool,
) -> Vec<String> {
    let mut pending = PendingTags::from_tokens(source_tokens);
    let target_len = target_tokens.len();
    let mut output = Vec::with_capacity(source_tokens.len() + target_len);
    let mut next_target = 0usize;

    for phrase in segmentation.by_target() {
        let mut open_now = Vec::new();
        let mut close_now = Vec::new();
        for index in phrase.source.indexes() {
            if let Some(tags) = pending.leading.remove(&index) {
                open_now.extend(tags);
            }
            if let Some(tags) = pending.trailing.remove(&Some(index)) {
                close_now.extend(tags);
            }
        }

        let start = phrase.target.start.min(target_len);
        let end = (phrase.target.end + 1).min(target_len);
        if next_target < start {
            debug!(from = next_target, to = start, "target tokens outside any phrase");
            output.extend_from_slice(&target_tokens[next_target..start]);
            next_target = start;
        }

        output.extend(open_now);
        let from = start.max(next_target);
        if from < end {
            output.extend_from_slice(&target_tokens[from..end]);
            next_target = end;
        }
        output.extend(close_now);
    }

    if next_target < target_len {
        output.extend_from_slice(&target_tokens[next_target..]);
    }

    if pending.is_empty() {
        return output;
    }
    if force_all {
        debug!(tags = pending.len(), "appending tags outside every phrase");
        output.extend(pending.leading.into_values().flatten());
        output.extend(pending.trailing.into_values().flatten());
    } else {
        warn!(tags = pending.len(), "dropping tags outside every phrase");
    }
    output
}
