//! Reinsertion driven by word alignment only

use tracing::{debug, warn};

use super::TagPositions;
use crate::metadata::Alignment;

/// Reinsert the tags of `source_tokens` into `target_tokens`
///
/// Each target token is preceded by the tags found at the source position it
/// is aligned to. Tags after the last source token go to the end. Any other
/// tag that was never reached is appended, by source position, only with
/// `force_all`.
pub fn reinsert(
    source_tokens: &[String],
    target_tokens: &[String],
    alignment: &Alignment,
    force_all: bool,
) -> Vec<String> {
    let TagPositions {
        by_position: mut pending,
        content_len,
    } = TagPositions::from_tokens(source_tokens);
    let target_to_source = alignment.inverted();
    let mut output = Vec::with_capacity(source_tokens.len() + target_tokens.len());

    for (target_index, token) in target_tokens.iter().enumerate() {
        if let Some(tags) = target_to_source
            .get(&target_index)
            .and_then(|source| pending.remove(source))
        {
            output.extend(tags.into_iter().map(|(_, tag)| tag));
        }
        output.push(token.clone());
    }

    if let Some(tags) = pending.remove(&content_len) {
        output.extend(tags.into_iter().map(|(_, tag)| tag));
    }

    if pending.is_empty() {
        return output;
    }
    let remaining: usize = pending.values().map(Vec::len).sum();
    if force_all {
        debug!(tags = remaining, "appending tags without an aligned target token");
        output.extend(pending.into_values().flatten().map(|(_, tag)| tag));
    } else {
        warn!(tags = remaining, "dropping tags without an aligned target token");
    }
    output
}
