//! Tag regions of a markup-aware tokenized source segment
//!
//! All positions are expressed in tag-free coordinates, i.e. as indexes into
//! the source segment with every tag removed. That is the index space the
//! engine's alignment and segmentation refer to.

use crate::error::{MarkupError, MarkupResult};
use crate::tokenizer::TagKind;

/// A matched tag pair, or a lone self-closing tag
///
/// `token` fields hold the index of a tag in the tokenized source, tags
/// included, and order tags that meet at one target position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRegion {
    /// `<br/>` in front of the content token at `position`
    SelfClosing {
        tag: String,
        position: usize,
        token: usize,
    },
    /// `opening` and `closing` enclose the content tokens `start..end`
    ///
    /// `start == end` for a pair with no content in between.
    Pair {
        opening: String,
        closing: String,
        start: usize,
        end: usize,
        tokens: (usize, usize),
    },
}

impl TagRegion {
    /// Content token indexes strictly between the tags
    pub fn content(&self) -> std::ops::Range<usize> {
        match self {
            TagRegion::SelfClosing { position, .. } => *position..*position,
            TagRegion::Pair { start, end, .. } => *start..*end,
        }
    }
}

/// Collect the tag regions of `tokens`
///
/// Closing tags are matched to the most recently opened, still unmatched
/// opening tag. Regions are returned in the order their closing (or
/// self-closing) tag appears, so inner regions come before the regions that
/// enclose them.
///
/// # Example
/// ```
/// use markup_guard::reinsertion::regions::{TagRegion, tag_regions};
///
/// let tokens: Vec<String> = ["in", "<b>", "sky", "</b>"].iter().map(|t| t.to_string()).collect();
/// let regions = tag_regions(&tokens).unwrap();
/// assert_eq!(regions[0].content(), 1..2);
/// ```
pub fn tag_regions(tokens: &[String]) -> MarkupResult<Vec<TagRegion>> {
    let mut regions = Vec::new();
    let mut open: Vec<(&str, usize, usize)> = Vec::new();
    let mut content = 0usize;

    for (index, token) in tokens.iter().enumerate() {
        match TagKind::of(token) {
            None => content += 1,
            Some(TagKind::Opening) => open.push((token.as_str(), content, index)),
            Some(TagKind::SelfClosing) => regions.push(TagRegion::SelfClosing {
                tag: token.clone(),
                position: content,
                token: index,
            }),
            Some(TagKind::Closing) => {
                let (opening, start, open_index) = open.pop().ok_or_else(|| {
                    MarkupError::MalformedMarkup(format!("{} without opening tag", token))
                })?;
                regions.push(TagRegion::Pair {
                    opening: opening.to_string(),
                    closing: token.clone(),
                    start,
                    end: content,
                    tokens: (open_index, index),
                });
            }
        }
    }

    if let Some((opening, _, _)) = open.last() {
        return Err(MarkupError::MalformedMarkup(format!(
            "{} is never closed",
            opening
        )));
    }

    Ok(regions)
}
