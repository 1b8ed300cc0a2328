//! Hybrid reinsertion from phrase segmentation and word alignment
//!
//! Every tag region of the source gets an insertion point in the target:
//!
//! - self-closing tag: in front of the target token aligned to its position
//! - empty pair: right after the target token aligned to the content token
//!   preceding the pair
//! - pair with content: decided from the source phrases overlapping the
//!   region and the target phrases covering them
//!
//! | region boundaries = phrase boundaries | target phrases contiguous | rule |
//! |---------------------------------------|---------------------------|------|
//! | yes                                   | yes                       | 1    |
//! | yes                                   | no                        | 3    |
//! | no                                    | yes                       | 2    |
//! | no                                    | no                        | 3.5  |
//!
//! Insertions are applied from the highest position down, so applying one
//! never shifts the position of another. Tags landing on the same position
//! are ordered so that the output stays well nested.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::regions::{TagRegion, tag_regions};
use crate::error::MarkupResult;
use crate::metadata::{Alignment, PhrasePair, Segmentation, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Closing,
    Standalone,
    Opening,
}

#[derive(Debug)]
struct Insertion {
    slot: Slot,
    /// Index of the first tag in the tokenized source
    token: usize,
    tags: Vec<String>,
}

/// Insertions collected per target position before they are applied
#[derive(Default)]
struct Planner {
    insertions: BTreeMap<usize, Vec<Insertion>>,
}

impl Planner {
    fn push(&mut self, position: usize, slot: Slot, token: usize, tags: Vec<String>) {
        self.insertions
            .entry(position)
            .or_default()
            .push(Insertion { slot, token, tags });
    }

    fn standalone(&mut self, position: usize, token: usize, tags: Vec<String>) {
        self.push(position, Slot::Standalone, token, tags);
    }

    fn pair(
        &mut self,
        (opening, closing): (String, String),
        (open_at, close_at): (usize, usize),
        (open_token, close_token): (usize, usize),
    ) {
        if close_at <= open_at {
            self.standalone(open_at, open_token, vec![opening, closing]);
            return;
        }
        self.push(open_at, Slot::Opening, open_token, vec![opening]);
        self.push(close_at, Slot::Closing, close_token, vec![closing]);
    }
}

/// Reinsert the tags of `source_tokens` into `target_tokens`
pub fn reinsert(
    source_tokens: &[String],
    target_tokens: &[String],
    segmentation: &Segmentation,
    alignment: &Alignment,
) -> MarkupResult<Vec<String>> {
    let target_len = target_tokens.len();
    let mut planner = Planner::default();

    for region in tag_regions(source_tokens)? {
        match region {
            TagRegion::SelfClosing {
                tag,
                position,
                token,
            } => {
                let insert_at = match alignment.targets(position).first() {
                    Some(&target) => target,
                    None => {
                        debug!(%tag, position, "self-closing tag is unaligned, appending");
                        target_len
                    }
                };
                planner.standalone(insert_at, token, vec![tag]);
            }
            TagRegion::Pair {
                opening,
                closing,
                start,
                end,
                tokens,
            } if start == end => {
                let insert_at = match start.checked_sub(1) {
                    None => 0,
                    Some(previous) => match alignment.targets(previous).first() {
                        Some(&target) => target + 1,
                        None => {
                            debug!(%opening, previous, "empty element is unaligned, appending");
                            target_len
                        }
                    },
                };
                planner.standalone(insert_at, tokens.0, vec![opening, closing]);
            }
            TagRegion::Pair {
                opening,
                closing,
                start,
                end,
                tokens,
            } => place_pair(
                (opening, closing),
                tokens,
                Span::new(start, end - 1),
                segmentation,
                alignment,
                target_len,
                &mut planner,
            ),
        }
    }

    Ok(apply(target_tokens, planner.insertions))
}

/// Apply insertions from the highest target position down
fn apply(target_tokens: &[String], insertions: BTreeMap<usize, Vec<Insertion>>) -> Vec<String> {
    let mut output = target_tokens.to_vec();
    for (position, group) in insertions.into_iter().rev() {
        let at = position.min(output.len());
        output.splice(at..at, order_at_position(group));
    }
    output
}

/// Tags meeting at one position, in output order
///
/// Closing tags come first and opening tags last, each in source order, so
/// inner regions close before outer ones and outer regions open first.
/// Standalone tags go in front of the first tag that follows them in the
/// source, which keeps them inside the region they were found in.
fn order_at_position(group: Vec<Insertion>) -> Vec<String> {
    let (mut standalone, mut paired): (Vec<Insertion>, Vec<Insertion>) = group
        .into_iter()
        .partition(|insertion| insertion.slot == Slot::Standalone);
    paired.sort_by_key(|insertion| (insertion.slot == Slot::Opening, insertion.token));
    standalone.sort_by_key(|insertion| insertion.token);

    for insertion in standalone {
        let at = paired
            .iter()
            .position(|other| other.token > insertion.token)
            .unwrap_or(paired.len());
        paired.insert(at, insertion);
    }
    paired.into_iter().flat_map(|insertion| insertion.tags).collect()
}

fn place_pair(
    (opening, closing): (String, String),
    tokens: (usize, usize),
    region: Span,
    segmentation: &Segmentation,
    alignment: &Alignment,
    target_len: usize,
    planner: &mut Planner,
) {
    let phrases = source_phrase_regions(region, segmentation);
    let covering: Vec<Span> = phrases.iter().map(|p| p.target).collect();
    let contiguous = is_contiguous(&covering);

    if boundaries_coincide(region, &phrases) {
        if contiguous {
            debug!(%opening, "rule 1: tags wrap the covering target phrases");
            let (first, last) = (covering[0], covering[covering.len() - 1]);
            planner.pair((opening, closing), (first.start, last.end + 1), tokens);
        } else {
            debug!(%opening, "rule 3: tags wrap the outermost target phrases");
            let (leftmost, rightmost) = outermost(&covering);
            planner.pair((opening, closing), (leftmost.start, rightmost.end + 1), tokens);
        }
        return;
    }

    let aligned: BTreeSet<usize> = region
        .indexes()
        .flat_map(|index| alignment.targets(index).iter().copied())
        .collect();

    if contiguous {
        debug!(%opening, "rule 2: tags wrap the aligned target tokens");
        let open_at = aligned.first().copied().unwrap_or(target_len);
        let close_at = aligned.last().map_or(target_len, |last| last + 1);
        planner.pair((opening, closing), (open_at, close_at), tokens);
    } else {
        debug!(%opening, "rule 3.5: tags wrap the aligned tokens of the outermost phrases");
        let (leftmost, rightmost) = outermost(&covering);
        let open_at = leftmost
            .indexes()
            .find(|index| aligned.contains(index))
            .unwrap_or(leftmost.start);
        let close_at = rightmost
            .indexes()
            .rev()
            .find(|index| aligned.contains(index))
            .unwrap_or(rightmost.end + 1);
        planner.pair((opening, closing), (open_at, close_at), tokens);
    }
}

/// Source phrases overlapping `region`, as one contiguous run in source order
fn source_phrase_regions(region: Span, segmentation: &Segmentation) -> Vec<PhrasePair> {
    let mut phrases = Vec::new();
    for pair in segmentation.pairs() {
        let overlaps = pair.source.start <= region.end && region.start <= pair.source.end;
        if overlaps {
            phrases.push(*pair);
        } else if !phrases.is_empty() {
            break;
        }
    }
    phrases
}

/// The region starts where the first phrase starts and ends where the last one ends
fn boundaries_coincide(region: Span, phrases: &[PhrasePair]) -> bool {
    match (phrases.first(), phrases.last()) {
        (Some(first), Some(last)) => {
            region.start == first.source.start && region.end == last.source.end
        }
        _ => false,
    }
}

/// Every phrase starts right after the previous one ends
fn is_contiguous(phrases: &[Span]) -> bool {
    phrases.windows(2).all(|w| w[0].end + 1 == w[1].start)
}

/// The phrase with the smallest start and the phrase with the largest end
///
/// Only called with a non-empty slice.
fn outermost(phrases: &[Span]) -> (Span, Span) {
    let leftmost = phrases
        .iter()
        .copied()
        .min_by_key(|p| p.start)
        .unwrap_or(Span::new(0, 0));
    let rightmost = phrases
        .iter()
        .copied()
        .max_by_key(|p| p.end)
        .unwrap_or(leftmost);
    (leftmost, rightmost)
}
