//! Protecting markup and other sensitive spans across machine translation
//!
//! A translation engine works on plain, space-tokenized text and cannot be
//! trusted with markup, e-mail addresses or URLs. This crate provides the two
//! ways of getting such content through an engine unharmed:
//!
//! 1. **Masking** - replace protected spans with placeholder tokens before
//!    translation and swap the original content back in afterwards
//!    ([`Masker`])
//! 2. **Reinsertion** - remove markup before translation and put the tags back
//!    into the translation guided by the engine's word alignment and phrase
//!    segmentation ([`Reinserter`])
//!
//! # Example
//!
//! ```
//! use markup_guard::{Masker, MaskingStrategy};
//!
//! let masker = Masker::new(MaskingStrategy::Identity);
//! let (masked, mapping) = masker.mask_segment("<all> in the sky much </all>");
//! assert_eq!(masked, "__xml_0__ in the sky much __xml_1__");
//!
//! let translated = "__xml_0__ dans le ciel beaucoup __xml_1__";
//! let restored = masker.unmask_segment(&masked, translated, &mapping, None);
//! assert_eq!(restored, "<all> dans le ciel beaucoup </all>");
//! ```
//!
//! All operations are synchronous and keep no state between calls, so
//! independent segments can be processed in parallel.

pub mod config;
pub mod error;
pub mod escape;
pub mod masking;
pub mod metadata;
pub mod patterns;
pub mod reinsertion;
pub mod tokenizer;

// Re-export the main types for convenient access
pub use config::{MarkupConfig, XmlStrategy};
pub use error::{MarkupError, MarkupResult};
pub use escape::{deescape_special_chars, escape_special_chars};
pub use masking::{MaskEntry, Masker, MaskingStrategy, UnmaskOutcome};
pub use metadata::{Alignment, PhrasePair, Segmentation, Span};
pub use patterns::{ProtectedPattern, ProtectedPatterns};
pub use reinsertion::{Reinserter, ReinsertionStrategy};
pub use tokenizer::{TagKind, is_xml_tag, strip_markup, tokenize_keep_markup};
