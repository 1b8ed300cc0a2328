//! Machine translation with protected markup
//!
//! Wraps a [`TranslationEngine`] in a [`SegmentTranslator`] that masks or
//! strips markup and other protected spans before the engine sees a segment,
//! and restores them in the translation afterwards.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use markup_guard::{MarkupConfig, XmlStrategy};
//! use markup_guard_mt::{MockEngine, SegmentTranslator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = MockEngine::dictionary([("the", "le"), ("sky", "ciel")]);
//!     let translator = SegmentTranslator::new(
//!         Arc::new(engine),
//!         MarkupConfig::for_xml(XmlStrategy::StripReinsert),
//!     );
//!
//!     let translation = translator.translate("in the <b> sky </b>").await?;
//!     assert_eq!(translation, "in le <b> ciel </b>");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod mock;
pub mod pipeline;
pub mod translator;


pub use error::{MtError, MtResult};
pub use mock::{MockEngine, MockMode};
pub use pipeline::{PreparedSegment, SegmentTranslator};
pub use translator::{EngineOutput, TranslationEngine};
