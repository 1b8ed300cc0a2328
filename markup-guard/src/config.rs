//! Markup handling configuration
//!
//! A [`MarkupConfig`] decides what happens to protected spans and markup
//! around one translation. It is plain data, typically loaded from the JSON
//! file stored next to a trained engine:
//!
//! ```json
//! { "xml": "strip-reinsert", "reinsertion": "full", "force_all": true }
//! ```
//!
//! Unset strategies fall back to the defaults of the chosen XML strategy.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MarkupError, MarkupResult};
use crate::masking::MaskingStrategy;
use crate::reinsertion::{Reinserter, ReinsertionStrategy};

/// File name used for the persisted configuration inside an engine directory
pub const MARKUP_CONFIG_FILE_NAME: &str = "markup.json";

/// How markup in a segment is treated around the engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XmlStrategy {
    /// Leave markup alone, only escape reserved characters
    #[default]
    PassThrough,
    /// Remove markup before translation and never restore it
    Strip,
    /// Remove markup before translation and reinsert it afterwards
    StripReinsert,
    /// Replace markup with placeholders and unmask afterwards
    Mask,
}

impl XmlStrategy {
    /// Name used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            XmlStrategy::PassThrough => "pass-through",
            XmlStrategy::Strip => "strip",
            XmlStrategy::StripReinsert => "strip-reinsert",
            XmlStrategy::Mask => "mask",
        }
    }

    /// Whether markup is removed from the engine input
    pub fn strips(&self) -> bool {
        matches!(self, XmlStrategy::Strip | XmlStrategy::StripReinsert)
    }
}

impl fmt::Display for XmlStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for XmlStrategy {
    type Err = MarkupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass-through" => Ok(XmlStrategy::PassThrough),
            "strip" => Ok(XmlStrategy::Strip),
            "strip-reinsert" => Ok(XmlStrategy::StripReinsert),
            "mask" => Ok(XmlStrategy::Mask),
            other => Err(MarkupError::unsupported("xml", other)),
        }
    }
}

fn default_escape() -> bool {
    true
}

/// Everything the pipeline needs to know about protected spans and markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// Mask e-mail addresses, URLs and other non-markup protected spans
    #[serde(default)]
    pub masking: Option<MaskingStrategy>,
    /// Escape reserved characters in the engine input
    #[serde(default = "default_escape")]
    pub escape: bool,
    #[serde(default)]
    pub xml: XmlStrategy,
    #[serde(default)]
    pub reinsertion: Option<ReinsertionStrategy>,
    /// Append tags that cannot be placed instead of dropping them
    #[serde(default)]
    pub force_all: bool,
    /// Wrap placeholders in forced-translation directives
    #[serde(default)]
    pub force_mask_translation: bool,
    /// Remove all markup from the final translation
    #[serde(default)]
    pub strip_output: bool,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        MarkupConfig {
            masking: None,
            escape: true,
            xml: XmlStrategy::default(),
            reinsertion: None,
            force_all: false,
            force_mask_translation: false,
            strip_output: false,
        }
    }
}

impl MarkupConfig {
    /// Configuration for one XML strategy with every other setting at its default
    pub fn for_xml(xml: XmlStrategy) -> Self {
        MarkupConfig {
            xml,
            ..MarkupConfig::default()
        }
    }

    /// Parse a JSON document
    ///
    /// # Example
    /// ```
    /// use markup_guard::config::{MarkupConfig, XmlStrategy};
    /// use markup_guard::reinsertion::ReinsertionStrategy;
    ///
    /// let config = MarkupConfig::from_json(r#"{ "xml": "strip-reinsert" }"#).unwrap();
    /// assert_eq!(config.xml, XmlStrategy::StripReinsert);
    /// assert_eq!(config.reinsertion_strategy(), ReinsertionStrategy::Alignment);
    /// assert!(config.escape);
    /// ```
    pub fn from_json(json: &str) -> MarkupResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> MarkupResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration written by [`MarkupConfig::write_to`]
    pub fn from_file(path: &Path) -> MarkupResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Persist the configuration, usually as [`MARKUP_CONFIG_FILE_NAME`] in an engine directory
    pub fn write_to(&self, path: &Path) -> MarkupResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// The reinsertion strategy in effect, alignment unless set
    pub fn reinsertion_strategy(&self) -> ReinsertionStrategy {
        self.reinsertion.unwrap_or_default()
    }

    /// The placeholder spelling used for markup under [`XmlStrategy::Mask`]
    pub fn markup_masking_strategy(&self) -> MaskingStrategy {
        self.masking.unwrap_or(MaskingStrategy::Identity)
    }

    /// A reinserter, if markup is to be restored after translation
    pub fn reinserter(&self) -> Option<Reinserter> {
        match self.xml {
            XmlStrategy::StripReinsert => {
                Some(Reinserter::new(self.reinsertion_strategy()).with_force_all(self.force_all))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_strategy_names() {
        for strategy in [
            XmlStrategy::PassThrough,
            XmlStrategy::Strip,
            XmlStrategy::StripReinsert,
            XmlStrategy::Mask,
        ] {
            assert_eq!(strategy.name().parse::<XmlStrategy>().unwrap(), strategy);
        }
        let err = "drop".parse::<XmlStrategy>().unwrap_err();
        assert!(matches!(err, MarkupError::UnsupportedStrategy { kind: "xml", .. }));
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = MarkupConfig::from_json("{}").unwrap();
        assert_eq!(config, MarkupConfig::default());
        assert!(config.escape);
        assert!(!config.force_all);
        assert!(!config.strip_output);
        assert_eq!(config.xml, XmlStrategy::PassThrough);
        assert!(config.reinserter().is_none());
    }

    #[test]
    fn test_strategy_defaults() {
        let strip = MarkupConfig::for_xml(XmlStrategy::Strip);
        assert_eq!(strip.reinsertion_strategy(), ReinsertionStrategy::Alignment);
        assert!(strip.reinserter().is_none());

        let mask = MarkupConfig::for_xml(XmlStrategy::Mask);
        assert_eq!(mask.markup_masking_strategy(), MaskingStrategy::Identity);
    }

    #[test]
    fn test_explicit_settings() {
        let config = MarkupConfig::from_json(
            r#"{
                "masking": "alignment",
                "escape": false,
                "xml": "strip-reinsert",
                "reinsertion": "segmentation-only",
                "force_all": true,
                "strip_output": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.masking, Some(MaskingStrategy::Alignment));
        assert!(!config.escape);
        assert!(config.strip_output);
        let reinserter = config.reinserter().unwrap();
        assert_eq!(reinserter.strategy(), ReinsertionStrategy::Segmentation);
        assert!(reinserter.force_all());
    }

    #[test]
    fn test_invalid_json() {
        let err = MarkupConfig::from_json(r#"{ "xml": "shred" }"#).unwrap_err();
        assert!(matches!(err, MarkupError::InvalidConfig(_)));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MARKUP_CONFIG_FILE_NAME);
        let config = MarkupConfig {
            reinsertion: Some(ReinsertionStrategy::Full),
            ..MarkupConfig::for_xml(XmlStrategy::StripReinsert)
        };
        config.write_to(&path).unwrap();
        assert_eq!(MarkupConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MarkupConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, MarkupError::Io(_)));
    }
}
