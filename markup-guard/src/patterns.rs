//! Protected pattern configuration
//!
//! A [`ProtectedPatterns`] value is an ordered list of named regular
//! expressions. Order matters: the masker applies the categories one after
//! another, so later patterns run against text that already contains the
//! placeholders of earlier ones.
//!
//! The same configuration is persisted next to a trained engine so that the
//! tokenizer and masker used at translation time match the ones used during
//! training. The file format is two lines per category:
//!
//! ```text
//! # xml
//! </?[a-zA-Z_][a-zA-Z_.\-0-9]*[^<>]*/?>
//! # email
//! ...
//! ```

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::error::{MarkupError, MarkupResult};

/// File name used for the persisted patterns inside an engine directory
pub const PROTECTED_PATTERNS_FILE_NAME: &str = "protected-patterns.dat";

/// Markup tags: opening, closing and self-closing
pub const XML_PATTERN: &str = r"</?[a-zA-Z_][a-zA-Z_.\-0-9]*[^<>]*/?>";
/// E-mail addresses
pub const EMAIL_PATTERN: &str = r"[\w\-.]+@([\w\-]+\.)+[a-zA-Z]{2,}";
/// Web addresses with a scheme, or starting with `www.`
pub const URL_PATTERN: &str = r"(https?://[^\s.]+\.[^\s]{2,}|www\.[^\s]+\.[^\s]{2,})";

/// One named protected category
#[derive(Debug, Clone)]
pub struct ProtectedPattern {
    /// Category name, used to build placeholder tokens (`__<category>__`)
    pub category: String,
    /// Compiled expression matching the spans to protect
    pub regex: Regex,
}

impl ProtectedPattern {
    /// Compile a single category
    pub fn new(category: &str, pattern: &str) -> MarkupResult<Self> {
        let regex = Regex::new(pattern).map_err(|source| MarkupError::InvalidPattern {
            category: category.to_string(),
            source,
        })?;
        Ok(ProtectedPattern {
            category: category.to_string(),
            regex,
        })
    }

    /// The uncompiled expression
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Ordered, immutable set of protected categories
#[derive(Debug, Clone)]
pub struct ProtectedPatterns {
    patterns: Vec<ProtectedPattern>,
}

impl ProtectedPatterns {
    /// Build a configuration from `(category, regex)` pairs, keeping their order
    ///
    /// # Example
    /// ```
    /// use markup_guard::patterns::ProtectedPatterns;
    /// let patterns = ProtectedPatterns::new([("number", r"\d+")]).unwrap();
    /// assert_eq!(patterns.categories().collect::<Vec<_>>(), vec!["number"]);
    /// ```
    pub fn new<'a, I>(pairs: I) -> MarkupResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let patterns = pairs
            .into_iter()
            .map(|(category, pattern)| ProtectedPattern::new(category, pattern))
            .collect::<MarkupResult<Vec<_>>>()?;
        Ok(ProtectedPatterns { patterns })
    }

    /// Iterate over the categories in application order
    pub fn iter(&self) -> impl Iterator<Item = &ProtectedPattern> {
        self.patterns.iter()
    }

    /// Category names in masking order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.category.as_str())
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The categories accepted by `keep`, in their original order
    pub fn select<F>(&self, keep: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        ProtectedPatterns {
            patterns: self
                .patterns
                .iter()
                .filter(|p| keep(&p.category))
                .cloned()
                .collect(),
        }
    }

    /// Serialize to the two-lines-per-category file layout
    pub fn to_file_contents(&self) -> String {
        self.patterns
            .iter()
            .map(|p| format!("# {}\n{}\n", p.category, p.pattern()))
            .collect()
    }

    /// Parse the two-lines-per-category file layout
    ///
    /// Blank lines are ignored. A regex line without a preceding `# category`
    /// line, or a category without a regex, is an error.
    pub fn parse(contents: &str) -> MarkupResult<Self> {
        let mut patterns = Vec::new();
        let mut pending: Option<&str> = None;

        for (line_number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match (pending, line.strip_prefix('#')) {
                (None, Some(category)) => pending = Some(category.trim()),
                (None, None) => {
                    return Err(MarkupError::PatternFile(format!(
                        "line {}: expected '# <category>', found '{}'",
                        line_number + 1,
                        line
                    )));
                }
                (Some(category), _) => {
                    patterns.push(ProtectedPattern::new(category, line)?);
                    pending = None;
                }
            }
        }

        if let Some(category) = pending {
            return Err(MarkupError::PatternFile(format!(
                "category '{}' has no pattern",
                category
            )));
        }

        Ok(ProtectedPatterns { patterns })
    }

    /// Write the configuration to `path`
    pub fn write_to(&self, path: &Path) -> MarkupResult<()> {
        debug!(path = %path.display(), categories = self.len(), "writing protected patterns");
        fs::write(path, self.to_file_contents())?;
        Ok(())
    }

    /// Load a configuration previously written with [`ProtectedPatterns::write_to`]
    pub fn from_file(path: &Path) -> MarkupResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }
}

impl Default for ProtectedPatterns {
    /// `xml`, `email`, `url`, in that order
    fn default() -> Self {
        let patterns = [
            ("xml", XML_PATTERN),
            ("email", EMAIL_PATTERN),
            ("url", URL_PATTERN),
        ]
        .into_iter()
        .map(|(category, pattern)| ProtectedPattern {
            category: category.to_string(),
            regex: Regex::new(pattern).unwrap_or_else(|_| unreachable!("built-in pattern")),
        })
        .collect();
        ProtectedPatterns { patterns }
    }
}
