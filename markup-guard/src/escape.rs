//! Escaping of characters that are reserved in Moses
//!
//! The replacement table is ordered: `&` must go first so that the entities
//! introduced by later replacements are not escaped a second time. Reversal
//! walks the same table backwards for the same reason.

/// Reserved characters and their entity replacements, in application order
pub const MOSES_SPECIAL_CHARS: [(&str, &str); 8] = [
    ("&", "&amp;"),
    ("|", "&#124;"),
    ("<", "&lt;"),
    (">", "&gt;"),
    ("\"", "&quot;"),
    ("'", "&apos;"),
    ("[", "&#91;"),
    ("]", "&#93;"),
];

/// Escape every Moses-reserved character in `segment`
///
/// # Example
/// ```
/// use markup_guard::escape::escape_special_chars;
/// assert_eq!(escape_special_chars("a & [b]"), "a &amp; &#91;b&#93;");
/// ```
pub fn escape_special_chars(segment: &str) -> String {
    let mut result = segment.to_string();
    for (reserved, replacement) in MOSES_SPECIAL_CHARS {
        result = result.replace(reserved, replacement);
    }
    result
}

/// Reverse [`escape_special_chars`]
pub fn deescape_special_chars(segment: &str) -> String {
    let mut result = segment.to_string();
    for (reserved, replacement) in MOSES_SPECIAL_CHARS.iter().rev() {
        result = result.replace(replacement, reserved);
    }
    result
}

/// Escape the three characters XML requires in character data
pub(crate) fn escape_xml_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_reserved() {
        assert_eq!(
            escape_special_chars("the ships & hung < in the > [ sky ] ."),
            "the ships &amp; hung &lt; in the &gt; &#91; sky &#93; ."
        );
    }

    #[test]
    fn test_escape_quotes_and_pipe() {
        assert_eq!(
            escape_special_chars("\"a\" | 'b'"),
            "&quot;a&quot; &#124; &apos;b&apos;"
        );
    }

    #[test]
    fn test_ampersand_not_double_escaped() {
        // `<` becomes `&lt;`; its ampersand must not turn into `&amp;lt;`
        assert_eq!(escape_special_chars("<"), "&lt;");
    }

    #[test]
    fn test_deescape_restores_original() {
        let samples = [
            "the ships & hung < in the > [ sky ] .",
            "\"quoted\" and 'single' | piped",
            "already &amp; escaped",
            "",
        ];
        for sample in samples {
            assert_eq!(deescape_special_chars(&escape_special_chars(sample)), sample);
        }
    }

    #[test]
    fn test_placeholders_untouched() {
        assert_eq!(escape_special_chars("__xml_0__ & __url__"), "__xml_0__ &amp; __url__");
    }

    #[test]
    fn test_escape_xml_text() {
        assert_eq!(escape_xml_text("a<b & c>'d'"), "a&lt;b &amp; c&gt;'d'");
    }
}
