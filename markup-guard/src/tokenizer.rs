//! Markup-aware tokenization
//!
//! Splits a segment into space-separated tokens without ever breaking a tag
//! apart: `<a href="x y">` stays one token even though it contains a space.
//! The scan is structural rather than a regex split, so that nesting is
//! checked and attributes are normalised as it goes:
//!
//! - opening, closing and self-closing tags are one token each
//! - an element with nothing at all between its tags, `<b></b>`, becomes `<b/>`
//! - attribute values are re-quoted (`'x'` becomes `"x"`)
//! - comments and processing instructions are dropped, CDATA is text
//! - entities in text are decoded and `&`, `<`, `>` re-escaped per token
//! - tokens consisting only of whitespace are dropped
//!
//! Unbalanced markup is rejected with [`MarkupError::MalformedMarkup`].

use tracing::debug;

use crate::error::{MarkupError, MarkupResult};
use crate::escape::escape_xml_text;

/// The three kinds of tag token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Opening,
    Closing,
    SelfClosing,
}

impl TagKind {
    /// Classify a single token, `None` for anything that is not a tag
    ///
    /// # Example
    /// ```
    /// use markup_guard::tokenizer::TagKind;
    /// assert_eq!(TagKind::of("<a href=\"x\">"), Some(TagKind::Opening));
    /// assert_eq!(TagKind::of("</a>"), Some(TagKind::Closing));
    /// assert_eq!(TagKind::of("<br/>"), Some(TagKind::SelfClosing));
    /// assert_eq!(TagKind::of("&lt;a&gt;"), None);
    /// ```
    pub fn of(token: &str) -> Option<TagKind> {
        let inner = token.strip_prefix('<')?.strip_suffix('>')?;
        let (kind, name) = if let Some(name) = inner.strip_prefix('/') {
            (TagKind::Closing, name)
        } else if let Some(body) = inner.strip_suffix('/') {
            (TagKind::SelfClosing, body)
        } else {
            (TagKind::Opening, inner)
        };
        match name.chars().next() {
            Some(c) if is_name_start(c) => Some(kind),
            _ => None,
        }
    }
}

/// Whether `token` is an opening, closing or self-closing tag
pub fn is_xml_tag(token: &str) -> bool {
    TagKind::of(token).is_some()
}

/// Tokenize `text` on spaces, keeping every tag intact as one token
///
/// # Example
/// ```
/// use markup_guard::tokenizer::tokenize_keep_markup;
/// let tokens = tokenize_keep_markup("in the <a href=\"x y\"> sky </a> much").unwrap();
/// assert_eq!(tokens, vec!["in", "the", "<a href=\"x y\">", "sky", "</a>", "much"]);
/// ```
pub fn tokenize_keep_markup(text: &str) -> MarkupResult<Vec<String>> {
    let mut scanner = MarkupScanner::new(text);
    scanner.run()?;
    Ok(scanner.tokens)
}

/// Remove all tags from `segment` and normalise whitespace between tokens
pub fn strip_markup(segment: &str) -> MarkupResult<String> {
    Ok(tokenize_keep_markup(segment)?
        .into_iter()
        .filter(|token| !is_xml_tag(token))
        .collect::<Vec<_>>()
        .join(" "))
}

/// An element that has been opened but not yet closed
struct OpenElement {
    name: String,
    /// Tag contents between the angle brackets, without a trailing slash
    body: String,
}

struct MarkupScanner<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<String>,
    open: Vec<OpenElement>,
    /// The last token is an opening tag with nothing after it yet
    pending_open: bool,
}

impl<'a> MarkupScanner<'a> {
    fn new(input: &'a str) -> Self {
        MarkupScanner {
            input,
            pos: 0,
            tokens: Vec::new(),
            open: Vec::new(),
            pending_open: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn run(&mut self) -> MarkupResult<()> {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let end = self.find_or_fail("]]>", "CDATA section")?;
                let content = &self.input[self.pos..end];
                self.pos = end + "]]>".len();
                self.text(content.to_string());
            } else if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("</") {
                self.closing_tag()?;
            } else if rest.starts_with('<') {
                self.start_tag()?;
            } else {
                let end = rest.find('<').map_or(self.input.len(), |i| self.pos + i);
                let raw = &self.input[self.pos..end];
                self.pos = end;
                self.text(decode_entities(raw));
            }
        }

        if let Some(element) = self.open.last() {
            return Err(MarkupError::MalformedMarkup(format!(
                "element <{}> is never closed",
                element.name
            )));
        }
        Ok(())
    }

    fn find_or_fail(&self, needle: &str, what: &str) -> MarkupResult<usize> {
        self.rest()
            .find(needle)
            .map(|i| self.pos + i)
            .ok_or_else(|| MarkupError::MalformedMarkup(format!("unterminated {}", what)))
    }

    fn skip_past(&mut self, needle: &str, what: &str) -> MarkupResult<()> {
        let end = self.find_or_fail(needle, what)?;
        self.pos = end + needle.len();
        Ok(())
    }

    fn text(&mut self, content: String) {
        if content.is_empty() {
            return;
        }
        self.pending_open = false;
        self.tokens.extend(
            content
                .split(' ')
                .filter(|token| !token.trim().is_empty())
                .map(escape_xml_text),
        );
    }

    fn start_tag(&mut self) -> MarkupResult<()> {
        self.pos += 1;
        let name = self.name()?;
        let mut attributes: Vec<String> = Vec::new();

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                let body = tag_body(&name, &attributes);
                self.tokens.push(format!("<{}/>", body));
                self.pending_open = false;
                return Ok(());
            } else if rest.starts_with('>') {
                self.pos += 1;
                let body = tag_body(&name, &attributes);
                self.tokens.push(format!("<{}>", body));
                self.pending_open = true;
                self.open.push(OpenElement { name, body });
                return Ok(());
            } else if rest.is_empty() {
                return Err(MarkupError::MalformedMarkup(format!(
                    "unterminated tag <{}",
                    name
                )));
            }

            let key = self.name()?;
            self.skip_whitespace();
            if !self.rest().starts_with('=') {
                return Err(MarkupError::MalformedMarkup(format!(
                    "attribute '{}' of <{}> has no value",
                    key, name
                )));
            }
            self.pos += 1;
            self.skip_whitespace();
            let value = self.quoted_value(&name)?;
            attributes.push(format!("{}={}", key, quote_attribute(&value)));
        }
    }

    fn closing_tag(&mut self) -> MarkupResult<()> {
        self.pos += 2;
        let name = self.name()?;
        self.skip_whitespace();
        if !self.rest().starts_with('>') {
            return Err(MarkupError::MalformedMarkup(format!(
                "unterminated closing tag </{}",
                name
            )));
        }
        self.pos += 1;

        let element = self.open.pop().ok_or_else(|| {
            MarkupError::MalformedMarkup(format!("closing tag </{}> without opening tag", name))
        })?;
        if element.name != name {
            return Err(MarkupError::MalformedMarkup(format!(
                "closing tag </{}> does not match <{}>",
                name, element.name
            )));
        }

        if self.pending_open {
            // nothing between the tags: collapse into one self-closing token
            debug!(element = %name, "collapsing empty element");
            if let Some(last) = self.tokens.last_mut() {
                *last = format!("<{}/>", element.body);
            }
            self.pending_open = false;
        } else {
            self.tokens.push(format!("</{}>", name));
        }
        Ok(())
    }

    fn name(&mut self) -> MarkupResult<String> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if is_name_start(c) => {}
            _ => {
                return Err(MarkupError::MalformedMarkup(format!(
                    "expected a name at byte {}",
                    self.pos
                )));
            }
        }
        let len = chars
            .find(|(_, c)| !is_name_char(*c))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += len;
        Ok(rest[..len].to_string())
    }

    fn quoted_value(&mut self, element: &str) -> MarkupResult<String> {
        let rest = self.rest();
        let quote = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                return Err(MarkupError::MalformedMarkup(format!(
                    "unquoted attribute value in <{}>",
                    element
                )));
            }
        };
        let end = rest[1..].find(quote).ok_or_else(|| {
            MarkupError::MalformedMarkup(format!("unterminated attribute value in <{}>", element))
        })?;
        let raw = &rest[1..1 + end];
        if raw.contains('<') {
            return Err(MarkupError::MalformedMarkup(format!(
                "'<' in attribute value of <{}>",
                element
            )));
        }
        self.pos += end + 2;
        Ok(decode_entities(raw))
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

fn tag_body(name: &str, attributes: &[String]) -> String {
    if attributes.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, attributes.join(" "))
    }
}

/// Quote an attribute value, preferring double quotes
fn quote_attribute(value: &str) -> String {
    let escaped = escape_xml_text(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;");
    if escaped.contains('"') {
        if escaped.contains('\'') {
            format!("\"{}\"", escaped.replace('"', "&quot;"))
        } else {
            format!("'{}'", escaped)
        }
    } else {
        format!("\"{}\"", escaped)
    }
}

/// Decode predefined and numeric character references
///
/// Anything that does not form a valid reference is kept literally.
fn decode_entities(raw: &str) -> String {
    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let reference = rest
            .find(';')
            .filter(|&semi| semi > 1 && semi <= 10)
            .and_then(|semi| decode_reference(&rest[1..semi]).map(|c| (c, semi)));
        match reference {
            Some((c, semi)) => {
                decoded.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        tokenize_keep_markup(text).unwrap()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(tokens("in the sky much"), vec!["in", "the", "sky", "much"]);
    }

    #[test]
    fn test_tags_are_single_tokens() {
        assert_eq!(
            tokens("in the <b> sky </b> much"),
            vec!["in", "the", "<b>", "sky", "</b>", "much"]
        );
    }

    #[test]
    fn test_tags_without_surrounding_spaces() {
        assert_eq!(tokens("a<b>c</b>d"), vec!["a", "<b>", "c", "</b>", "d"]);
    }

    #[test]
    fn test_attribute_with_spaces() {
        assert_eq!(
            tokens("<a href=\"http://x.org/a b\" id='n1'> link </a>"),
            vec!["<a href=\"http://x.org/a b\" id=\"n1\">", "link", "</a>"]
        );
    }

    #[test]
    fn test_attribute_quoting() {
        assert_eq!(tokens("<a t='say \"hi\"'/>"), vec!["<a t='say \"hi\"'/>"]);
        assert_eq!(
            tokens("<a t=\"it&apos;s &quot;x&quot;\"/>"),
            vec!["<a t=\"it's &quot;x&quot;\"/>"]
        );
        assert_eq!(tokens("<a t=\"x &amp; y\"/>"), vec!["<a t=\"x &amp; y\"/>"]);
    }

    #[test]
    fn test_self_closing() {
        assert_eq!(tokens("a <br/> b <hr />"), vec!["a", "<br/>", "b", "<hr/>"]);
    }

    #[test]
    fn test_empty_element_collapses() {
        assert_eq!(tokens("a <b></b> c"), vec!["a", "<b/>", "c"]);
        // whitespace counts as content
        assert_eq!(tokens("a <b> </b> c"), vec!["a", "<b>", "</b>", "c"]);
    }

    #[test]
    fn test_nested() {
        assert_eq!(
            tokens("<a> x <b> y </b> z </a>"),
            vec!["<a>", "x", "<b>", "y", "</b>", "z", "</a>"]
        );
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(tokens("a &amp; b &lt;c&gt;"), vec!["a", "&amp;", "b", "&lt;c&gt;"]);
        assert_eq!(tokens("&quot;x&quot; &#65;"), vec!["\"x\"", "A"]);
        assert_eq!(tokens("fish & chips > 1"), vec!["fish", "&amp;", "chips", "&gt;", "1"]);
    }

    #[test]
    fn test_comments_and_instructions_dropped() {
        assert_eq!(tokens("a <!-- note --> b <?pi x?> c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cdata_is_text() {
        assert_eq!(tokens("<![CDATA[x < y]]>"), vec!["x", "&lt;", "y"]);
    }

    #[test]
    fn test_whitespace_tokens_dropped() {
        assert_eq!(tokens("  a   b "), vec!["a", "b"]);
        assert!(tokens("").is_empty());
    }

    #[test]
    fn test_restartable() {
        let text = "<p> one <i> two </i> </p>";
        assert_eq!(tokens(text), tokens(text));
    }

    #[test]
    fn test_malformed_markup() {
        for bad in [
            "</b> orphan",
            "<b> never closed",
            "<a> <b> crossed </a> </b>",
            "<a href=x> unquoted </a>",
            "<a",
            "<!-- open",
            "< spaced>",
        ] {
            assert!(
                matches!(tokenize_keep_markup(bad), Err(MarkupError::MalformedMarkup(_))),
                "expected failure for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_tag_kind() {
        assert_eq!(TagKind::of("<b>"), Some(TagKind::Opening));
        assert_eq!(TagKind::of("<x:y a=\"1\">"), Some(TagKind::Opening));
        assert_eq!(TagKind::of("</b>"), Some(TagKind::Closing));
        assert_eq!(TagKind::of("<br/>"), Some(TagKind::SelfClosing));
        assert_eq!(TagKind::of("<a href=\"1\"/>"), Some(TagKind::SelfClosing));
        assert_eq!(TagKind::of("<"), None);
        assert_eq!(TagKind::of("<>"), None);
        assert_eq!(TagKind::of("< b>"), None);
        assert_eq!(TagKind::of("word"), None);
        assert!(is_xml_tag("</a>"));
        assert!(!is_xml_tag("__xml_0__"));
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("in the <b> sky </b>  much <br/>").unwrap(),
            "in the sky much"
        );
        assert_eq!(strip_markup("no tags").unwrap(), "no tags");
    }

    #[test]
    fn test_decode_entities_keeps_unknown() {
        assert_eq!(decode_entities("a &nbsp; b & c &#xZZ;"), "a &nbsp; b & c &#xZZ;");
        assert_eq!(decode_entities("&#x41;&#66;"), "AB");
    }
}
