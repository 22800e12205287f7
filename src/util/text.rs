use std::borrow::Cow;

/// Collapses every run of whitespace into a single space and trims both ends.
///
/// Anchor text scraped from HTML usually carries the indentation and line
/// breaks of the surrounding markup; this turns it back into a display title.
///
/// # Examples
///
/// ```
/// use pagefeed::util::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("  Annual\n\t Report  2024 "), "Annual Report 2024");
/// assert_eq!(collapse_whitespace("   "), "");
/// ```
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Removes characters outside the XML 1.0 `Char` production.
///
/// Entity escaping cannot rescue these: `&#x1;` is just as illegal as the raw
/// byte. Scraped pages occasionally contain them (form feeds, stray NULs from
/// broken CMS exports), so every piece of page-derived text passes through
/// here before it reaches the feed writer.
///
/// Strips:
/// - C0 controls except tab (0x09), newline (0x0A) and carriage return (0x0D)
/// - The non-characters U+FFFE and U+FFFF
///
/// Returns `Cow::Borrowed` when nothing needs removing (the common case).
pub fn strip_xml_illegal(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_xml_illegal) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_xml_illegal(c)).collect())
}

fn is_xml_illegal(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}')
        || c == '\u{fffe}'
        || c == '\u{ffff}'
}
