//! Checks over rendered message text and markup

use once_cell::sync::Lazy;
use regex::Regex;

static BLOCK_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<div|<p").expect("valid block markup pattern"));

static OPENING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<([a-z]+)").expect("valid opening tag pattern"));

/// Whether text contains `<` or `>`
pub fn contains_angle_brackets(text: &str) -> bool {
    text.contains(['<', '>'])
}

/// Whether text contains a `<div` or `<p` opening (case-insensitive)
pub fn contains_block_markup(text: &str) -> bool {
    BLOCK_MARKUP.is_match(text)
}

/// Whether the markup ends inside an element that is never closed.
///
/// An opening tag counts as unclosed when the rest of its line runs to the
/// end of the markup without the matching `</tag>`.
pub fn has_unclosed_tag(html: &str) -> bool {
    OPENING_TAG.captures_iter(html).any(|caps| {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            return false;
        };
        let rest = &html[whole.end()..];
        if rest.contains('\n') {
            return false;
        }
        let closing = format!("</{}>", name.as_str().to_ascii_lowercase());
        !rest.to_ascii_lowercase().contains(&closing)
    })
}

/// Whether the markup has as many `<` as `>`
pub fn angle_brackets_balanced(html: &str) -> bool {
    html.matches('<').count() == html.matches('>').count()
}

/// Text as a browser serialises it inside an element: `&`, `<` and `>`
/// become entities, quotes stay as they are
pub fn escape_html(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Whether `raw` was rendered as literal text rather than as markup:
/// visible in the text, absent from the markup, present there in `escaped`
/// form.
pub fn is_rendered_literally(text: &str, html: &str, raw: &str, escaped: &str) -> bool {
    text.contains(raw) && !html.contains(raw) && html.contains(escaped)
}

/// Whether `haystack` contains any of `needles`, ignoring case
pub fn contains_any_ignore_case<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .any(|n| haystack.contains(&n.as_ref().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("<div><p>Open 8am</p></div>", false ; "closed")]
    #[test_case("<div><p>Open 8am</p>", true ; "unclosed div on last line")]
    #[test_case("<div>\n<p>Open</p>\n</div>", false ; "multi line closed")]
    #[test_case("<P>Hours</p>", false ; "case insensitive close")]
    #[test_case("<p>Hours", true ; "never closed")]
    #[test_case("plain text", false ; "no markup")]
    fn test_has_unclosed_tag(html: &str, expected: bool) {
        assert_eq!(has_unclosed_tag(html), expected);
    }

    #[test]
    fn test_block_markup_and_brackets() {
        assert!(contains_block_markup("<DIV class=\"x\">"));
        assert!(contains_block_markup("<p>"));
        assert!(!contains_block_markup("paragraph"));
        assert!(contains_angle_brackets("a < b"));
        assert!(!contains_angle_brackets("a and b"));
        assert!(angle_brackets_balanced("<div><p>x</p></div>"));
        assert!(!angle_brackets_balanced("<div><p x</div>"));
    }

    #[test]
    fn test_script_tag_rendered_literally() {
        let raw = "<script>alert('x')</script>";
        let escaped = escape_html(raw);
        assert_eq!(escaped, "&lt;script&gt;alert('x')&lt;/script&gt;");

        let text = "Hello <script>alert('x')</script>";
        let safe_html = format!("<p>Hello {}</p>", escaped);
        assert!(is_rendered_literally(text, &safe_html, raw, &escaped));

        let unsafe_html = format!("<p>Hello {}</p>", raw);
        assert!(!is_rendered_literally(text, &unsafe_html, raw, &escaped));
    }

    #[test_case("<script>alert('x')</script>", "&lt;script&gt;alert('x')&lt;/script&gt;" ; "single quotes")]
    #[test_case(r#"<script>alert("xss")</script>"#, r#"&lt;script&gt;alert("xss")&lt;/script&gt;"# ; "double quotes kept")]
    #[test_case("Tom & Jerry", "Tom &amp; Jerry" ; "ampersand")]
    fn test_escape_html(raw: &str, expected: &str) {
        assert_eq!(escape_html(raw), expected);
    }

    #[test]
    fn test_double_quoted_script_matches_browser_markup() {
        let raw = r#"<script>alert("xss")</script>"#;
        let browser_html = r#"<p>&lt;script&gt;alert("xss")&lt;/script&gt;</p>"#;
        assert!(is_rendered_literally(raw, browser_html, raw, &escape_html(raw)));
    }

    #[test]
    fn test_contains_any_ignore_case() {
        let expected = ["I can only help with", "outside my scope"];
        assert!(contains_any_ignore_case("Sorry, that is OUTSIDE MY SCOPE.", &expected));
        assert!(!contains_any_ignore_case("Here is a joke", &expected));
        assert!(!contains_any_ignore_case::<&str>("anything", &[]));
    }
}
