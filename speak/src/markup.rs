//! Markdown to SSML conversion for the system voice

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*```.*$\n?").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+?)\s*#*\s*$").unwrap());
static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+\.)\s+").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());
static ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s][^*]*?)\*|\b_([^_\s][^_]*?)_\b").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap());
static PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").unwrap());

/// Escape the characters SSML treats as markup
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Convert markdown text into an SSML `<speak>` document.
///
/// Headings and bold text become strong emphasis, italics moderate emphasis,
/// and blank lines become pauses. Links keep only their label; code markers
/// are dropped.
pub fn markdown_to_ssml(markdown: &str) -> String {
    let text = escape_xml(markdown.trim());
    let text = CODE_FENCE.replace_all(&text, "");
    let text = HEADING.replace_all(&text, r#"<emphasis level="strong">$1</emphasis><break time="500ms"/>"#);
    let text = LIST_MARKER.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = BOLD.replace_all(&text, r#"<emphasis level="strong">$1$2</emphasis>"#);
    let text = ITALIC.replace_all(&text, r#"<emphasis level="moderate">$1$2</emphasis>"#);
    let text = PARAGRAPH.replace_all(&text, r#"<break time="750ms"/>"#);

    format!("<speak>{}</speak>", text.trim())
}
