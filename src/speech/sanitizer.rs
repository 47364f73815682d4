//! Markdown stripping for speech synthesis
//!
//! Assistant replies are rendered as markdown in the chat log but the TTS
//! engine would read the markup aloud. Everything here removes syntax and
//! keeps the visible text.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[\w+#.-]*[ \t]*\n)?(.*?)```").expect("valid regex"));
static INLINE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]*)`").expect("valid regex"));
static IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static HTML_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][^>\n]*>").expect("valid regex"));
static HORIZONTAL_RULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$")
        .expect("valid regex")
});
static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]*").expect("valid regex"));
static LIST_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*+]|\d+[.)])[ \t]+").expect("valid regex"));
static BOLD_STAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^\n]+?)\*\*").expect("valid regex"));
static BOLD_UNDERSCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__([^\n]+?)__").expect("valid regex"));
static ITALIC_STAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^\n*]+?)\*").expect("valid regex"));
static ITALIC_UNDERSCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b_([^\n_]+?)_\b").expect("valid regex"));
static STRAY_SYMBOL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[~\[\]{}|<>#]").expect("valid regex"));
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)*").expect("valid regex"));

/// Strips markdown and HTML from assistant replies
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownSanitizer;

impl MarkdownSanitizer {
    pub fn new() -> Self {
        Self
    }

    pub fn sanitize(&self, text: &str) -> String {
        strip_markdown(text)
    }
}

/// Remove markdown syntax, keeping the text a reader would see
///
/// List markers become a single leading space so items stay separated once
/// read aloud. The result is trimmed and may be empty.
pub fn strip_markdown(text: &str) -> String {
    let text = text.replace("\r\n", "\n");

    // Code first: its contents must not be read as emphasis or links
    let text = FENCED_CODE_RE.replace_all(&text, "$1");
    let text = INLINE_CODE_RE.replace_all(&text, "$1");

    let text = IMAGE_RE.replace_all(&text, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = HTML_TAG_RE.replace_all(&text, "");
    let text = HORIZONTAL_RULE_RE.replace_all(&text, "");
    let text = HEADING_RE.replace_all(&text, "");

    // Before emphasis, so "* item" is not taken as an opening italic marker
    let text = LIST_MARKER_RE.replace_all(&text, " ");

    let text = BOLD_STAR_RE.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORE_RE.replace_all(&text, "$1");
    let text = ITALIC_STAR_RE.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE_RE.replace_all(&text, "$1");

    let text = STRAY_SYMBOL_RE.replace_all(&text, "");
    let text = BLANK_LINES_RE.replace_all(&text, "\n");

    text.trim().to_string()
}
