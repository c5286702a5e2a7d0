//! Markup-to-plain-text normalization for generated sections.
//!
//! Backends are asked for plain text but routinely answer in markdown. Normalization
//! works one line at a time, which lets the same rules run over a complete response
//! (`normalize`) and over a fragment stream (`StreamNormalizer`) with identical output.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+").expect("valid regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]\n]+)\]\([^)\n]*\)").expect("valid regex"));
static BOLD_STARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("valid regex"));
static BOLD_UNDERSCORES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__([^_\n]+?)__").expect("valid regex"));
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[*+]\s+").expect("valid regex"));
static ITALIC_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\n]+?)\*").expect("valid regex"));
// Underscore emphasis only at word edges, so identifiers like snake_case survive.
static ITALIC_UNDERSCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[\s(])_([^_\n]+?)_($|[\s).,;:!?])").expect("valid regex")
});
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));

/// Normalize a complete text
pub fn normalize(text: &str) -> String {
    let mut normalizer = StreamNormalizer::new();
    let mut out = normalizer.push(text);
    out.push_str(&normalizer.finish());
    out
}

/// Normalize a single line, or `None` when the line carries no text (code fences)
fn normalize_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.starts_with("```") {
        return None;
    }

    let line = HEADING.replace(line, "");
    let line = LINK.replace_all(&line, "$1");
    let line = BOLD_STARS.replace_all(&line, "$1");
    let line = BOLD_UNDERSCORES.replace_all(&line, "$1");
    let line = BULLET.replace(&line, "- ");
    let line = ITALIC_STAR.replace_all(&line, "$1");
    let line = ITALIC_UNDERSCORE.replace_all(&line, "${1}${2}${3}");
    let line = INLINE_CODE.replace_all(&line, "$1");

    let cleaned: String = line.chars().filter(|c| *c != '*' && *c != '`').collect();
    Some(cleaned.trim().to_string())
}

/// Incremental normalizer over a fragment sequence.
///
/// Text is released a whole line at a time. Separators are held back until the next
/// non-blank line arrives, so runs of blank lines collapse to one and nothing trails
/// the final line. Feeding a text in any split yields the same concatenated output as
/// `normalize` on the whole text.
#[derive(Debug, Default)]
pub struct StreamNormalizer {
    buffer: String,
    emitted_any: bool,
    pending_blank: bool,
}

impl StreamNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a fragment; returns whatever normalized text became final
    pub fn push(&mut self, fragment: &str) -> String {
        self.buffer.push_str(fragment);
        let mut out = String::new();
        while let Some(idx) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=idx).collect();
            self.emit(&line, &mut out);
        }
        out
    }

    /// Flush the trailing partial line
    pub fn finish(&mut self) -> String {
        let mut out = String::new();
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.emit(&line, &mut out);
        }
        out
    }

    fn emit(&mut self, raw: &str, out: &mut String) {
        let Some(line) = normalize_line(raw) else {
            return;
        };
        if line.is_empty() {
            if self.emitted_any {
                self.pending_blank = true;
            }
            return;
        }
        if self.emitted_any {
            out.push('\n');
            if self.pending_blank {
                out.push('\n');
            }
        }
        out.push_str(&line);
        self.emitted_any = true;
        self.pending_blank = false;
    }
}
