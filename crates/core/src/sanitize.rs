/// Markdown punctuation removed from model output, wherever it appears.
///
/// `â€¢` is the bullet glyph after a UTF-8 / Windows-1252 round trip.
pub const MARKDOWN_SEQUENCES: &[&str] = &["**", "*", "\u{2022}", "\u{e2}\u{20ac}\u{a2}", "_", "`", "#"];

const HYPHEN: &str = "-";

/// How hyphens in model output are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HyphenPolicy {
    /// Remove every hyphen, including those inside words and numeric ranges.
    #[default]
    StripAll,
    /// Remove only leading list markers and lines made of hyphens.
    ListMarkersOnly,
}

impl HyphenPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "strip_all" | "all" => Some(Self::StripAll),
            "list_markers" | "list_markers_only" | "markers" => Some(Self::ListMarkersOnly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StripAll => "strip_all",
            Self::ListMarkersOnly => "list_markers",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseSanitizer {
    hyphens: HyphenPolicy,
}

impl ResponseSanitizer {
    pub fn new(hyphens: HyphenPolicy) -> Self {
        Self { hyphens }
    }

    pub fn hyphen_policy(&self) -> HyphenPolicy {
        self.hyphens
    }

    /// Strips markdown punctuation, then trims lines and drops blank ones.
    pub fn sanitize(&self, text: &str) -> String {
        let stripped = self.strip_sequences(text);

        stripped
            .split(is_line_break)
            .map(str::trim)
            .map(|line| match self.hyphens {
                HyphenPolicy::StripAll => line,
                HyphenPolicy::ListMarkersOnly => strip_list_marker(line),
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn removal_set(&self) -> impl Iterator<Item = &'static str> {
        let hyphen = match self.hyphens {
            HyphenPolicy::StripAll => Some(HYPHEN),
            HyphenPolicy::ListMarkersOnly => None,
        };
        MARKDOWN_SEQUENCES.iter().copied().chain(hyphen)
    }

    // The output never contains a member of the removal set: each pushed char is
    // checked against the tail, and a truncated buffer is a prefix already checked.
    fn strip_sequences(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            out.push(ch);
            if let Some(sequence) = self.removal_set().find(|sequence| out.ends_with(sequence)) {
                out.truncate(out.len() - sequence.len());
            }
        }
        out
    }
}

pub fn sanitize(text: &str) -> String {
    ResponseSanitizer::default().sanitize(text)
}

fn is_line_break(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

fn strip_list_marker(line: &str) -> &str {
    let mut rest = line;
    loop {
        let after = rest.trim_start_matches('-');
        if after.len() == rest.len() {
            return rest;
        }
        if after.is_empty() {
            return "";
        }
        if !after.starts_with(char::is_whitespace) {
            return rest;
        }
        rest = after.trim_start();
    }
}
