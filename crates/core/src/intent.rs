use crate::models::Intent;

pub fn normalize_message(input: &str) -> String {
    input.trim_matches(is_strip_char).to_lowercase()
}

// Unicode whitespace plus the C0 separators U+001C..=U+001F.
fn is_strip_char(ch: char) -> bool {
    ch.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&ch)
}

/// Rule order is significant: the first matching rule decides.
pub fn classify_intent(message: &str) -> Intent {
    let msg = normalize_message(message);

    if msg.contains("outside nist") {
        return Intent::OutOfScope;
    }
    if msg.starts_with("explain") {
        return Intent::Teach;
    }
    if msg.contains("assessment") || msg.starts_with("assess") {
        return Intent::Assess;
    }
    if starts_with_any(&msg, &["yes", "no"]) {
        return Intent::Evaluate;
    }

    Intent::General
}

fn starts_with_any(input: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| input.starts_with(prefix))
}
