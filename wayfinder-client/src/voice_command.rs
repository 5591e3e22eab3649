//! Voice command parsing
//!
//! A recognised transcript like "navigate to the central library" becomes a
//! destination ("to the central library" minus the trigger phrase) and a
//! request to start. Trigger phrases only match on word boundaries, so
//! "route" does not fire inside "Routes Cafe".

/// Parsed voice command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceCommand {
    /// Transcript with every trigger phrase removed
    pub destination: String,
    /// A trigger phrase was heard and a destination remains
    pub start_requested: bool,
}

impl VoiceCommand {
    pub fn parse<S: AsRef<str>>(transcript: &str, trigger_phrases: &[S]) -> Self {
        let mut phrases: Vec<Vec<char>> = trigger_phrases
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| p.chars().collect())
            .collect();
        // Longest first so "start navigation" wins over a shorter overlapping phrase
        phrases.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut text: Vec<char> = transcript.chars().collect();
        let mut triggered = false;
        for phrase in &phrases {
            let (stripped, found) = strip_phrase(&text, phrase);
            text = stripped;
            triggered |= found;
        }

        let collapsed = text
            .iter()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let destination = collapsed
            .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ';' | ':'))
            .to_string();

        Self {
            start_requested: triggered && !destination.is_empty(),
            destination,
        }
    }
}

/// Remove every word-bounded, case-insensitive occurrence of `phrase`
fn strip_phrase(text: &[char], phrase: &[char]) -> (Vec<char>, bool) {
    let mut out = Vec::with_capacity(text.len());
    let mut found = false;
    let mut i = 0;

    while i < text.len() {
        if matches_at(text, i, phrase) {
            found = true;
            out.push(' ');
            i += phrase.len();
        } else {
            out.push(text[i]);
            i += 1;
        }
    }
    (out, found)
}

fn matches_at(text: &[char], start: usize, phrase: &[char]) -> bool {
    let end = start + phrase.len();
    if end > text.len() {
        return false;
    }
    let before_ok = start == 0 || !text[start - 1].is_alphanumeric();
    let after_ok = end == text.len() || !text[end].is_alphanumeric();

    before_ok
        && after_ok
        && text[start..end]
            .iter()
            .zip(phrase)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
}
