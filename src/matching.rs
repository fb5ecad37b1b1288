//! Guess matching
//!
//! Decides whether a model's free-text guess names the target phrase, and
//! trims verbose model output down to the guessed object beforehand.

use regex::Regex;
use std::sync::LazyLock;

/// Characters removed during normalization
const STRIPPED_CHARS: &[char] = &[
    '.', ',', '/', '#', '!', '$', '%', '^', '&', '*', ';', ':', '{', '}', '=', '-', '_', '`',
    '~', '(', ')',
];

/// Tokens of this length or shorter never take part in token matching
const MIN_TOKEN_LEN: usize = 3;

/// Answers longer than this are searched for an embedded guess
const VERBOSE_GUESS_LEN: usize = 20;

/// Answers still longer than this after extraction are cut at the first sentence
const MAX_GUESS_LEN: usize = 50;

/// Lowercase, drop punctuation, then trim
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect();
    stripped.trim().to_string()
}

fn tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
        .collect()
}

/// Returns true when `guess` names `target`.
///
/// Rules, any of which is sufficient:
/// exact match, substring in either direction, a shared token, a token
/// contained in another token (both at least three characters), or both
/// mentioning "snorkel". Empty input on either side never matches.
pub fn matches(guess: &str, target: &str) -> bool {
    let guess = normalize(guess);
    let target = normalize(target);

    if guess.is_empty() || target.is_empty() {
        return false;
    }

    if guess == target {
        return true;
    }

    if guess.contains(&target) || target.contains(&guess) {
        return true;
    }

    let guess_tokens = tokens(&guess);
    let target_tokens = tokens(&target);

    if target_tokens.iter().any(|t| guess_tokens.contains(t)) {
        return true;
    }

    // "flower" vs "sunflower"; also lets "car" hit "card"
    for target_token in &target_tokens {
        for guess_token in &guess_tokens {
            let (shorter, longer) = if guess_token.len() <= target_token.len() {
                (guess_token, target_token)
            } else {
                (target_token, guess_token)
            };
            if shorter.chars().count() >= MIN_TOKEN_LEN && longer.contains(shorter) {
                return true;
            }
        }
    }

    // common misspelling: "snorkling"
    target.contains("snorkel") && guess.contains("snorkel")
}

/// Extraction rules for verbose answers, in priority order
static GUESS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)I see a ([\w\s\-]+)",
        r"(?i)This appears to be a ([\w\s\-]+)",
        r"(?i)This looks like a ([\w\s\-]+)",
        r"(?i)It's a ([\w\s\-]+)",
        r"(?i)This is a ([\w\s\-]+)",
        r"(?i)I think this is a ([\w\s\-]+)",
        r"(?i)The image shows a ([\w\s\-]+)",
        r"(?i)A ([\w\s\-]+)",
        r"(?i)An ([\w\s\-]+)",
        r"(?i)person ([\w\s\-]+)",
        r"(?i)someone ([\w\s\-]+)",
    ]
    .iter()
    .filter_map(|pattern| match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!("Invalid guess pattern {}: {}", pattern, e);
            None
        }
    })
    .collect()
});

/// Reduce a raw model response to the guessed object
pub fn clean_guess(raw: &str) -> String {
    let mut guess = raw.trim().to_string();

    if guess.chars().count() > VERBOSE_GUESS_LEN {
        if let Some(extracted) = GUESS_PATTERNS.iter().find_map(|pattern| {
            pattern
                .captures(&guess)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
        }) {
            guess = extracted;
        }

        if guess.chars().count() > MAX_GUESS_LEN {
            guess = guess
                .split(['.', '!', '?'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
        }
    }

    let trimmed = guess
        .strip_suffix(['.', ',', '!', '?', ';', ':'])
        .unwrap_or(&guess);
    trimmed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Sun-Flower!  "), "sunflower");
        assert_eq!(normalize("(Ice cream), please."), "ice cream please");
    }

    #[test]
    fn test_identical_strings_match() {
        for s in ["cat", "Ice Cream", "a big red barn", "snorkeling"] {
            assert!(matches(s, s), "{s} should match itself");
        }
    }

    #[test]
    fn test_empty_never_matches() {
        assert!(!matches("", "cat"));
        assert!(!matches("cat", ""));
        assert!(!matches("...", "cat"));
        assert!(!matches("   ", "cat"));
        assert!(!matches("- -", "ice cream"));
        assert!(!matches("ice cream", ". ,"));
        assert_eq!(normalize("- -"), "");
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        assert!(matches("CAT!", "cat"));
        assert!(matches("ice-cream", "icecream"));
    }

    #[test]
    fn test_substring_match() {
        assert!(matches("a smiling flower", "flower"));
        assert!(matches("house", "haunted house"));
    }

    #[test]
    fn test_token_match() {
        assert!(matches("birthday cake", "chocolate cake"));
        assert!(!matches("red car", "blue bus"));
    }

    #[test]
    fn test_stemmed_match() {
        assert!(matches("a flower", "sunflower"));
        assert!(matches("sunflower", "flower garden"));
        assert!(matches("card", "car"));
    }

    #[test]
    fn test_short_tokens_ignored() {
        // "ox" and "on" are too short to count as shared tokens
        assert!(!matches("ox on a hill", "ox on the moon trip"));
        assert!(!matches("an ox", "on it"));
    }

    #[test]
    fn test_snorkel_variants() {
        assert!(matches("person snorkeling underwater", "snorkeling"));
        assert!(matches("snorkel gear", "go snorkeling"));
    }

    #[test]
    fn test_unrelated_guess() {
        assert!(!matches("car", "sunflower"));
        assert!(!matches("dog", "cat"));
    }

    #[test]
    fn test_clean_short_guess_untouched() {
        assert_eq!(clean_guess("Cat."), "Cat");
        assert_eq!(clean_guess("  house  "), "house");
    }

    #[test]
    fn test_clean_extracts_pattern() {
        assert_eq!(clean_guess("I see a red bicycle in the picture."), "red bicycle in the picture");
        assert_eq!(clean_guess("This looks like a sunflower, maybe"), "sunflower");
    }

    #[test]
    fn test_clean_first_pattern_wins() {
        // "I see a" outranks the generic "A" rule
        assert_eq!(clean_guess("I see a boat. A lake too"), "boat");
    }

    #[test]
    fn test_clean_long_answer_takes_first_sentence() {
        let raw = "Probably the Eiffel Tower at night with fireworks! Or maybe not";
        assert_eq!(clean_guess(raw), "Probably the Eiffel Tower at night with fireworks");
    }
}
