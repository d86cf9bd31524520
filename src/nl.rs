use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

// English stopword list
static STOPWORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
static STRIP_REGEX: OnceLock<Regex> = OnceLock::new();

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "another", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "between", "both", "but", "by", "came",
    "can", "come", "could", "did", "do", "does", "each", "for", "from", "get", "got", "had",
    "has", "have", "he", "her", "here", "him", "himself", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "just", "like", "make", "many", "me", "might", "more", "most",
    "much", "must", "my", "never", "no", "not", "now", "of", "on", "only", "or", "other",
    "our", "out", "over", "said", "same", "see", "she", "should", "since", "so", "some",
    "still", "such", "take", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "up", "us", "very",
    "was", "way", "we", "well", "were", "what", "when", "where", "which", "while", "who",
    "why", "will", "with", "would", "you", "your",
];

fn get_stopwords() -> &'static HashSet<&'static str> {
    STOPWORDS.get_or_init(|| ENGLISH_STOPWORDS.iter().copied().collect())
}

// Everything that is not a-z or whitespace gets deleted (no replacement space)
fn get_strip_regex() -> &'static Regex {
    STRIP_REGEX.get_or_init(|| Regex::new(r"[^a-z\s]").expect("static strip pattern"))
}

pub fn is_stopword(token: &str) -> bool {
    get_stopwords().contains(token)
}

/// Turns raw document text into the token sequence compared by the scorer.
///
/// Lowercases, deletes every character outside `a-z` and whitespace, splits on
/// whitespace runs and drops stopwords. Order and duplicates are preserved.
/// Deleting (rather than spacing out) punctuation can fuse words: `"end.The"`
/// becomes the single token `"endthe"`.
pub fn normalize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = get_strip_regex().replace_all(&lowered, "");

    stripped
        .split_whitespace()
        .filter(|t| !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// Normalized tokens joined by single spaces.
pub fn normalize_text(text: &str) -> String {
    normalize(text).join(" ")
}
