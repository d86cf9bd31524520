//! Bag-of-words cosine similarity between two documents.

use crate::config::SCORE_DECIMALS;
use crate::nl::normalize;
use indexmap::IndexSet;

/// Distinct terms of `a` followed by the unseen terms of `b`, in first-seen order.
pub fn build_vocabulary<'a>(a: &'a [String], b: &'a [String]) -> IndexSet<&'a str> {
    let mut vocabulary = IndexSet::with_capacity(a.len() + b.len());
    for token in a.iter().chain(b.iter()) {
        vocabulary.insert(token.as_str());
    }
    vocabulary
}

/// Raw term counts of `tokens`, one slot per vocabulary entry.
pub fn vectorize(tokens: &[String], vocabulary: &IndexSet<&str>) -> Vec<u64> {
    let mut vector = vec![0u64; vocabulary.len()];
    for token in tokens {
        if let Some(idx) = vocabulary.get_index_of(token.as_str()) {
            vector[idx] += 1;
        }
    }
    vector
}

fn round_score(value: f64) -> f64 {
    let factor = 10f64.powi(SCORE_DECIMALS);
    (value * factor).round() / factor
}

/// Cosine similarity of two already-normalized token sequences, as a percentage.
///
/// Counts stay integral until the final division so the result does not
/// depend on argument order.
pub fn tokens_similarity(tokens_a: &[String], tokens_b: &[String]) -> f64 {
    let vocabulary = build_vocabulary(tokens_a, tokens_b);
    let v1 = vectorize(tokens_a, &vocabulary);
    let v2 = vectorize(tokens_b, &vocabulary);

    let dot: u64 = v1.iter().zip(v2.iter()).map(|(a, b)| a * b).sum();
    let sq1: u64 = v1.iter().map(|a| a * a).sum();
    let sq2: u64 = v2.iter().map(|b| b * b).sum();

    // Either side produced no tokens
    if sq1 == 0 || sq2 == 0 {
        return 0.0;
    }

    let mag1 = (sq1 as f64).sqrt();
    let mag2 = (sq2 as f64).sqrt();
    let cosine = dot as f64 / (mag1 * mag2);

    round_score((cosine * 100.0).clamp(0.0, 100.0))
}

/// Similarity of two raw texts in `[0, 100]`, rounded to two decimals.
///
/// Total over all inputs: empty or fully stripped text scores 0.
pub fn cosine_similarity(text_a: &str, text_b: &str) -> f64 {
    let tokens_a = normalize(text_a);
    let tokens_b = normalize(text_b);
    tokens_similarity(&tokens_a, &tokens_b)
}
