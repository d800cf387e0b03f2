//! Semantic similarity between the original text and a rewrite
//!
//! Cosine similarity over lowercase word-frequency vectors. Local and
//! deterministic: the loop calls this on every iteration and must never
//! pay a network round-trip for it. Good enough to catch drift into
//! unfaithful paraphrase, which is all the floor check needs.

use std::collections::HashMap;

/// Similarity in [0, 1]; 1.0 for identical texts, 0.0 for no shared words.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let freq_a = term_frequencies(a);
    let freq_b = term_frequencies(b);

    if freq_a.is_empty() || freq_b.is_empty() {
        return if freq_a.is_empty() && freq_b.is_empty() {
            1.0
        } else {
            0.0
        };
    }

    let dot: f64 = freq_a
        .iter()
        .filter_map(|(word, count_a)| freq_b.get(word).map(|count_b| count_a * count_b))
        .sum();

    let norm_a: f64 = freq_a.values().map(|c| c * c).sum::<f64>().sqrt();
    let norm_b: f64 = freq_b.values().map(|c| c * c).sum::<f64>().sqrt();

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut freq = HashMap::new();
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *freq.entry(word.to_string()).or_insert(0.0) += 1.0;
    }
    freq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts() {
        assert_eq!(similarity("hello world", "hello world"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_disjoint_texts() {
        assert_eq!(similarity("alpha beta gamma", "one two three"), 0.0);
    }

    #[test]
    fn test_empty_versus_nonempty() {
        assert_eq!(similarity("", "hello"), 0.0);
        assert_eq!(similarity("hello", ""), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let a = "the cat sat on the mat";
        let b = "a cat sat on a mat today";
        assert!((similarity(a, b) - similarity(b, a)).abs() < 1e-12);
    }

    #[test]
    fn test_small_edit_stays_high() {
        let a = "the quick brown fox jumps over the lazy dog near the quiet river bank";
        let b = "the fast brown fox jumps over the lazy dog near the quiet river bank";
        let sim = similarity(a, b);
        assert!(sim > 0.85, "one-word change should stay similar, got {}", sim);
        assert!(sim < 1.0);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        assert_eq!(similarity("Hello, World!", "hello world"), 1.0);
    }

    #[test]
    fn test_range() {
        let pairs = [
            ("some text here", "completely different words"),
            ("repeated repeated repeated", "repeated once"),
            ("a b c d e", "c d e f g"),
        ];
        for (a, b) in pairs {
            let sim = similarity(a, b);
            assert!((0.0..=1.0).contains(&sim), "{} out of range", sim);
        }
    }
}
