//! Mock providers for testing and offline runs
//!
//! The mock detector scores text by the density of words that AI-content
//! classifiers flag as machine-flavored; the mock rewriter replaces those
//! same words with plain synonyms. Running them together makes the refine
//! loop converge deterministically, which is exactly what tests and local
//! demos need.

use super::provider::{DetectorProvider, RewriteProvider};
use crate::error::Result;
use tracing::debug;

/// Words the mock pair treats as machine-flavored, with plain replacements
const MARKERS: &[(&str, &str)] = &[
    ("furthermore", "also"),
    ("moreover", "also"),
    ("additionally", "also"),
    ("utilize", "use"),
    ("utilizes", "uses"),
    ("utilizing", "using"),
    ("leverage", "use"),
    ("delve", "dig"),
    ("pivotal", "key"),
    ("crucial", "key"),
    ("comprehensive", "full"),
    ("commence", "start"),
    ("numerous", "many"),
    ("individuals", "people"),
    ("demonstrates", "shows"),
    ("demonstrate", "show"),
    ("subsequently", "then"),
    ("consequently", "so"),
];

fn lookup_marker(word: &str) -> Option<&'static str> {
    MARKERS
        .iter()
        .find(|(marker, _)| *marker == word)
        .map(|(_, replacement)| *replacement)
}

/// Mock rewrite provider: deterministic synonym substitution
pub struct MockRewriter {
    provider_name: String,
}

impl MockRewriter {
    pub fn new() -> Self {
        Self {
            provider_name: "mock-rewriter-v1".to_string(),
        }
    }
}

impl Default for MockRewriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RewriteProvider for MockRewriter {
    async fn rewrite(&self, text: &str) -> Result<String> {
        debug!("MockRewriter: rewriting {} chars", text.len());

        let rewritten = text
            .split_whitespace()
            .map(|token| {
                let core: String = token
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect::<String>()
                    .to_lowercase();

                match lookup_marker(&core) {
                    Some(replacement) => {
                        // Keep surrounding punctuation, swap the word itself
                        let trailing: String =
                            token.chars().rev().take_while(|c| !c.is_alphanumeric()).collect();
                        let trailing: String = trailing.chars().rev().collect();
                        format!("{}{}", replacement, trailing)
                    }
                    None => token.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        Ok(rewritten)
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

/// Mock detector: marker-word density scaled to a 0..100 score
pub struct MockDetector {
    provider_name: String,
}

impl MockDetector {
    pub fn new() -> Self {
        Self {
            provider_name: "mock-detector-v1".to_string(),
        }
    }
}

impl Default for MockDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DetectorProvider for MockDetector {
    async fn detect_score(&self, text: &str) -> Result<f64> {
        let words: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_string())
            .collect();

        if words.is_empty() {
            return Ok(0.0);
        }

        let markers = words
            .iter()
            .filter(|w| lookup_marker(w).is_some())
            .count();

        let score = (markers as f64 / words.len() as f64 * 500.0).min(100.0);
        debug!(
            "MockDetector: {} markers in {} words, score {:.1}",
            markers,
            words.len(),
            score
        );
        Ok(score)
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_rewriter_replaces_markers() {
        let rewriter = MockRewriter::new();
        let out = rewriter
            .rewrite("Furthermore, we utilize numerous tools.")
            .await
            .unwrap();
        assert_eq!(out, "also, we use many tools.");
    }

    #[tokio::test]
    async fn test_mock_rewriter_plain_text_unchanged() {
        let rewriter = MockRewriter::new();
        let text = "the cat sat on the mat";
        assert_eq!(rewriter.rewrite(text).await.unwrap(), text);
    }

    #[tokio::test]
    async fn test_mock_detector_scores_drop_after_rewrite() {
        let rewriter = MockRewriter::new();
        let detector = MockDetector::new();
        let text = "Furthermore, individuals utilize comprehensive tools to demonstrate results.";

        let before = detector.detect_score(text).await.unwrap();
        let after = detector
            .detect_score(&rewriter.rewrite(text).await.unwrap())
            .await
            .unwrap();

        assert!(before > 0.0);
        assert_eq!(after, 0.0);
    }

    #[tokio::test]
    async fn test_mock_detector_empty_text() {
        let detector = MockDetector::new();
        assert_eq!(detector.detect_score("").await.unwrap(), 0.0);
    }
}
