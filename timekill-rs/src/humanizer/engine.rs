//! The refine-score loop
//!
//! Each iteration rewrites the current candidate, scores the rewrite, and
//! accepts it only when it both beats the best score so far and stays above
//! the similarity floor. Provider failures mid-loop are absorbed as spent
//! iterations; the loop only fails outright when not a single rewrite
//! attempt ever succeeded.

use crate::error::{Result, TimekillError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::provider::{DetectorProvider, RewriteProvider};
use super::retry::{with_retry, RetryPolicy};
use super::similarity::similarity;

/// Knobs for one humanization run
#[derive(Debug, Clone)]
pub struct HumanizerOptions {
    /// Detector score the loop tries to get under (lower = more human)
    pub target_score: f64,
    /// Hard cap on rewrite attempts; a discarded round still counts
    pub max_iterations: u32,
    /// Rewrites less similar to the input than this are discarded
    pub similarity_floor: f64,
    /// Overall wall-clock budget; on expiry the best candidate so far wins
    pub deadline: Option<Duration>,
}

impl Default for HumanizerOptions {
    fn default() -> Self {
        Self {
            target_score: 20.0,
            max_iterations: 5,
            similarity_floor: 0.6,
            deadline: Some(Duration::from_secs(180)),
        }
    }
}

impl HumanizerOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(TimekillError::InvalidInput(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_floor) {
            return Err(TimekillError::InvalidInput(
                "similarity_floor must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one run: the engine's half of the `HumanizerRun` record
#[derive(Debug, Clone, PartialEq)]
pub struct HumanizerResult {
    /// Best candidate found; equals the input when nothing safe improved it
    pub output_text: String,
    /// Detector score of the output; `None` when no candidate was ever scored
    pub sapling_score: Option<f64>,
    /// Rewrite attempts actually performed (1..=max_iterations)
    pub iterations: u32,
    /// Similarity between input and output; exactly 1.0 for the identity fallback
    pub similarity: f64,
}

/// Iterative rewrite-score-accept engine.
///
/// Pure with respect to storage: persistence of the run record is the
/// caller's job, which keeps the engine testable with scripted providers.
pub struct HumanizerEngine {
    rewriter: Arc<dyn RewriteProvider>,
    detector: Arc<dyn DetectorProvider>,
    retry: RetryPolicy,
}

impl HumanizerEngine {
    pub fn new(
        rewriter: Arc<dyn RewriteProvider>,
        detector: Arc<dyn DetectorProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            rewriter,
            detector,
            retry,
        }
    }

    pub async fn run(&self, input_text: &str, options: &HumanizerOptions) -> Result<HumanizerResult> {
        if input_text.trim().is_empty() {
            return Err(TimekillError::InvalidInput(
                "input text is empty".to_string(),
            ));
        }
        options.validate()?;

        let started = Instant::now();
        let mut candidate = input_text.to_string();
        let mut best_output: Option<String> = None;
        let mut best_score: Option<f64> = None;
        // Rewrite the detector never managed to score; kept so a run with a
        // dead detector still returns its last usable rewrite
        let mut unscored_fallback: Option<String> = None;
        let mut iterations = 0u32;
        let mut rewrites_succeeded = 0u32;

        while iterations < options.max_iterations {
            iterations += 1;

            let rewritten = match with_retry(&self.retry, self.rewriter.name(), || {
                self.rewriter.rewrite(&candidate)
            })
            .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!("Rewrite failed on iteration {}: {}", iterations, e);
                    if self.deadline_passed(started, options) {
                        break;
                    }
                    continue;
                }
            };
            rewrites_succeeded += 1;

            let sim = similarity(input_text, &rewritten);
            if sim < options.similarity_floor {
                // Unfaithful paraphrase: drop this round, keep the candidate
                debug!(
                    "Iteration {}: similarity {:.3} below floor {:.3}, discarding rewrite",
                    iterations, sim, options.similarity_floor
                );
                if self.deadline_passed(started, options) {
                    break;
                }
                continue;
            }

            let score = match with_retry(&self.retry, self.detector.name(), || {
                self.detector.detect_score(&rewritten)
            })
            .await
            {
                Ok(score) => score,
                Err(e) => {
                    warn!("Detector failed on iteration {}: {}", iterations, e);
                    unscored_fallback = Some(rewritten);
                    if self.deadline_passed(started, options) {
                        break;
                    }
                    continue;
                }
            };

            debug!(
                "Iteration {}: score {:.1}, similarity {:.3}",
                iterations, score, sim
            );

            if best_score.map_or(true, |best| score < best) {
                best_score = Some(score);
                best_output = Some(rewritten.clone());
                candidate = rewritten;
            }

            if best_score.is_some_and(|best| best <= options.target_score) {
                debug!("Target score reached after {} iterations", iterations);
                break;
            }

            if self.deadline_passed(started, options) {
                break;
            }
        }

        if rewrites_succeeded == 0 {
            return Err(TimekillError::ProviderUnavailable(format!(
                "every rewrite attempt failed across {} iterations",
                iterations
            )));
        }

        let output_text = best_output
            .or(unscored_fallback)
            .unwrap_or_else(|| input_text.to_string());
        let final_similarity = similarity(input_text, &output_text);

        Ok(HumanizerResult {
            output_text,
            sapling_score: best_score,
            iterations,
            similarity: final_similarity,
        })
    }

    fn deadline_passed(&self, started: Instant, options: &HumanizerOptions) -> bool {
        match options.deadline {
            Some(deadline) if started.elapsed() >= deadline => {
                warn!("Humanizer deadline reached, returning best candidate so far");
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanizer::mock::{MockDetector, MockRewriter};

    fn engine() -> HumanizerEngine {
        HumanizerEngine::new(
            Arc::new(MockRewriter::new()),
            Arc::new(MockDetector::new()),
            RetryPolicy::immediate(),
        )
    }

    #[tokio::test]
    async fn test_empty_input_rejected_fast() {
        let result = engine().run("   ", &HumanizerOptions::default()).await;
        assert!(matches!(result, Err(TimekillError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let options = HumanizerOptions {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(engine().run("some text", &options).await.is_err());

        let options = HumanizerOptions {
            similarity_floor: 1.5,
            ..Default::default()
        };
        assert!(engine().run("some text", &options).await.is_err());
    }

    #[tokio::test]
    async fn test_converges_with_mock_providers() {
        let options = HumanizerOptions {
            target_score: 10.0,
            max_iterations: 5,
            similarity_floor: 0.5,
            deadline: None,
        };
        let input = "Furthermore, individuals utilize the comprehensive approach \
                     to demonstrate that the numerous results are pivotal here.";

        let result = engine().run(input, &options).await.unwrap();

        // Mock rewriter strips every marker in one pass, so one scoring
        // iteration gets under the target
        assert!(result.sapling_score.unwrap() <= options.target_score);
        assert!(result.iterations >= 1 && result.iterations <= options.max_iterations);
        assert!(result.similarity >= options.similarity_floor);
        assert_ne!(result.output_text, input);
    }

    #[tokio::test]
    async fn test_already_human_text_terminates() {
        let options = HumanizerOptions {
            target_score: 10.0,
            max_iterations: 3,
            similarity_floor: 0.5,
            deadline: None,
        };

        // No markers: rewrite is identity, score 0, stops on iteration 1
        let result = engine()
            .run("the cat sat on the mat all day long", &options)
            .await
            .unwrap();

        assert_eq!(result.iterations, 1);
        assert_eq!(result.sapling_score, Some(0.0));
        assert_eq!(result.similarity, 1.0);
    }

    #[tokio::test]
    async fn test_deadline_returns_best_effort() {
        let options = HumanizerOptions {
            target_score: -1.0, // unreachable, only the deadline can stop the loop
            max_iterations: 100,
            similarity_floor: 0.0,
            deadline: Some(Duration::from_millis(0)),
        };

        // Deadline of zero still permits the first iteration
        let result = engine()
            .run("the cat sat on the mat all day long", &options)
            .await
            .unwrap();
        assert_eq!(result.iterations, 1);
    }
}
