//! Humanization pipeline
//!
//! An iterative refine-score loop: rewrite the text, score the rewrite with
//! an external AI-content detector, keep the best candidate that stays
//! semantically close to the original, and stop when the score drops under
//! the target or the iteration budget runs out.
//!
//! - [`provider`]: rewrite/detector provider traits and the live HTTP clients
//! - [`mock`]: deterministic providers for tests and offline runs
//! - [`retry`]: bounded retry + timeout around individual provider calls
//! - [`similarity`]: local semantic-similarity scoring
//! - [`engine`]: the loop itself

pub mod engine;
pub mod mock;
pub mod provider;
pub mod retry;
pub mod similarity;

pub use engine::{HumanizerEngine, HumanizerOptions, HumanizerResult};
pub use provider::{DetectorProvider, OllamaRewriter, RewriteProvider, SaplingDetector};
pub use retry::RetryPolicy;
pub use similarity::similarity;
