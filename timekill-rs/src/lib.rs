//! timekill-rs: study-notes conversion and AI-text humanization core
//!
//! The two metered features of TimeKill behind one service facade:
//!
//! - **Humanizer**: an iterative rewrite-score loop that pushes text under an
//!   AI-detector score target while staying semantically close to the input
//! - **Quota guard**: Redis-style atomic counters enforcing per-plan usage
//!   ceilings (FREE/PRO/POWER) per billing window, so concurrent requests
//!   can never over-spend
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use timekill_rs::humanizer::mock::{MockDetector, MockRewriter};
//! use timekill_rs::humanizer::{HumanizerEngine, HumanizerOptions, RetryPolicy};
//! use timekill_rs::plan::MemorySubscriptions;
//! use timekill_rs::quota::{MemoryCounterStore, QuotaGuard};
//! use timekill_rs::runs::RunStore;
//! use timekill_rs::service::TimekillService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let quota = QuotaGuard::new(
//!         Arc::new(MemoryCounterStore::new()),
//!         Arc::new(MemorySubscriptions::new()),
//!     );
//!     let engine = HumanizerEngine::new(
//!         Arc::new(MockRewriter::new()),
//!         Arc::new(MockDetector::new()),
//!         RetryPolicy::default(),
//!     );
//!     let runs = Arc::new(RunStore::new("sqlite://timekill.db").await?);
//!
//!     let service = TimekillService::new(quota, engine, runs);
//!     let outcome = service
//!         .humanize(
//!             "user-1",
//!             "Furthermore, individuals utilize numerous tools.",
//!             HumanizerOptions::default(),
//!         )
//!         .await?;
//!
//!     println!("{} ({} credits)", outcome.output_text, outcome.credits_charged);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`plan`]: Plans, resource kinds, and limits
//! - [`quota`]: Counter store and quota guard
//! - [`humanizer`]: Providers, similarity, and the refine loop
//! - [`flashcards`]: Notes-to-cards conversion
//! - [`runs`]: Persistence of runs, stats, and subscriptions
//! - [`service`]: Orchestration facade

pub mod config;
pub mod error;
pub mod flashcards;
pub mod humanizer;
pub mod plan;
pub mod quota;
pub mod runs;
pub mod service;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, TimekillError};
pub use service::TimekillService;
