//! Request-scoped orchestration
//!
//! One call chain per request: validate, reserve quota, do the work, release
//! whatever was reserved but not consumed, persist, respond. Quota and input
//! validation run before any billable work; a denied reservation means no
//! engine call and no run record.
//!
//! Known gap, accepted: a crash between a granted reservation and the run
//! insert leaves usage spent without a run record. No distributed
//! transaction spans the counter store and the run store.

use crate::error::{Result, TimekillError};
use crate::flashcards::{self, CardPair};
use crate::humanizer::{HumanizerEngine, HumanizerOptions};
use crate::plan::ResourceKind;
use crate::quota::QuotaGuard;
use crate::runs::{NewHumanizerRun, RunStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Caller-facing result of a humanization request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanizeOutcome {
    pub run_id: String,
    pub output_text: String,
    pub sapling_score: Option<f64>,
    pub iterations: u32,
    pub similarity: f64,
    /// Users pay per iteration actually consumed, 1:1
    pub credits_charged: u32,
}

/// Caller-facing result of a document conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub cards: Vec<CardPair>,
    pub credits_charged: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEntry {
    pub used: u64,
    /// `None` when the plan is unlimited for this resource
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub document_conversions: UsageEntry,
    pub humanizer_credits: UsageEntry,
}

pub struct TimekillService {
    quota: QuotaGuard,
    engine: HumanizerEngine,
    runs: Arc<RunStore>,
}

impl TimekillService {
    pub fn new(quota: QuotaGuard, engine: HumanizerEngine, runs: Arc<RunStore>) -> Self {
        Self {
            quota,
            engine,
            runs,
        }
    }

    /// Humanize `input_text` for `user_id`.
    ///
    /// Reserves `max_iterations` credits up front, then releases the
    /// difference between reserved and consumed once the engine returns, so
    /// a run that stops early is only charged for the iterations it made.
    pub async fn humanize(
        &self,
        user_id: &str,
        input_text: &str,
        options: HumanizerOptions,
    ) -> Result<HumanizeOutcome> {
        // Fail fast before anything billable happens
        if input_text.trim().is_empty() {
            return Err(TimekillError::InvalidInput(
                "input text is empty".to_string(),
            ));
        }
        options.validate()?;

        let reserved = options.max_iterations as u64;
        let reservation = self
            .quota
            .reserve(user_id, ResourceKind::HumanizerCredit, reserved)
            .await?;

        if !reservation.granted {
            info!(
                "Humanize denied for {}: {} credits remaining",
                user_id,
                reservation.remaining.unwrap_or(0)
            );
            return Err(TimekillError::QuotaExceeded {
                kind: ResourceKind::HumanizerCredit,
                remaining: reservation.remaining.unwrap_or(0),
            });
        }

        let result = match self.engine.run(input_text, &options).await {
            Ok(result) => result,
            Err(e) => {
                // Nothing was delivered; give the whole reservation back
                if let Err(release_err) = self
                    .quota
                    .release(&reservation.window_key, reserved)
                    .await
                {
                    warn!(
                        "Could not release {} credits for {} after engine failure: {}",
                        reserved, user_id, release_err
                    );
                }
                return Err(e);
            }
        };

        let unused = reserved - result.iterations as u64;
        if let Err(e) = self
            .quota
            .release(&reservation.window_key, unused)
            .await
        {
            // The user ends up over-charged for this window; prefer that to
            // dropping a finished run
            warn!(
                "Could not release {} unused credits for {}: {}",
                unused, user_id, e
            );
        }

        let run = self
            .runs
            .insert_run(&NewHumanizerRun {
                user_id: user_id.to_string(),
                input_text: input_text.to_string(),
                output_text: result.output_text.clone(),
                sapling_score: result.sapling_score,
                iterations: result.iterations,
                similarity: Some(result.similarity),
            })
            .await?;

        info!(
            "Humanized for {}: {} iterations, score {:?}, similarity {:.3}",
            user_id, result.iterations, result.sapling_score, result.similarity
        );

        Ok(HumanizeOutcome {
            run_id: run.id,
            output_text: result.output_text,
            sapling_score: result.sapling_score,
            iterations: result.iterations,
            similarity: result.similarity,
            credits_charged: result.iterations,
        })
    }

    /// Convert free-form study notes into flashcard pairs.
    ///
    /// One conversion costs one documentConversion credit regardless of how
    /// many cards come out.
    pub async fn convert_document(&self, user_id: &str, notes: &str) -> Result<ConversionOutcome> {
        if notes.trim().is_empty() {
            return Err(TimekillError::InvalidInput("notes are empty".to_string()));
        }

        let reservation = self
            .quota
            .reserve(user_id, ResourceKind::DocumentConversion, 1)
            .await?;

        if !reservation.granted {
            return Err(TimekillError::QuotaExceeded {
                kind: ResourceKind::DocumentConversion,
                remaining: reservation.remaining.unwrap_or(0),
            });
        }

        let cards = flashcards::convert_notes(notes);
        if cards.is_empty() {
            if let Err(e) = self
                .quota
                .release(&reservation.window_key, 1)
                .await
            {
                warn!("Could not release conversion credit for {}: {}", user_id, e);
            }
            return Err(TimekillError::InvalidInput(
                "no card pairs could be extracted from the notes".to_string(),
            ));
        }

        self.runs
            .insert_study_stat(user_id, cards.len() as u32)
            .await?;

        info!("Converted notes for {}: {} cards", user_id, cards.len());

        Ok(ConversionOutcome {
            credits_charged: 1,
            cards,
        })
    }

    /// Current-window usage for both resource kinds
    pub async fn usage(&self, user_id: &str) -> Result<UsageReport> {
        let (conv_used, conv_limit) = self
            .quota
            .usage(user_id, ResourceKind::DocumentConversion)
            .await?;
        let (credit_used, credit_limit) = self
            .quota
            .usage(user_id, ResourceKind::HumanizerCredit)
            .await?;

        Ok(UsageReport {
            document_conversions: UsageEntry {
                used: conv_used,
                limit: conv_limit,
            },
            humanizer_credits: UsageEntry {
                used: credit_used,
                limit: credit_limit,
            },
        })
    }

    /// Recent run history for a user
    pub async fn run_history(&self, user_id: &str, limit: u32) -> Result<Vec<crate::runs::HumanizerRun>> {
        self.runs.runs_for_user(user_id, limit).await
    }
}
