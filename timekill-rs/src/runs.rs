//! SQLite persistence for run records, study stats, and subscriptions
//!
//! Run rows are create-only: one row per completed (or terminally failed)
//! humanization attempt, written after the loop terminates and never
//! updated. Retention is a data-management concern outside this core.

use crate::error::Result;
use crate::plan::{Plan, Subscription, SubscriptionSource, SubscriptionStatus};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, Row};
use tracing::{debug, info};
use uuid::Uuid;

/// One persisted humanization attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanizerRun {
    pub id: String,
    pub user_id: String,
    pub input_text: String,
    pub output_text: String,
    /// Detector score of the final output; null when the detector never answered
    pub sapling_score: Option<f64>,
    pub iterations: u32,
    pub similarity: Option<f64>,
    pub created_at: String,
}

/// Fields the caller supplies; id and timestamp are assigned at insert
#[derive(Debug, Clone)]
pub struct NewHumanizerRun {
    pub user_id: String,
    pub input_text: String,
    pub output_text: String,
    pub sapling_score: Option<f64>,
    pub iterations: u32,
    pub similarity: Option<f64>,
}

/// One persisted document conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyStat {
    pub id: String,
    pub user_id: String,
    pub cards_generated: u32,
    pub created_at: String,
}

pub struct RunStore {
    pool: SqlitePool,
}

impl RunStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS humanizer_runs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                input_text TEXT NOT NULL,
                output_text TEXT NOT NULL,
                sapling_score REAL,
                iterations INTEGER NOT NULL,
                similarity REAL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS study_stats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                cards_generated INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                user_id TEXT PRIMARY KEY,
                plan TEXT NOT NULL,
                status TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("Run store initialized");
        Ok(Self { pool })
    }

    /// Persist one run record. Create-only.
    pub async fn insert_run(&self, new_run: &NewHumanizerRun) -> Result<HumanizerRun> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO humanizer_runs
            (id, user_id, input_text, output_text, sapling_score, iterations, similarity, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new_run.user_id)
        .bind(&new_run.input_text)
        .bind(&new_run.output_text)
        .bind(new_run.sapling_score)
        .bind(new_run.iterations as i64)
        .bind(new_run.similarity)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        debug!(
            "Stored humanizer run {} for {} ({} iterations)",
            id, new_run.user_id, new_run.iterations
        );

        Ok(HumanizerRun {
            id,
            user_id: new_run.user_id.clone(),
            input_text: new_run.input_text.clone(),
            output_text: new_run.output_text.clone(),
            sapling_score: new_run.sapling_score,
            iterations: new_run.iterations,
            similarity: new_run.similarity,
            created_at,
        })
    }

    /// Most recent runs for a user, newest first
    pub async fn runs_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<HumanizerRun>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, input_text, output_text, sapling_score, iterations, similarity, created_at
            FROM humanizer_runs
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let runs = rows
            .into_iter()
            .map(|row| HumanizerRun {
                id: row.get("id"),
                user_id: row.get("user_id"),
                input_text: row.get("input_text"),
                output_text: row.get("output_text"),
                sapling_score: row.get("sapling_score"),
                iterations: row.get::<i64, _>("iterations") as u32,
                similarity: row.get("similarity"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(runs)
    }

    /// Record one document conversion
    pub async fn insert_study_stat(&self, user_id: &str, cards_generated: u32) -> Result<StudyStat> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO study_stats (id, user_id, cards_generated, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(cards_generated as i64)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(StudyStat {
            id,
            user_id: user_id.to_string(),
            cards_generated,
            created_at,
        })
    }

    pub async fn study_stats_for_user(&self, user_id: &str) -> Result<Vec<StudyStat>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, cards_generated, created_at
            FROM study_stats
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| StudyStat {
                id: row.get("id"),
                user_id: row.get("user_id"),
                cards_generated: row.get::<i64, _>("cards_generated") as u32,
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Upsert a subscription record (written by the billing webhook layer)
    pub async fn set_subscription(
        &self,
        user_id: &str,
        plan: Plan,
        status: SubscriptionStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, plan, status, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                plan = excluded.plan,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(plan.to_string())
        .bind(status.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Subscription for {} set to {} ({})", user_id, plan, status);
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubscriptionSource for RunStore {
    async fn subscription_for(&self, user_id: &str) -> Result<Option<Subscription>> {
        let row = sqlx::query("SELECT plan, status FROM subscriptions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let plan: Plan = row.get::<String, _>("plan").parse()?;
                let status: SubscriptionStatus = row.get::<String, _>("status").parse()?;
                Ok(Some(Subscription { plan, status }))
            }
            None => Ok(None),
        }
    }
}
