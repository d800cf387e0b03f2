//! Quota guard: atomic reserve/release against per-window usage counters
//!
//! Every entry point consults the guard before doing expensive work. The
//! check-then-increment is a single atomic transition: the counter is
//! incremented first and rolled back if the result overshoots the plan
//! limit, so two concurrent reservations that only fit individually can
//! never both be granted.

use crate::error::{Result, TimekillError};
use crate::plan::{Plan, ResourceKind, SubscriptionSource};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::store::CounterStore;

/// Outcome of a reservation attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub granted: bool,
    /// Usage after this call (unchanged when denied)
    pub new_used: u64,
    /// Remaining budget in the current window; `None` when the plan is unlimited
    pub remaining: Option<u64>,
    /// Counter key this reservation was charged against; releases must go
    /// back to this key, not whatever window is current at release time
    pub window_key: String,
}

/// Enforces per-user, per-resource usage ceilings
pub struct QuotaGuard {
    store: Arc<dyn CounterStore>,
    subscriptions: Arc<dyn SubscriptionSource>,
}

impl QuotaGuard {
    pub fn new(store: Arc<dyn CounterStore>, subscriptions: Arc<dyn SubscriptionSource>) -> Self {
        Self {
            store,
            subscriptions,
        }
    }

    /// Atomically check remaining quota and reserve `amount`, or deny.
    ///
    /// Denial is a normal outcome, not an error; errors mean the store or the
    /// plan lookup failed and the caller must fail closed.
    pub async fn reserve(
        &self,
        user_id: &str,
        kind: ResourceKind,
        amount: u64,
    ) -> Result<Reservation> {
        if user_id.trim().is_empty() {
            return Err(TimekillError::InvalidInput("empty user id".to_string()));
        }
        if amount == 0 {
            return Err(TimekillError::InvalidInput(
                "reservation amount must be positive".to_string(),
            ));
        }

        let plan = self.effective_plan(user_id).await?;
        let limit = kind.monthly_limit(plan);
        let now = Utc::now();
        let key = key_for(user_id, kind, now);

        let new_used = self.store.incr_by(&key, amount).await?;

        if let Some(limit) = limit {
            if new_used > limit {
                // Overshot: roll the increment back and deny. A concurrent
                // reservation may have taken the last slots between our
                // increment and this check; the rollback never over-grants.
                let used = self.store.decr_by(&key, amount).await?;
                let remaining = limit.saturating_sub(used);
                debug!(
                    "Quota denied for {} ({}): used {}, limit {}, requested {}",
                    user_id, kind, used, limit, amount
                );
                return Ok(Reservation {
                    granted: false,
                    new_used: used,
                    remaining: Some(remaining),
                    window_key: key,
                });
            }
        }

        // Window rollover is handled by the key itself; expiry just keeps
        // the store from accumulating dead counters.
        if let Err(e) = self.store.expire_at(&key, window_end(now)).await {
            warn!("Could not set expiry on counter {}: {}", key, e);
        }

        debug!(
            "Reserved {} {} for {} (used {} of {})",
            amount,
            kind,
            user_id,
            new_used,
            limit.map_or_else(|| "unlimited".to_string(), |l| l.to_string()),
        );

        Ok(Reservation {
            granted: true,
            new_used,
            remaining: limit.map(|l| l.saturating_sub(new_used)),
            window_key: key,
        })
    }

    /// Compensating decrement for reserved-but-unconsumed amounts, keyed to
    /// the window the reservation was charged against. A release that lands
    /// just after month rollover still credits the old window's counter.
    ///
    /// Safe with `amount = 0` and never drives the counter below zero.
    pub async fn release(&self, window_key: &str, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let new_used = self.store.decr_by(window_key, amount).await?;
        debug!("Released {} on {} (now {})", amount, window_key, new_used);
        Ok(())
    }

    /// Usage in the current window
    pub async fn used(&self, user_id: &str, kind: ResourceKind) -> Result<u64> {
        self.store.get(&key_for(user_id, kind, Utc::now())).await
    }

    /// Current-window usage together with the caller's plan limit
    pub async fn usage(&self, user_id: &str, kind: ResourceKind) -> Result<(u64, Option<u64>)> {
        let plan = self.effective_plan(user_id).await?;
        let used = self.used(user_id, kind).await?;
        Ok((used, kind.monthly_limit(plan)))
    }

    /// Billing-window identifier scoping the counter for `user_id` + `kind`
    pub fn window_key(&self, user_id: &str, kind: ResourceKind) -> String {
        key_for(user_id, kind, Utc::now())
    }

    async fn effective_plan(&self, user_id: &str) -> Result<Plan> {
        let plan = self
            .subscriptions
            .subscription_for(user_id)
            .await?
            .map(|s| s.effective_plan())
            .unwrap_or(Plan::Free);
        Ok(plan)
    }
}

/// Counter key for the calendar-month billing window containing `now`.
/// A new month yields a fresh key, so counters reset lazily with no
/// migration step.
fn key_for(user_id: &str, kind: ResourceKind, now: DateTime<Utc>) -> String {
    format!(
        "usage:{}:{}:{}",
        user_id,
        kind.key_fragment(),
        now.format("%Y-%m")
    )
}

/// First instant of the next calendar month
fn window_end(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{MemorySubscriptions, SubscriptionStatus};
    use crate::quota::store::MemoryCounterStore;
    use chrono::TimeZone;

    fn guard_with(subs: MemorySubscriptions) -> QuotaGuard {
        QuotaGuard::new(Arc::new(MemoryCounterStore::new()), Arc::new(subs))
    }

    #[test]
    fn test_window_key_format() {
        let now = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap();
        assert_eq!(
            key_for("user-1", ResourceKind::HumanizerCredit, now),
            "usage:user-1:humanizer:2026-08"
        );
        assert_eq!(
            key_for("user-1", ResourceKind::DocumentConversion, now),
            "usage:user-1:conversions:2026-08"
        );
    }

    #[test]
    fn test_window_end_rollover() {
        let mid_month = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap();
        assert_eq!(
            window_end(mid_month),
            Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap()
        );

        let december = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            window_end(december),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_reserve_within_limit() {
        let guard = guard_with(MemorySubscriptions::new());

        // No subscription => FREE limits (10 humanizer credits)
        let r = guard
            .reserve("u1", ResourceKind::HumanizerCredit, 4)
            .await
            .unwrap();
        assert!(r.granted);
        assert_eq!(r.new_used, 4);
        assert_eq!(r.remaining, Some(6));
    }

    #[tokio::test]
    async fn test_reserve_denied_without_mutation() {
        let guard = guard_with(MemorySubscriptions::new());

        guard
            .reserve("u1", ResourceKind::HumanizerCredit, 8)
            .await
            .unwrap();

        let r = guard
            .reserve("u1", ResourceKind::HumanizerCredit, 5)
            .await
            .unwrap();
        assert!(!r.granted);
        assert_eq!(r.remaining, Some(2));

        // Denied reservation left the counter untouched
        assert_eq!(guard.used("u1", ResourceKind::HumanizerCredit).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_power_humanizer_never_denied() {
        let subs = MemorySubscriptions::new();
        subs.set("u1", Plan::Power, SubscriptionStatus::Active).await;
        let guard = guard_with(subs);

        let r = guard
            .reserve("u1", ResourceKind::HumanizerCredit, 100_000)
            .await
            .unwrap();
        assert!(r.granted);
        assert_eq!(r.remaining, None);

        // Counter still tracks usage for display
        assert_eq!(
            guard.used("u1", ResourceKind::HumanizerCredit).await.unwrap(),
            100_000
        );
    }

    #[tokio::test]
    async fn test_inactive_subscription_uses_free_limits() {
        let subs = MemorySubscriptions::new();
        subs.set("u1", Plan::Pro, SubscriptionStatus::Canceled).await;
        let guard = guard_with(subs);

        let r = guard
            .reserve("u1", ResourceKind::HumanizerCredit, 11)
            .await
            .unwrap();
        assert!(!r.granted);
        assert_eq!(r.remaining, Some(10));
    }

    #[tokio::test]
    async fn test_release_floor_and_noop() {
        let guard = guard_with(MemorySubscriptions::new());

        let r = guard
            .reserve("u1", ResourceKind::DocumentConversion, 2)
            .await
            .unwrap();

        guard.release(&r.window_key, 0).await.unwrap();
        assert_eq!(
            guard.used("u1", ResourceKind::DocumentConversion).await.unwrap(),
            2
        );

        // Repeated over-release floors at zero
        for _ in 0..3 {
            guard.release(&r.window_key, 5).await.unwrap();
        }
        assert_eq!(
            guard.used("u1", ResourceKind::DocumentConversion).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_release_credits_the_reserved_window() {
        let guard = guard_with(MemorySubscriptions::new());

        let r = guard
            .reserve("u1", ResourceKind::HumanizerCredit, 4)
            .await
            .unwrap();
        assert_eq!(r.window_key, guard.window_key("u1", ResourceKind::HumanizerCredit));

        // A release keyed to a previous window never touches the current
        // counter; only the reservation's own key does
        guard
            .release("usage:u1:humanizer:2020-01", 2)
            .await
            .unwrap();
        assert_eq!(guard.used("u1", ResourceKind::HumanizerCredit).await.unwrap(), 4);

        guard.release(&r.window_key, 2).await.unwrap();
        assert_eq!(guard.used("u1", ResourceKind::HumanizerCredit).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_reserve_inputs() {
        let guard = guard_with(MemorySubscriptions::new());

        assert!(guard
            .reserve("", ResourceKind::HumanizerCredit, 1)
            .await
            .is_err());
        assert!(guard
            .reserve("u1", ResourceKind::HumanizerCredit, 0)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_concurrent_reservations_respect_limit() {
        let guard = Arc::new(guard_with(MemorySubscriptions::new()));

        // FREE humanizer limit is 10; 30 concurrent single-credit requests
        let mut handles = Vec::new();
        for _ in 0..30 {
            let guard = Arc::clone(&guard);
            handles.push(tokio::spawn(async move {
                guard
                    .reserve("u1", ResourceKind::HumanizerCredit, 1)
                    .await
                    .unwrap()
                    .granted
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 10);
        assert_eq!(guard.used("u1", ResourceKind::HumanizerCredit).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_concurrent_multi_credit_never_oversubscribes() {
        let guard = Arc::new(guard_with(MemorySubscriptions::new()));

        // Amounts of 3 against a limit of 10: at most 3 grants can fit
        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = Arc::clone(&guard);
            handles.push(tokio::spawn(async move {
                guard
                    .reserve("u1", ResourceKind::HumanizerCredit, 3)
                    .await
                    .unwrap()
                    .granted
            }));
        }

        let mut total_granted = 0u64;
        for handle in handles {
            if handle.await.unwrap() {
                total_granted += 3;
            }
        }

        assert!(total_granted <= 10);
        assert_eq!(
            guard.used("u1", ResourceKind::HumanizerCredit).await.unwrap(),
            total_granted
        );
    }
}
