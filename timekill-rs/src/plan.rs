//! Subscription plans and resource limits
//!
//! Plan tiers are a closed enum mapped through a single limits table, so a
//! new tier or limit change touches exactly one place. An absent or inactive
//! subscription always resolves to FREE limits.

use crate::error::{Result, TimekillError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Subscription plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    Free,
    Pro,
    Power,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Plan::Free => "FREE",
            Plan::Pro => "PRO",
            Plan::Power => "POWER",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Plan {
    type Err = TimekillError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "FREE" => Ok(Plan::Free),
            "PRO" => Ok(Plan::Pro),
            "POWER" => Ok(Plan::Power),
            other => Err(TimekillError::InvalidPlanState(format!(
                "unknown plan '{}'",
                other
            ))),
        }
    }
}

/// Metered resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    DocumentConversion,
    HumanizerCredit,
}

impl ResourceKind {
    /// Stable token used in counter keys
    pub fn key_fragment(&self) -> &'static str {
        match self {
            ResourceKind::DocumentConversion => "conversions",
            ResourceKind::HumanizerCredit => "humanizer",
        }
    }

    /// Plan ceiling for this resource per billing window.
    ///
    /// `None` means unlimited (POWER humanizer credits, per product rule).
    pub fn monthly_limit(&self, plan: Plan) -> Option<u64> {
        match (self, plan) {
            (ResourceKind::DocumentConversion, Plan::Free) => Some(5),
            (ResourceKind::DocumentConversion, Plan::Pro) => Some(50),
            (ResourceKind::DocumentConversion, Plan::Power) => Some(500),
            (ResourceKind::HumanizerCredit, Plan::Free) => Some(10),
            (ResourceKind::HumanizerCredit, Plan::Pro) => Some(100),
            (ResourceKind::HumanizerCredit, Plan::Power) => None,
        }
    }

    /// Human-readable description for logs and error messages
    pub fn description(&self) -> &'static str {
        match self {
            ResourceKind::DocumentConversion => "document conversions",
            ResourceKind::HumanizerCredit => "humanizer credits",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
}

impl SubscriptionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SubscriptionStatus {
    type Err = TimekillError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SubscriptionStatus::Active),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            other => Err(TimekillError::InvalidPlanState(format!(
                "unknown subscription status '{}'",
                other
            ))),
        }
    }
}

/// A user's subscription as consulted by the quota guard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: Plan,
    pub status: SubscriptionStatus,
}

impl Subscription {
    /// The plan whose limits apply. An inactive subscription falls back to FREE.
    pub fn effective_plan(&self) -> Plan {
        if self.status.is_active() {
            self.plan
        } else {
            Plan::Free
        }
    }
}

/// Source of subscription records (owned by billing, consulted here)
#[async_trait::async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn subscription_for(&self, user_id: &str) -> Result<Option<Subscription>>;
}

/// In-memory subscription map, used in tests and as the default when no
/// database is wired in.
pub struct MemorySubscriptions {
    entries: Arc<RwLock<HashMap<String, Subscription>>>,
}

impl MemorySubscriptions {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn set(&self, user_id: &str, plan: Plan, status: SubscriptionStatus) {
        let mut entries = self.entries.write().await;
        entries.insert(user_id.to_string(), Subscription { plan, status });
    }
}

impl Default for MemorySubscriptions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SubscriptionSource for MemorySubscriptions {
    async fn subscription_for(&self, user_id: &str) -> Result<Option<Subscription>> {
        let entries = self.entries.read().await;
        Ok(entries.get(user_id).copied())
    }
}
