//! Analytics collaborator trait.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Range used when a request names no dates.
pub const DEFAULT_ANALYTICS_DAYS: i64 = 30;

/// The four report kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsKind {
    Productivity,
    Patterns,
    CompletionRate,
    Workload,
}

impl AnalyticsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsKind::Productivity => "productivity",
            AnalyticsKind::Patterns => "patterns",
            AnalyticsKind::CompletionRate => "completion_rate",
            AnalyticsKind::Workload => "workload",
        }
    }
}

impl fmt::Display for AnalyticsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyticsKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "productivity" => Ok(AnalyticsKind::Productivity),
            "patterns" => Ok(AnalyticsKind::Patterns),
            "completion_rate" => Ok(AnalyticsKind::CompletionRate),
            "workload" => Ok(AnalyticsKind::Workload),
            other => Err(format!("unknown analytics kind '{other}'")),
        }
    }
}

/// An inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// The `days` days ending at `now`.
    pub fn trailing(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(days),
            end: now,
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days().max(1)
    }
}

/// Computes a formatted report over a user's tasks.
#[async_trait]
pub trait AnalyticsEngine: Send + Sync {
    async fn compute(
        &self,
        kind: AnalyticsKind,
        range: DateRange,
        user_id: &str,
    ) -> std::result::Result<String, StoreError>;
}
