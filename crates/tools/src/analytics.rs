//! `run_analytics`: task analytics reports for the thread's user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fbot_core::analytics::{AnalyticsEngine, AnalyticsKind, DEFAULT_ANALYTICS_DAYS, DateRange};
use fbot_core::error::ToolError;
use fbot_core::tool::{Tool, ToolContext, ToolResult, parse_input};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

use crate::date::{INVALID_DATE, parse_date};

pub struct RunAnalyticsTool {
    engine: Arc<dyn AnalyticsEngine>,
}

impl RunAnalyticsTool {
    pub fn new(engine: Arc<dyn AnalyticsEngine>) -> Self {
        Self { engine }
    }
}

#[derive(Deserialize)]
struct AnalyticsInput {
    kind: String,
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Resolve the requested window. Missing bounds fall back to the trailing
/// default window ending at `now`; a date-only end covers that whole day.
fn resolve_range(start: Option<&str>, end: Option<&str>, now: DateTime<Utc>) -> Option<DateRange> {
    let end = match end {
        Some(raw) => parse_date(raw)?.end_of_day().and_utc(),
        None => now,
    };
    let start = match start {
        Some(raw) => parse_date(raw)?.at.and_utc(),
        None => DateRange::trailing(DEFAULT_ANALYTICS_DAYS, end).start,
    };
    Some(DateRange { start, end })
}

#[async_trait]
impl Tool for RunAnalyticsTool {
    fn name(&self) -> &str {
        "run_analytics"
    }

    fn description(&self) -> &str {
        "Analyze the user's tasks. kind is one of productivity, patterns, completion_rate, workload. \
         Dates are optional (YYYY-MM-DD); without them the last 30 days are analyzed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "kind": {
                    "type": "string",
                    "enum": ["productivity", "patterns", "completion_rate", "workload"],
                    "description": "Which report to compute"
                },
                "start_date": { "type": "string", "description": "Start of the window, YYYY-MM-DD" },
                "end_date": { "type": "string", "description": "End of the window, YYYY-MM-DD" }
            },
            "required": ["kind"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolResult, ToolError> {
        let input: AnalyticsInput = parse_input(self.name(), arguments)?;
        let kind: AnalyticsKind = input
            .kind
            .parse()
            .map_err(|e: String| ToolError::invalid(self.name(), e))?;

        let Some(range) = resolve_range(input.start_date.as_deref(), input.end_date.as_deref(), ctx.now) else {
            return Ok(ToolResult {
                success: false,
                ..ToolResult::ok(INVALID_DATE)
            });
        };
        if range.start > range.end {
            return Ok(ToolResult {
                success: false,
                ..ToolResult::ok("The start date must not be after the end date.")
            });
        }

        debug!(%kind, user_id = %ctx.user_id, days = range.days(), "Running analytics");
        match self.engine.compute(kind, range, &ctx.user_id).await {
            Ok(report) => Ok(ToolResult::ok(report).with_data(json!({ "kind": kind, "days": range.days() }))),
            Err(e) => Ok(ToolResult::failure("analytics", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_core::error::StoreError;
    use fbot_core::thread::ThreadId;
    use std::sync::Mutex;

    /// Records what it was asked to compute.
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<(AnalyticsKind, DateRange, String)>>,
    }

    #[async_trait]
    impl AnalyticsEngine for RecordingEngine {
        async fn compute(&self, kind: AnalyticsKind, range: DateRange, user_id: &str) -> Result<String, StoreError> {
            self.calls.lock().unwrap().push((kind, range, user_id.to_string()));
            Ok(format!("{kind} report"))
        }
    }

    #[tokio::test]
    async fn defaults_to_trailing_window_for_thread_user() {
        let engine = Arc::new(RecordingEngine::default());
        let tool = RunAnalyticsTool::new(engine.clone());
        let ctx = ToolContext::new(ThreadId::from("t"), "42");

        let result = tool.execute(&ctx, json!({"kind": "workload"})).await.unwrap();
        assert_eq!(result.output, "workload report");

        let calls = engine.calls.lock().unwrap();
        let (kind, range, user) = &calls[0];
        assert_eq!(*kind, AnalyticsKind::Workload);
        assert_eq!(user, "42");
        assert_eq!(range.end, ctx.now);
        assert_eq!(range.days(), DEFAULT_ANALYTICS_DAYS);
    }

    #[tokio::test]
    async fn explicit_dates_cover_whole_end_day() {
        let engine = Arc::new(RecordingEngine::default());
        let tool = RunAnalyticsTool::new(engine.clone());
        let ctx = ToolContext::new(ThreadId::from("t"), "u");

        tool.execute(&ctx, json!({"kind": "patterns", "start_date": "2025-03-01", "end_date": "2025-03-31"}))
            .await
            .unwrap();
        let calls = engine.calls.lock().unwrap();
        let range = calls[0].1;
        assert_eq!(range.start.format("%Y-%m-%d %H:%M").to_string(), "2025-03-01 00:00");
        assert_eq!(range.end.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-03-31 23:59:59");
    }

    #[tokio::test]
    async fn rejects_bad_kind_and_dates() {
        let tool = RunAnalyticsTool::new(Arc::new(RecordingEngine::default()));
        let ctx = ToolContext::new(ThreadId::from("t"), "u");

        assert!(tool.validate(&json!({"kind": "mood"})).is_err());

        let result = tool
            .execute(&ctx, json!({"kind": "productivity", "start_date": "March"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.output, INVALID_DATE);

        let result = tool
            .execute(&ctx, json!({"kind": "productivity", "start_date": "2025-04-01", "end_date": "2025-03-01"}))
            .await
            .unwrap();
        assert!(!result.success);
    }
}
