//! Task analytics over any [`TaskStore`].
//!
//! Each report kind is a pure function of the tasks created in the window,
//! so the same numbers come out whichever store backs the engine. Reports
//! are plain text meant to be narrated by the analytics handler.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use fbot_core::analytics::{AnalyticsEngine, AnalyticsKind, DateRange};
use fbot_core::error::StoreError;
use fbot_core::task::{Priority, Task, TaskStore};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

const WEEKDAYS: [&str; 7] = ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];

/// Computes analytics reports from a task store.
pub struct TaskAnalytics {
    tasks: Arc<dyn TaskStore>,
}

impl TaskAnalytics {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl AnalyticsEngine for TaskAnalytics {
    async fn compute(&self, kind: AnalyticsKind, range: DateRange, user_id: &str) -> Result<String, StoreError> {
        let tasks = self.tasks.list_created_between(user_id, range.start, range.end).await?;
        debug!(%kind, user_id, tasks = tasks.len(), "Computing analytics");
        Ok(render(kind, &tasks, range, Utc::now()))
    }
}

/// Render one report at instant `now`.
pub fn render(kind: AnalyticsKind, tasks: &[Task], range: DateRange, now: DateTime<Utc>) -> String {
    let mut out = summary(tasks, range, now);
    out.push('\n');
    match kind {
        AnalyticsKind::Productivity => productivity(&mut out, tasks, now),
        AnalyticsKind::Patterns => patterns(&mut out, tasks),
        AnalyticsKind::CompletionRate => completion_rate(&mut out, tasks, range),
        AnalyticsKind::Workload => workload(&mut out, tasks),
    }
    out
}

/// Percentage with a zero denominator mapped to 0.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn summary(tasks: &[Task], range: DateRange, now: DateTime<Utc>) -> String {
    let completed = tasks.iter().filter(|t| t.completed).count();
    let pending = tasks.len() - completed;
    let high_pending = tasks
        .iter()
        .filter(|t| !t.completed && t.priority == Priority::High)
        .count();
    let overdue = tasks.iter().filter(|t| t.is_overdue(now.naive_utc())).count();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "SUMMARY ({} to {}, {} days)",
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d"),
        range.days()
    );
    let _ = writeln!(out, "- Total tasks: {}", tasks.len());
    let _ = writeln!(out, "- Completed: {completed}");
    let _ = writeln!(out, "- Pending: {pending}");
    let _ = writeln!(out, "- Completion rate: {:.1}%", percentage(completed, tasks.len()));
    let _ = writeln!(out, "- High-priority pending: {high_pending}");
    let _ = writeln!(out, "- Overdue: {overdue}");
    out
}

/// (completed, total) per priority, highest priority first.
fn by_priority(tasks: &[Task]) -> Vec<(Priority, usize, usize)> {
    Priority::ALL
        .into_iter()
        .filter_map(|p| {
            let of_priority: Vec<_> = tasks.iter().filter(|t| t.priority == p).collect();
            (!of_priority.is_empty()).then(|| (p, of_priority.iter().filter(|t| t.completed).count(), of_priority.len()))
        })
        .collect()
}

fn productivity(out: &mut String, tasks: &[Task], now: DateTime<Utc>) {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.completed).count();
    let overdue = tasks.iter().filter(|t| t.is_overdue(now.naive_utc())).count();
    let rate = percentage(completed, total);

    // Completion time approximated by the last update of a completed task.
    let hours: Vec<f64> = tasks
        .iter()
        .filter(|t| t.completed)
        .map(|t| (t.updated_at - t.created_at).num_minutes() as f64 / 60.0)
        .collect();
    let avg_hours = average(&hours);

    let _ = writeln!(out, "PRODUCTIVITY");
    let _ = writeln!(out, "By priority:");
    for (priority, done, of) in by_priority(tasks) {
        let _ = writeln!(out, "- {}: {done}/{of} ({:.1}%)", priority.as_str().to_uppercase(), percentage(done, of));
    }
    let _ = writeln!(out, "Average completion time: {avg_hours:.1} hours");

    let _ = writeln!(out, "Insights:");
    if rate >= 80.0 {
        let _ = writeln!(out, "- Excellent completion rate; current habits are working.");
    } else if rate >= 60.0 {
        let _ = writeln!(out, "- Good completion rate with room to improve.");
    } else {
        let _ = writeln!(out, "- Completion rate is low; split tasks into smaller steps and prioritize.");
    }
    if total > 0 && overdue as f64 > total as f64 * 0.2 {
        let _ = writeln!(out, "- More than 20% of tasks are overdue; set more realistic deadlines.");
    }
    if avg_hours > 48.0 {
        let _ = writeln!(out, "- Tasks take over 48 hours on average; break them down further.");
    }
}

fn patterns(out: &mut String, tasks: &[Task]) {
    let mut weekday = [0usize; 7];
    let mut hour = [0usize; 24];
    for t in tasks {
        weekday[t.created_at.weekday().num_days_from_sunday() as usize] += 1;
        hour[t.created_at.hour() as usize] += 1;
    }

    let _ = writeln!(out, "PATTERNS");
    let _ = writeln!(out, "Tasks created per weekday:");
    for (i, name) in WEEKDAYS.iter().enumerate() {
        let _ = writeln!(out, "- {name}: {}", weekday[i]);
    }

    let _ = writeln!(out, "Tasks created per hour:");
    let max = hour.iter().copied().max().unwrap_or(0);
    let mut peaks = Vec::new();
    for (h, count) in hour.iter().enumerate().filter(|(_, c)| **c > 0) {
        let _ = writeln!(out, "- {h:02}:00-{:02}:00: {count}", (h + 1) % 24);
        if *count as f64 >= max as f64 * 0.7 {
            peaks.push(format!("{h:02}:00"));
        }
    }
    let _ = writeln!(
        out,
        "Peak hours: {}",
        if peaks.is_empty() { "no clear pattern".to_string() } else { peaks.join(", ") }
    );

    if let Some((i, _)) = weekday.iter().enumerate().filter(|(_, c)| **c > 0).max_by_key(|(i, c)| (**c, std::cmp::Reverse(*i))) {
        let _ = writeln!(out, "Busiest weekday: {}", WEEKDAYS[i]);
    }

    let keywords = top_keywords(tasks, 5);
    if !keywords.is_empty() {
        let _ = writeln!(out, "Frequent title keywords: {}", keywords.join(", "));
    }
}

/// Most frequent title words longer than three characters.
fn top_keywords(tasks: &[Task], n: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for t in tasks {
        for word in t.title.split(|c: char| !c.is_alphanumeric()) {
            if word.chars().count() > 3 {
                *counts.entry(word.to_lowercase()).or_default() += 1;
            }
        }
    }
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(w, c)| format!("{w} ({c})")).collect()
}

fn completion_rate(out: &mut String, tasks: &[Task], range: DateRange) {
    let mut weeks = Vec::new();
    let mut week_start = range.start;
    while week_start < range.end {
        let week_end = (week_start + Duration::days(7)).min(range.end);
        let in_week: Vec<_> = tasks
            .iter()
            .filter(|t| t.created_at >= week_start && t.created_at < week_end)
            .collect();
        let done = in_week.iter().filter(|t| t.completed).count();
        weeks.push((week_start, done, in_week.len()));
        week_start = week_end;
    }

    let _ = writeln!(out, "COMPLETION RATE");
    let _ = writeln!(out, "Weekly:");
    for (start, done, of) in &weeks {
        let _ = writeln!(out, "- Week of {}: {done}/{of} ({:.1}%)", start.format("%m/%d"), percentage(*done, *of));
    }
    let _ = writeln!(out, "By priority:");
    for (priority, done, of) in by_priority(tasks) {
        let _ = writeln!(out, "- {}: {done}/{of} ({:.1}%)", priority.as_str().to_uppercase(), percentage(done, of));
    }

    if let [.., (_, prev_done, prev_of), (_, last_done, last_of)] = weeks.as_slice() {
        let trend = percentage(*last_done, *last_of) - percentage(*prev_done, *prev_of);
        let verdict = if trend > 5.0 {
            "improving"
        } else if trend < -5.0 {
            "declining"
        } else {
            "stable"
        };
        let _ = writeln!(out, "Recent trend: {verdict} ({trend:+.1} points week over week)");
    }
}

fn workload(out: &mut String, tasks: &[Task]) {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for t in tasks {
        *per_day.entry(t.created_at.date_naive()).or_default() += 1;
    }
    let counts: Vec<f64> = per_day.values().map(|c| *c as f64).collect();
    let avg = average(&counts);
    let max = counts.iter().copied().fold(0.0, f64::max);

    let _ = writeln!(out, "WORKLOAD");
    if !per_day.is_empty() {
        let _ = writeln!(out, "Daily creation: average {avg:.1}, max {max:.0}");
        let _ = writeln!(out, "Last 7 active days:");
        for (day, count) in per_day.iter().rev().take(7).collect::<Vec<_>>().into_iter().rev() {
            let _ = writeln!(out, "- {day}: {count}");
        }
    }

    let _ = writeln!(out, "Pending by priority:");
    let mut pending_total = 0;
    for priority in Priority::ALL {
        let count = tasks.iter().filter(|t| !t.completed && t.priority == priority).count();
        if count > 0 {
            let _ = writeln!(out, "- {}: {count}", priority.as_str().to_uppercase());
        }
        pending_total += count;
    }
    let _ = writeln!(out, "- TOTAL: {pending_total}");

    let with_deadline = tasks.iter().filter(|t| t.due_date.is_some()).count();
    let deadline_pct = percentage(with_deadline, tasks.len());
    let _ = writeln!(out, "Tasks with a deadline: {with_deadline}/{} ({deadline_pct:.1}%)", tasks.len());

    let _ = writeln!(out, "Assessment:");
    if pending_total > 20 {
        let _ = writeln!(out, "- Overloaded: drop or defer low-value tasks.");
    } else if pending_total > 10 {
        let _ = writeln!(out, "- Heavy: focus on high-priority tasks first.");
    } else {
        let _ = writeln!(out, "- Manageable workload.");
    }
    if !counts.is_empty() && max > avg * 2.0 {
        let _ = writeln!(out, "- Some days spike above twice the average; spread task creation out.");
    }
    if deadline_pct < 30.0 {
        let _ = writeln!(out, "- Fewer than 30% of tasks have deadlines; add more to plan time better.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryTaskStore;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn task(title: &str, created: DateTime<Utc>, completed: bool, priority: Priority) -> Task {
        Task {
            id: 0,
            user_id: "u".into(),
            title: title.into(),
            description: None,
            completed,
            priority,
            due_date: None,
            created_at: created,
            updated_at: if completed { created + Duration::hours(10) } else { created },
        }
    }

    fn range() -> DateRange {
        DateRange {
            start: at(2025, 3, 1, 0),
            end: at(2025, 3, 31, 0),
        }
    }

    #[test]
    fn percentage_handles_zero_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn empty_window_reports_zeros() {
        let report = render(AnalyticsKind::Productivity, &[], range(), at(2025, 3, 31, 0));
        assert!(report.contains("Total tasks: 0"));
        assert!(report.contains("Completion rate: 0.0%"));
        assert!(report.contains("Completion rate is low"));
    }

    #[test]
    fn productivity_insights_follow_thresholds() {
        let now = at(2025, 3, 31, 0);
        let mut tasks: Vec<_> = (0..4)
            .map(|i| task("Ôn thi giải tích", at(2025, 3, 2 + i, 9), true, Priority::High))
            .collect();
        let mut late = task("Nộp bài tập", at(2025, 3, 3, 9), false, Priority::Low);
        late.due_date = Some(at(2025, 3, 10, 0).naive_utc());
        tasks.push(late);

        let report = render(AnalyticsKind::Productivity, &tasks, range(), now);
        assert!(report.contains("Completed: 4"));
        assert!(report.contains("Completion rate: 80.0%"));
        assert!(report.contains("Excellent"));
        assert!(report.contains("HIGH: 4/4 (100.0%)"));
        assert!(report.contains("LOW: 0/1 (0.0%)"));
        assert!(report.contains("Overdue: 1"));
        assert!(!report.contains("More than 20%"));
        assert!(report.contains("Average completion time: 10.0 hours"));
    }

    #[test]
    fn patterns_find_peak_hours_and_keywords() {
        let tasks = vec![
            task("Review project plan", at(2025, 3, 3, 9), false, Priority::Medium),
            task("Project meeting notes", at(2025, 3, 3, 9), false, Priority::Medium),
            task("Gym", at(2025, 3, 4, 20), false, Priority::Low),
        ];
        let report = render(AnalyticsKind::Patterns, &tasks, range(), at(2025, 3, 31, 0));
        assert!(report.contains("Monday: 2"));
        assert!(report.contains("09:00-10:00: 2"));
        assert!(report.contains("Peak hours: 09:00"));
        assert!(!report.contains("Peak hours: 09:00, 20:00"));
        assert!(report.contains("Busiest weekday: Monday"));
        assert!(report.contains("project (2)"));
        assert!(!report.contains("gym"));
    }

    #[test]
    fn completion_rate_buckets_by_week_and_reports_trend() {
        let tasks = vec![
            task("a", at(2025, 3, 2, 8), false, Priority::Medium),
            task("b", at(2025, 3, 30, 8), true, Priority::Medium),
        ];
        let report = render(AnalyticsKind::CompletionRate, &tasks, range(), at(2025, 3, 31, 0));
        assert!(report.contains("Week of 03/01: 0/1 (0.0%)"));
        assert!(report.contains("Week of 03/29: 1/1 (100.0%)"));
        assert!(report.contains("improving"));
    }

    #[test]
    fn workload_flags_overload_and_missing_deadlines() {
        let tasks: Vec<_> = (0..21)
            .map(|i| task(&format!("t{i}"), at(2025, 3, 5, (i % 20) as u32), false, Priority::High))
            .collect();
        let report = render(AnalyticsKind::Workload, &tasks, range(), at(2025, 3, 31, 0));
        assert!(report.contains("HIGH: 21"));
        assert!(report.contains("TOTAL: 21"));
        assert!(report.contains("Overloaded"));
        assert!(report.contains("Fewer than 30%"));
    }

    #[tokio::test]
    async fn engine_reads_only_the_window_and_user() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.insert(task("inside", Utc::now() - Duration::days(2), true, Priority::High)).await;
        store.insert(task("old", Utc::now() - Duration::days(90), true, Priority::High)).await;
        let mut foreign = task("theirs", Utc::now() - Duration::days(1), false, Priority::Low);
        foreign.user_id = "someone-else".into();
        store.insert(foreign).await;

        let engine = TaskAnalytics::new(store);
        let report = engine
            .compute(AnalyticsKind::Productivity, DateRange::trailing(30, Utc::now()), "u")
            .await
            .unwrap();
        assert!(report.contains("Total tasks: 1"));
        assert!(report.contains("Completed: 1"));
    }
}
