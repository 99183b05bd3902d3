//! Task records and the task store trait.
//!
//! Tasks are keyed by an integer id and always scoped by `user_id`: a user
//! can never read or modify another user's task, and an id that belongs to
//! someone else behaves exactly like an unknown id.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}' (expected low, medium or high)")),
        }
    }
}

/// A persisted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    /// Wall-clock deadline as the user stated it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDateTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Not completed and past its deadline at `now`.
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }
}

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDateTime>,
}

/// A partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDateTime>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }

    /// Apply onto an existing task, bumping `updated_at`.
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
        task.updated_at = now;
    }
}

/// The task persistence collaborator.
#[async_trait]
pub trait TaskStore: Send + Sync {
    fn name(&self) -> &str;

    async fn create(&self, user_id: &str, task: NewTask) -> std::result::Result<Task, StoreError>;

    /// All tasks of the user, newest first.
    async fn list(&self, user_id: &str) -> std::result::Result<Vec<Task>, StoreError>;

    async fn get(&self, user_id: &str, id: i64) -> std::result::Result<Option<Task>, StoreError>;

    /// Returns the updated task, or `None` if the id is unknown for this user.
    async fn update(&self, user_id: &str, id: i64, patch: TaskPatch) -> std::result::Result<Option<Task>, StoreError>;

    /// Returns false if the id is unknown for this user.
    async fn delete(&self, user_id: &str, id: i64) -> std::result::Result<bool, StoreError>;

    /// Tasks created in `[start, end]`, oldest first.
    async fn list_created_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Vec<Task>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn task() -> Task {
        let now = Utc::now();
        Task {
            id: 1,
            user_id: "u".into(),
            title: "Nộp báo cáo".into(),
            description: None,
            completed: false,
            priority: Priority::Medium,
            due_date: NaiveDate::from_ymd_opt(2025, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" low ".parse::<Priority>().unwrap(), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn overdue_requires_pending_and_past_deadline() {
        let mut t = task();
        let later = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let earlier = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert!(t.is_overdue(later));
        assert!(!t.is_overdue(earlier));
        t.completed = true;
        assert!(!t.is_overdue(later));
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut t = task();
        let patch = TaskPatch {
            completed: Some(true),
            priority: Some(Priority::High),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut t, Utc::now());
        assert!(t.completed);
        assert_eq!(t.priority, Priority::High);
        assert_eq!(t.title, "Nộp báo cáo");
        assert!(TaskPatch::default().is_empty());
    }
}
