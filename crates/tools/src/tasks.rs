//! Task management tools: `create_task`, `list_tasks`, `update_task` and
//! `delete_task`.
//!
//! All four share one [`TaskStore`] and act on behalf of the thread's user
//! taken from [`ToolContext`]. Unknown ids are reported as "not found"
//! results rather than errors.

use async_trait::async_trait;
use fbot_core::error::ToolError;
use fbot_core::task::{NewTask, Priority, Task, TaskPatch, TaskStore};
use fbot_core::tool::{Tool, ToolContext, ToolResult, parse_input};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::date::{DISPLAY_FORMAT, INVALID_DATE, parse_date};

/// All four task tools over one store.
pub fn task_tools(store: Arc<dyn TaskStore>) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(CreateTaskTool::new(store.clone())),
        Box::new(ListTasksTool::new(store.clone())),
        Box::new(UpdateTaskTool::new(store.clone())),
        Box::new(DeleteTaskTool::new(store)),
    ]
}

/// A reported problem the model should relay or correct, not a failure of
/// the collaborator.
fn rejected(message: impl Into<String>) -> ToolResult {
    ToolResult {
        success: false,
        ..ToolResult::ok(message)
    }
}

fn parse_priority(tool: &str, raw: Option<&str>) -> Result<Option<Priority>, ToolError> {
    raw.map(|p| p.parse::<Priority>().map_err(|e| ToolError::invalid(tool, e)))
        .transpose()
}

/// Render one task the way `list_tasks` shows it.
pub fn format_task(task: &Task) -> String {
    let status = if task.completed { "[x]" } else { "[ ]" };
    let due = task
        .due_date
        .map(|d| format!(" (Due: {})", d.format(DISPLAY_FORMAT)))
        .unwrap_or_default();
    let mut line = format!("{status} {}. {} - {} priority{due}", task.id, task.title, task.priority);
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(&format!("\n   Description: {description}"));
    }
    line
}

const PRIORITY_SCHEMA: &str = "Priority level: low, medium or high";

// ── create_task ──

pub struct CreateTaskTool {
    store: Arc<dyn TaskStore>,
}

impl CreateTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct CreateInput {
    title: String,
    description: Option<String>,
    priority: Option<String>,
    due_date: Option<String>,
}

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "Create a new task for the user. Requires a title; never invent one."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Title of the task", "minLength": 1 },
                "description": { "type": "string", "description": "Optional details" },
                "priority": {
                    "type": "string",
                    "enum": ["low", "medium", "high"],
                    "description": PRIORITY_SCHEMA
                },
                "due_date": { "type": "string", "description": "Due date as YYYY-MM-DD or YYYY-MM-DD HH:MM" }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolResult, ToolError> {
        let input: CreateInput = parse_input(self.name(), arguments)?;
        let priority = parse_priority(self.name(), input.priority.as_deref())?.unwrap_or_default();

        let due_date = match input.due_date.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(raw) => match parse_date(raw) {
                Some(parsed) => Some(parsed.at),
                None => return Ok(rejected(INVALID_DATE)),
            },
            None => None,
        };

        let new_task = NewTask {
            title: input.title.trim().to_string(),
            description: input.description.filter(|d| !d.trim().is_empty()),
            priority,
            due_date,
        };

        match self.store.create(&ctx.user_id, new_task).await {
            Ok(task) => {
                info!(task_id = task.id, user_id = %ctx.user_id, "Task created");
                Ok(ToolResult::ok(format!("Task created successfully with ID: {}", task.id))
                    .with_data(json!({ "id": task.id })))
            }
            Err(e) => Ok(ToolResult::failure("task creation", e)),
        }
    }
}

// ── list_tasks ──

pub struct ListTasksTool {
    store: Arc<dyn TaskStore>,
}

impl ListTasksTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn name(&self) -> &str {
        "list_tasks"
    }

    fn description(&self) -> &str {
        "List all of the user's tasks with their IDs, status, priority and due dates."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, ctx: &ToolContext, _arguments: Value) -> Result<ToolResult, ToolError> {
        let tasks = match self.store.list(&ctx.user_id).await {
            Ok(tasks) => tasks,
            Err(e) => return Ok(ToolResult::failure("task listing", e)),
        };
        if tasks.is_empty() {
            return Ok(ToolResult::ok("No tasks found."));
        }

        let mut output = String::from("Current tasks:");
        for task in &tasks {
            output.push('\n');
            output.push_str(&format_task(task));
        }
        Ok(ToolResult::ok(output).with_data(json!({ "count": tasks.len() })))
    }
}

// ── update_task ──

pub struct UpdateTaskTool {
    store: Arc<dyn TaskStore>,
}

impl UpdateTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct UpdateInput {
    id: i64,
    title: Option<String>,
    description: Option<String>,
    completed: Option<bool>,
    priority: Option<String>,
    due_date: Option<String>,
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Update fields of an existing task by ID. Only the supplied fields change; \
         use completed=true to mark a task done."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer", "description": "ID of the task to update" },
                "title": { "type": "string", "minLength": 1 },
                "description": { "type": "string" },
                "completed": { "type": "boolean" },
                "priority": { "type": "string", "enum": ["low", "medium", "high"], "description": PRIORITY_SCHEMA },
                "due_date": { "type": "string", "description": "New due date as YYYY-MM-DD or YYYY-MM-DD HH:MM" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolResult, ToolError> {
        let input: UpdateInput = parse_input(self.name(), arguments)?;

        let due_date = match input.due_date.as_deref() {
            Some(raw) => match parse_date(raw) {
                Some(parsed) => Some(parsed.at),
                None => return Ok(rejected(INVALID_DATE)),
            },
            None => None,
        };

        let patch = TaskPatch {
            title: input.title.map(|t| t.trim().to_string()),
            description: input.description,
            completed: input.completed,
            priority: parse_priority(self.name(), input.priority.as_deref())?,
            due_date,
        };
        if patch.is_empty() {
            return Ok(rejected(format!("No fields to update for task {}.", input.id)));
        }

        match self.store.update(&ctx.user_id, input.id, patch).await {
            Ok(Some(_)) => {
                info!(task_id = input.id, user_id = %ctx.user_id, "Task updated");
                Ok(ToolResult::ok(format!("Task {} updated successfully.", input.id)))
            }
            Ok(None) => Ok(ToolResult::ok(format!("Task with ID {} not found.", input.id))),
            Err(e) => Ok(ToolResult::failure("task update", e)),
        }
    }
}

// ── delete_task ──

pub struct DeleteTaskTool {
    store: Arc<dyn TaskStore>,
}

impl DeleteTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct DeleteInput {
    id: i64,
}

#[async_trait]
impl Tool for DeleteTaskTool {
    fn name(&self) -> &str {
        "delete_task"
    }

    fn description(&self) -> &str {
        "Delete a task by ID."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer", "description": "ID of the task to delete" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolResult, ToolError> {
        let input: DeleteInput = parse_input(self.name(), arguments)?;
        match self.store.delete(&ctx.user_id, input.id).await {
            Ok(true) => {
                info!(task_id = input.id, user_id = %ctx.user_id, "Task deleted");
                Ok(ToolResult::ok(format!("Task {} deleted successfully.", input.id)))
            }
            Ok(false) => Ok(ToolResult::ok(format!("Task with ID {} not found.", input.id))),
            Err(e) => Ok(ToolResult::failure("task deletion", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_core::thread::ThreadId;
    use fbot_core::tool::{ToolCall, ToolRegistry};
    use fbot_store::InMemoryTaskStore;

    fn ctx(user: &str) -> ToolContext {
        ToolContext::new(ThreadId::from("thread-1"), user)
    }

    fn registry(store: Arc<dyn TaskStore>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in task_tools(store) {
            registry.register(tool);
        }
        registry
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn create_then_list() {
        let store = Arc::new(InMemoryTaskStore::new());
        let registry = registry(store.clone());

        let created = registry
            .execute(
                &call(
                    "create_task",
                    json!({"title": "Nộp báo cáo", "priority": "high", "due_date": "2025-06-01 17:00", "description": "Chương 3"}),
                ),
                &ctx("u1"),
            )
            .await
            .unwrap();
        assert_eq!(created.output, "Task created successfully with ID: 1");
        assert_eq!(created.call_id, "call_1");

        let listed = registry.execute(&call("list_tasks", json!({})), &ctx("u1")).await.unwrap();
        assert_eq!(
            listed.output,
            "Current tasks:\n[ ] 1. Nộp báo cáo - high priority (Due: 2025-06-01 17:00)\n   Description: Chương 3"
        );

        let other = registry.execute(&call("list_tasks", json!({})), &ctx("u2")).await.unwrap();
        assert_eq!(other.output, "No tasks found.");
    }

    #[tokio::test]
    async fn create_without_title_never_reaches_store() {
        let store = Arc::new(InMemoryTaskStore::new());
        let registry = registry(store.clone());

        for args in [json!({}), json!({"title": "   "}), json!({"title": null})] {
            let err = registry.execute(&call("create_task", args), &ctx("u1")).await.unwrap_err();
            assert!(matches!(err, ToolError::InvalidInput { .. }), "{err}");
        }
        assert!(store.list("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_date_is_reported_not_raised() {
        let store = Arc::new(InMemoryTaskStore::new());
        let registry = registry(store.clone());

        let result = registry
            .execute(&call("create_task", json!({"title": "x", "due_date": "next friday"})), &ctx("u1"))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.output, INVALID_DATE);
        assert!(store.list("u1").await.unwrap().is_empty());

        let result = registry
            .execute(&call("create_task", json!({"title": "x", "due_date": "2025-06-01"})), &ctx("u1"))
            .await
            .unwrap();
        assert!(result.success);
        let task = store.get("u1", 1).await.unwrap().unwrap();
        assert_eq!(task.due_date.unwrap().format(DISPLAY_FORMAT).to_string(), "2025-06-01 00:00");
    }

    #[tokio::test]
    async fn update_and_delete_report_not_found() {
        let store = Arc::new(InMemoryTaskStore::new());
        let registry = registry(store.clone());
        registry
            .execute(&call("create_task", json!({"title": "Gym"})), &ctx("u1"))
            .await
            .unwrap();

        let done = registry
            .execute(&call("update_task", json!({"id": 1, "completed": true})), &ctx("u1"))
            .await
            .unwrap();
        assert_eq!(done.output, "Task 1 updated successfully.");
        assert!(store.get("u1", 1).await.unwrap().unwrap().completed);

        let missing = registry
            .execute(&call("update_task", json!({"id": 99, "completed": true})), &ctx("u1"))
            .await
            .unwrap();
        assert!(missing.success);
        assert_eq!(missing.output, "Task with ID 99 not found.");

        // Another user's id behaves like an unknown id.
        let foreign = registry.execute(&call("delete_task", json!({"id": 1})), &ctx("u2")).await.unwrap();
        assert_eq!(foreign.output, "Task with ID 1 not found.");

        let deleted = registry.execute(&call("delete_task", json!({"id": 1})), &ctx("u1")).await.unwrap();
        assert_eq!(deleted.output, "Task 1 deleted successfully.");
        let again = registry.execute(&call("delete_task", json!({"id": 1})), &ctx("u1")).await.unwrap();
        assert_eq!(again.output, "Task with ID 1 not found.");
    }

    #[tokio::test]
    async fn update_validates_fields() {
        let store = Arc::new(InMemoryTaskStore::new());
        let registry = registry(store);

        let err = registry
            .execute(&call("update_task", json!({"id": "one"})), &ctx("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));

        let err = registry
            .execute(&call("update_task", json!({"id": 1, "priority": "urgent"})), &ctx("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));

        let empty = registry.execute(&call("update_task", json!({"id": 1})), &ctx("u1")).await.unwrap();
        assert!(!empty.success);
    }
}
