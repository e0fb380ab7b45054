use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in progress",
            Status::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "in_progress" | "in-progress" => Ok(Status::InProgress),
            "completed" => Ok(Status::Completed),
            other => Err(anyhow!("unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(anyhow!("unknown priority: {other}")),
        }
    }
}

/// A task record as the backend serves it. `id` and the timestamps are
/// server-assigned and absent before creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub status: Status,

    pub priority: Priority,

    #[serde(default)]
    pub due_date: Option<String>,

    #[serde(default)]
    pub owner: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// Status filter narrowing which tasks are requested from the backend. Not
/// persisted across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    InProgress,
    Completed,
}

impl StatusFilter {
    /// Value for the `status` query parameter; `None` means the parameter is
    /// omitted and the backend returns every task.
    pub fn query_value(self) -> Option<&'static str> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Pending => Some("pending"),
            StatusFilter::InProgress => Some("in_progress"),
            StatusFilter::Completed => Some("completed"),
        }
    }

    pub fn status(self) -> Option<Status> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Pending => Some(Status::Pending),
            StatusFilter::InProgress => Some(Status::InProgress),
            StatusFilter::Completed => Some(Status::Completed),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Pending => "pending",
            StatusFilter::InProgress => "in progress",
            StatusFilter::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            other => Ok(match Status::parse(other)? {
                Status::Pending => StatusFilter::Pending,
                Status::InProgress => StatusFilter::InProgress,
                Status::Completed => StatusFilter::Completed,
            }),
        }
    }
}

/// The fields a write carries. `owner` is required here: the view-model
/// refuses to build a payload without one.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub due_date: Option<String>,
    pub owner: i64,
}

/// A write destined for the backend: a draft becomes a `POST`, a persisted
/// task becomes a `PUT` against its id.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload {
    Draft(TaskFields),
    Persisted { id: i64, fields: TaskFields },
}

impl TaskPayload {
    pub fn fields(&self) -> &TaskFields {
        match self {
            TaskPayload::Draft(fields) => fields,
            TaskPayload::Persisted { fields, .. } => fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Priority, Status, StatusFilter, Task};

    #[test]
    fn status_and_priority_wire_names() {
        let task: Task = serde_json::from_str(
            r#"{
                "id": 3,
                "title": "Ship release",
                "description": "",
                "status": "in_progress",
                "priority": "high",
                "due_date": "2026-09-01",
                "owner": 7,
                "created_at": "2026-08-20T10:00:00Z",
                "updated_at": "2026-08-21T09:30:00Z"
            }"#,
        )
        .expect("task should deserialize");

        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.owner, Some(7));

        let wire = serde_json::to_string(&task).expect("task should serialize");
        assert!(wire.contains("\"in_progress\""));
        assert!(wire.contains("\"high\""));
    }

    #[test]
    fn task_without_optional_fields_deserializes() {
        let task: Task = serde_json::from_str(
            r#"{"title": "Bare", "status": "pending", "priority": "medium"}"#,
        )
        .expect("bare task should deserialize");

        assert_eq!(task.id, None);
        assert_eq!(task.description, "");
        assert_eq!(task.due_date, None);
        assert_eq!(task.owner, None);
    }

    #[test]
    fn filter_query_values() {
        assert_eq!(StatusFilter::All.query_value(), None);
        assert_eq!(StatusFilter::Pending.query_value(), Some("pending"));
        assert_eq!(StatusFilter::InProgress.query_value(), Some("in_progress"));
        assert_eq!(StatusFilter::Completed.query_value(), Some("completed"));
    }

    #[test]
    fn filter_parsing() {
        assert_eq!(
            StatusFilter::parse("all").expect("parse all"),
            StatusFilter::All
        );
        assert_eq!(
            StatusFilter::parse("in_progress").expect("parse in_progress"),
            StatusFilter::InProgress
        );
        assert!(StatusFilter::parse("bogus").is_err());
    }
}
