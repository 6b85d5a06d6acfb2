use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display value stored when the user (or the AI) gives no usable time.
/// Kept verbatim from the product; it sorts after "HH:MM" strings, which is
/// the documented display ordering for unscheduled entries.
pub const UNSPECIFIED_TIME: &str = "指定なし";

/// A single persisted schedule entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub time: String,
    pub task: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl Task {
    pub fn new(time: impl Into<String>, task: impl Into<String>) -> Self {
        Task {
            id: Uuid::new_v4().to_string(),
            time: time.into(),
            task: task.into(),
            is_completed: false,
            completed_at: None,
        }
    }
}

/// A transient, unconfirmed entry suggested by the AI proposal flow.
/// Same shape as `Task` minus identity and completion; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTask {
    pub time: String,
    pub task: String,
}

/// Request body for the schedule proposal service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub raw_schedule_text: String,
}

/// Success body from the schedule proposal service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub tasks: Vec<ProposedTask>,
}

/// Error body from the schedule proposal service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PopupMode {
    None,
    AddTask,
    EditTask,
    Generate,
    ConfirmClear,
}

/// Which text field of a two-field popup currently has focus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputField {
    Time,
    Description,
}
