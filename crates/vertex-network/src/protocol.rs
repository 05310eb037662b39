//! The gateway's wire protocol (spec.md §4.11, §6): five client commands, six server frame
//! types, one JSON object per frame.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    Subscribe { topics: Vec<String> },
    Unsubscribe { topics: Vec<String> },
    Ping,
    ListTopics,
    MySubscriptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Connection { status: &'static str, message: String },
    Subscription { status: &'static str, topics: Vec<String> },
    Pong,
    Topics { topics: Vec<String>, count: usize },
    Subscriptions { topics: Vec<String>, count: usize },
}

/// The untagged topic-data frame (spec.md §4.11: `{topic, data}`, no `type` field — distinct
/// from every tagged [`ServerFrame`] variant so a client can dispatch on the presence of `type`).
#[derive(Debug, Clone, Serialize)]
pub struct TopicDataFrame {
    pub topic: String,
    pub data: serde_json::Value,
}

/// The task-scoped push frame for `WS /backtest/:task_id` (spec.md §6): mirrors
/// `vertex_system::TaskEvent` but always carries the full current status, matching the literal
/// shape `{status, progress, results?, error?}` the HTTP result endpoint also returns.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPushFrame {
    pub status: vertex_system::TaskStatus,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<vertex_system::TaskEvent> for TaskPushFrame {
    fn from(event: vertex_system::TaskEvent) -> Self {
        match event {
            vertex_system::TaskEvent::Status { status, progress, error, result } => {
                Self { status, progress, results: result, error }
            }
            vertex_system::TaskEvent::Progress { progress } => {
                Self { status: vertex_system::TaskStatus::Running, progress, results: None, error: None }
            }
        }
    }
}
