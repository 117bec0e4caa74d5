// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Task input and output types
//!
//! A task goes in as a [`TaskInput`] and comes out either as a finished
//! [`TaskResult`] or as a [`StreamingTask`] whose completion text arrives
//! fragment by fragment before the result resolves.

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{Result, TetherError};
use crate::llm::provider::Usage;
use crate::thread::Thread;

/// One task for the agent
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    /// Overrides the agent's role for this task
    pub role: Option<String>,
    /// The task text
    pub content: String,
    /// Conversation to continue; a fresh one is used when absent
    pub thread: Option<Thread>,
    /// JSON Schema the final result must satisfy
    pub output_schema: Option<Value>,
    /// Stream completion text as it arrives
    pub stream: bool,
}

impl TaskInput {
    /// Create a non-streaming task with no schema on a fresh thread
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Set the role for this task
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Continue an existing conversation
    pub fn with_thread(mut self, thread: Thread) -> Self {
        self.thread = Some(thread);
        self
    }

    /// Require the result to satisfy a JSON Schema
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Request streaming output
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// The schema, treating `null` as no schema
    pub fn schema(&self) -> Option<&Value> {
        self.output_schema.as_ref().filter(|s| !s.is_null())
    }
}

/// A tool invocation made during a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name as the model wrote it
    pub name: String,
    /// Parameters as parsed
    pub params: Map<String, Value>,
    /// Turn the call was made in, starting at 1
    pub turn: u32,
    /// Position among all calls of the task, starting at 0
    pub sequence: usize,
    /// When the call was dispatched
    pub timestamp: DateTime<Utc>,
    /// Whether the tool reported success
    pub success: bool,
}

/// Observability data for a finished task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Thinking blocks, in order across all turns
    pub thinking: Vec<String>,
    /// Tool calls, in dispatch order
    pub tool_calls: Vec<ToolCallRecord>,
    /// Usage summed over every model call
    pub usage: Usage,
    /// Model calls made
    pub turns: u32,
}

/// Result of a completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// The completion text, or the parsed JSON when a schema was given
    pub content: Value,
    pub metadata: TaskMetadata,
}

impl TaskResult {
    /// The content as text, when it is a string
    pub fn text(&self) -> Option<&str> {
        self.content.as_str()
    }
}

/// Lifecycle of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Composing,
    AwaitingModel,
    ParsingToolCalls,
    DispatchingTools,
    Completed,
    Failed,
}

impl TaskState {
    /// Whether the task has ended
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Composing => "composing",
            TaskState::AwaitingModel => "awaiting_model",
            TaskState::ParsingToolCalls => "parsing_tool_calls",
            TaskState::DispatchingTools => "dispatching_tools",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What [`Agent::task`](crate::agent::Agent::task) hands back
#[derive(Debug)]
pub enum TaskOutcome {
    Complete(TaskResult),
    Streaming(StreamingTask),
}

impl TaskOutcome {
    /// Wait for the final result, discarding any unread fragments
    pub async fn into_result(self) -> Result<TaskResult> {
        match self {
            TaskOutcome::Complete(result) => Ok(result),
            TaskOutcome::Streaming(task) => task.finish().await,
        }
    }

    /// The finished result, if this was not a streaming task
    pub fn complete(self) -> Option<TaskResult> {
        match self {
            TaskOutcome::Complete(result) => Some(result),
            TaskOutcome::Streaming(_) => None,
        }
    }
}

/// A task running in the background, streaming its completion text
///
/// Fragments are forwarded as soon as they arrive inside a completion
/// block. A block that never closes is not a completion, but its text has
/// already been sent: if that turn also asked for tools, the loop goes on
/// and the fragments of a later completion follow. The text from
/// [`finish`](Self::finish) is authoritative.
///
/// Dropping this does not stop the task; it runs until it completes or fails.
pub struct StreamingTask {
    fragments: UnboundedReceiverStream<String>,
    handle: JoinHandle<Result<TaskResult>>,
}

impl StreamingTask {
    pub(crate) fn new(
        fragments: tokio::sync::mpsc::UnboundedReceiver<String>,
        handle: JoinHandle<Result<TaskResult>>,
    ) -> Self {
        Self {
            fragments: UnboundedReceiverStream::new(fragments),
            handle,
        }
    }

    /// Next piece of completion text, or `None` once the task has ended
    pub async fn next_fragment(&mut self) -> Option<String> {
        self.fragments.next().await
    }

    /// Completion text as a stream
    pub fn fragments(&mut self) -> impl Stream<Item = String> + Unpin + '_ {
        &mut self.fragments
    }

    /// Whether the background task is still running
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Wait for the content and metadata
    pub async fn finish(self) -> Result<TaskResult> {
        self.handle
            .await
            .map_err(|e| TetherError::TaskAborted(e.to_string()))?
    }
}

impl fmt::Debug for StreamingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingTask")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_panicked_task_finishes_as_aborted() {
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = tokio::spawn(async { panic!("tool blew up") });
        let task = StreamingTask::new(rx, handle);

        let err = task.finish().await.unwrap_err();
        assert!(matches!(err, TetherError::TaskAborted(_)));
        assert!(err.is_terminal());
    }

    #[test]
    fn test_task_input_builders() {
        let thread = Thread::new();
        let input = TaskInput::new("do it")
            .with_role("tester")
            .with_thread(thread.clone())
            .with_output_schema(json!({"type": "string"}))
            .streaming();

        assert_eq!(input.content, "do it");
        assert_eq!(input.role.as_deref(), Some("tester"));
        assert_eq!(input.thread.as_ref().map(Thread::id), Some(thread.id()));
        assert!(input.stream);
        assert!(input.schema().is_some());
    }

    #[test]
    fn test_null_schema_is_no_schema() {
        let input = TaskInput::new("x").with_output_schema(Value::Null);
        assert!(input.schema().is_none());
        assert!(TaskInput::new("x").schema().is_none());
    }

    #[test]
    fn test_task_state() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::DispatchingTools.is_terminal());
        assert_eq!(TaskState::AwaitingModel.to_string(), "awaiting_model");
    }

    #[test]
    fn test_task_result_serializes() {
        let result = TaskResult {
            content: json!("done"),
            metadata: TaskMetadata {
                turns: 2,
                ..Default::default()
            },
        };
        assert_eq!(result.text(), Some("done"));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["metadata"]["turns"], 2);
        assert_eq!(value["metadata"]["tool_calls"], json!([]));
    }

    #[tokio::test]
    async fn test_streaming_task_fragments_then_result() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let _ = tx.send("a".to_string());
            let _ = tx.send("b".to_string());
            Ok(TaskResult {
                content: json!("ab"),
                metadata: TaskMetadata::default(),
            })
        });

        let mut task = StreamingTask::new(rx, handle);
        assert_eq!(task.next_fragment().await.as_deref(), Some("a"));
        let rest: Vec<String> = task.fragments().collect().await;
        assert_eq!(rest, vec!["b"]);
        assert!(format!("{:?}", task).contains("StreamingTask"));

        let result = TaskOutcome::Streaming(task).into_result().await.unwrap();
        assert_eq!(result.content, json!("ab"));
    }
}
