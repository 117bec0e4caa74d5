// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation threads
//!
//! A [`Thread`] is the ordered message log the model sees plus a keyed store
//! of context facts rendered into the system prompt. Cloning a thread yields
//! another handle to the same conversation, which is how a caller reuses it
//! across tasks.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::llm::message::Message;

/// A context value plus optional metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Default)]
struct ThreadState {
    messages: Vec<Message>,
    // Kept in first-insertion order so the prompt preamble is stable.
    contexts: Vec<(String, ContextEntry)>,
}

/// Shared handle to a conversation
#[derive(Debug, Clone)]
pub struct Thread {
    id: Uuid,
    state: Arc<Mutex<ThreadState>>,
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

impl Thread {
    /// Create an empty thread
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(Mutex::new(ThreadState::default())),
        }
    }

    /// Thread identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, ThreadState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(thread = %self.id, "Thread lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Insert or overwrite the context entry for `key`
    pub fn add_context(&self, key: impl Into<String>, value: Value, metadata: Option<Value>) {
        let key = key.into();
        let entry = ContextEntry { value, metadata };
        let mut state = self.lock();
        match state.contexts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = entry,
            None => state.contexts.push((key, entry)),
        }
    }

    /// Look up one context entry
    pub fn context(&self, key: &str) -> Option<ContextEntry> {
        self.lock()
            .contexts
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entry)| entry.clone())
    }

    /// Snapshot of every context entry, in first-insertion order
    pub fn all_contexts(&self) -> Vec<(String, ContextEntry)> {
        self.lock().contexts.clone()
    }

    /// Whether any context has been added
    pub fn has_context(&self) -> bool {
        !self.lock().contexts.is_empty()
    }

    /// Snapshot of the message log
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    /// Number of messages in the log
    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    pub(crate) fn append_message(&self, message: Message) {
        self.lock().messages.push(message);
    }

    /// Render the context store as a `<context>` preamble block.
    /// Returns `None` when there is no context.
    pub fn render_context(&self) -> Option<String> {
        let contexts = self.all_contexts();
        if contexts.is_empty() {
            return None;
        }

        let mut out = String::from("<context>\n");
        for (key, entry) in contexts {
            let value = match &entry.value {
                Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            };
            out.push_str(&format!("<item key=\"{}\">\n{}\n", key, value));
            if let Some(metadata) = &entry.metadata {
                out.push_str(&format!("<metadata>{}</metadata>\n", metadata));
            }
            out.push_str("</item>\n");
        }
        out.push_str("</context>");
        Some(out)
    }
}
