// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tether - a tool-using task loop for language models.
//!
//! An [`Agent`](agent::Agent) sends a task to a model, runs the tools the
//! model asks for, feeds the results back and stops when the model answers
//! inside a completion block.
//!
//! Architecture highlights:
//! - `agent`: the task loop, response parsing and task result types
//! - `thread`: conversation log plus keyed context, reusable across tasks
//! - `llm`: provider abstraction, Anthropic and OpenAI-compatible clients, a scripted mock
//! - `tools`: the tool trait, registry and executor
//! - `prompt`: system prompt sections
//! - `config`: settings file and credential lookup

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod thread;
pub mod tools;

pub use agent::{Agent, AgentConfig, ModelDescriptor, TaskInput, TaskOutcome, TaskResult};
pub use error::{Result, TetherError};
pub use thread::Thread;
