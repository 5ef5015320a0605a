// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod async_tool;
mod compact;
mod consciousness;
mod events;
mod prompts;
mod stream;
mod worker;

pub use async_tool::{execute_async, submit_tool_result, AsyncToolError};
pub use compact::{estimate_tokens, self_summary_compact, smart_truncate};
pub use consciousness::Consciousness;
pub use events::{BusEvent, StreamEnvelope, StreamPhase};
pub use prompts::{system_prompt, PromptContext};
pub use stream::{process_stream, ProcessedStream, StreamContext, SEND_MESSAGE_TOOL, SKIP_TOOL};
pub use worker::{CycleOutcome, Worker};
