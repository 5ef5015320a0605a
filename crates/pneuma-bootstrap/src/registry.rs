// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Centralised tool-registry builder.
//!
//! All agent workers share one [`ToolRegistry`] instance; this is the single
//! canonical place tools are wired up. Adding a tool to pneuma means adding
//! it here once, then listing its name in whichever `AgentConfig.tools`
//! entries should see it.

use pneuma_tools::{SendMessageTool, SkipTool, ToolRegistry};

/// Build the shared [`ToolRegistry`].
///
/// Every tool an agent can reference from `AgentConfig.tools` is registered
/// here, unconditionally — `AgentConfig.tools`/`visible_tools`/`async_tools`
/// is what actually scopes a given agent's access (`ToolRegistry::
/// schemas_for_names` silently skips names an agent doesn't list).
pub fn build_tool_registry() -> ToolRegistry {
    let mut reg = ToolRegistry::new();

    reg.register(SendMessageTool);
    reg.register(SkipTool);

    reg
}
