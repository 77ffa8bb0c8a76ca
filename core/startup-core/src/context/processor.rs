//! Delegation capture for the agent-context path.
//!
//! Only Task-tool delegations to `the-*` agents are captured; everything
//! else on this path is dropped silently. The BEGIN half records the
//! delegation prompt as the agent's `user` turn, the END half records the
//! agent's output as its `assistant` turn.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::ids;
use crate::paths;
use crate::timestamp;

use super::store::{ContextEntry, Role};

/// Which half of the delegation is being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationPhase {
    /// The prompt being sent to the agent (`log --assistant`).
    Begin,
    /// The output returned by the agent (`log --user`).
    End,
}

#[derive(Debug, Default, Deserialize)]
struct DelegationPayload {
    #[serde(default)]
    tool_name: String,
    #[serde(default)]
    tool_input: DelegationInput,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DelegationInput {
    #[serde(default)]
    subagent_type: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

/// A captured delegation turn, routed by the identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegationCapture {
    pub session_id: String,
    pub agent_id: String,
    pub entry: ContextEntry,
}

/// Captures one delegation payload from `input` against the resolved base.
pub fn capture_delegation(input: impl Read, phase: DelegationPhase) -> Option<DelegationCapture> {
    capture_delegation_in(&paths::resolve_base(), input, phase)
}

/// Captures one delegation payload, resolving identifiers against `base`.
///
/// Returns `None` for anything that is not a Task delegation to a `the-*`
/// agent, and for unreadable or malformed input.
pub fn capture_delegation_in(
    base: &Path,
    input: impl Read,
    phase: DelegationPhase,
) -> Option<DelegationCapture> {
    let mut raw = String::new();
    let mut input = input;
    if let Err(e) = input.read_to_string(&mut raw) {
        tracing::debug!(error = %e, "failed to read delegation input");
        return None;
    }

    let payload: DelegationPayload = match serde_json::from_str(&raw) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse delegation payload");
            return None;
        }
    };

    let agent_type = payload.tool_input.subagent_type.as_deref()?;
    if !should_capture(&payload.tool_name, agent_type) {
        return None;
    }

    let prompt = payload.tool_input.prompt.as_deref().unwrap_or_default();
    let session_id = ids::extract_session_id(prompt)
        .or_else(|| super::store::find_latest_session_in(base))
        .unwrap_or_default();
    let agent_id = ids::resolve_agent_id(base, prompt, agent_type, &session_id);

    let (role, content) = match phase {
        DelegationPhase::Begin => (Role::User, prompt.to_string()),
        DelegationPhase::End => (Role::Assistant, payload.output.unwrap_or_default()),
    };

    Some(DelegationCapture {
        session_id,
        agent_id,
        entry: ContextEntry {
            role,
            content,
            timestamp: timestamp::parse_or_now(payload.timestamp.as_deref()),
        },
    })
}

/// The context path only captures Task delegations to `the-*` agents.
fn should_capture(tool_name: &str, subagent_type: &str) -> bool {
    tool_name == "Task" && subagent_type.to_lowercase().starts_with("the-")
}
