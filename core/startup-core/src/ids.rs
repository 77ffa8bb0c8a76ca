//! Identifier derivation for hook invocations.
//!
//! Three identifiers are produced per invocation: the session ID (extracted
//! from the delegation prompt), the agent ID (extracted or synthesized, used
//! to name context files), and the correlation ID pairing the BEGIN and END
//! halves of a tool invocation.

use std::path::Path;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;

static SESSION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSessionId\s*:\s*([^\s,]+)").unwrap());

// Captures the rest of the line; tokenization and validation happen below so
// that `AgentId: arch-001 extra words` is rejected rather than truncated.
static AGENT_ID_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bAgentId\s*:\s*([^\n\r]*)").unwrap());

/// Names reserved for the host's own prompt conventions; never valid as
/// agent context file names.
pub const RESERVED_AGENT_IDS: &[&str] = &["main", "global", "system"];

const SHORT_ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Extracts the session ID from a delegation prompt.
pub fn extract_session_id(prompt: &str) -> Option<String> {
    SESSION_ID_RE
        .captures(prompt)
        .map(|caps| caps[1].to_string())
}

/// Extracts and validates an agent ID from a delegation prompt.
///
/// The value must be the single whitespace-delimited token following the
/// colon: 2-64 characters of `[A-Za-z0-9_-]` with alphanumeric first and
/// last characters. The result is lowercased; reserved names are rejected.
pub fn extract_agent_id(prompt: &str) -> Option<String> {
    let line = AGENT_ID_LINE_RE.captures(prompt)?[1].trim().to_string();

    let mut tokens = line.split_whitespace();
    let candidate = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }

    let candidate = candidate.to_lowercase();
    if !is_valid_agent_id(&candidate) || RESERVED_AGENT_IDS.contains(&candidate.as_str()) {
        return None;
    }
    Some(candidate)
}

fn is_valid_agent_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    if bytes.len() < 2 || bytes.len() > 64 {
        return false;
    }
    if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
}

/// Synthesizes an agent ID: `{8 random alphanumerics}-{agent_type}`.
pub fn generate_agent_id(agent_type: &str) -> String {
    let agent_type = if agent_type.is_empty() {
        "unknown"
    } else {
        agent_type
    };
    format!("{}-{}", random_short_id(), agent_type)
}

fn random_short_id() -> String {
    let mut bytes = [0u8; 8];
    if OsRng.try_fill_bytes(&mut bytes).is_err() {
        // Time-based prefix if the system RNG is unavailable.
        return format!("{:08x}", Utc::now().timestamp());
    }
    bytes
        .iter()
        .map(|b| SHORT_ID_CHARS[*b as usize % SHORT_ID_CHARS.len()] as char)
        .collect()
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; (len + 1) / 2];
    if OsRng.try_fill_bytes(&mut bytes).is_err() {
        let fallback = format!("{:x}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
        return fallback.chars().take(len).collect();
    }
    let mut hex = String::with_capacity(bytes.len() * 2);
    for b in &bytes {
        hex.push_str(&format!("{b:02x}"));
    }
    hex.truncate(len);
    hex
}

/// Disambiguates `candidate` against existing context files under
/// `<base>/<session>/`: tries `candidate`, then `candidate-1` through
/// `candidate-999`, then a `-uuid<8 hex>` suffix.
pub fn unique_agent_id(base: &Path, session_id: &str, candidate: &str) -> String {
    let session_dir = base.join(session_id);
    if !session_dir.exists() {
        return candidate.to_string();
    }

    if !session_dir.join(format!("{candidate}.jsonl")).exists() {
        return candidate.to_string();
    }

    for n in 1..=999 {
        let numbered = format!("{candidate}-{n}");
        if !session_dir.join(format!("{numbered}.jsonl")).exists() {
            return numbered;
        }
    }

    format!("{candidate}-uuid{}", random_hex(8))
}

/// Full agent-ID flow: prompt extraction, else synthesis from the agent type
/// plus disambiguation against the session directory.
pub fn resolve_agent_id(base: &Path, prompt: &str, agent_type: &str, session_id: &str) -> String {
    if let Some(extracted) = extract_agent_id(prompt) {
        return extracted;
    }
    unique_agent_id(base, session_id, &generate_agent_id(agent_type))
}

/// Builds the correlation ID pairing a BEGIN with its END.
///
/// A host-supplied `request_id` is used verbatim. Otherwise the ID is
/// `toolname_sessprefix_time_inputhash`, with the timestamp truncated to
/// whole seconds so both halves of an invocation derive the same key as long
/// as they land within the same second. `tool_input_raw` must be the exact
/// JSON text from the payload; the hash is the hex encoding of its first 16
/// bytes, truncated to 8 characters.
pub fn correlation_id(
    tool_name: &str,
    session_id: &str,
    request_id: Option<&str>,
    tool_input_raw: Option<&str>,
    timestamp: DateTime<Utc>,
) -> String {
    if let Some(id) = request_id.filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    let input_hash = tool_input_raw
        .map(|raw| {
            let mut hex = String::with_capacity(32);
            for b in raw.as_bytes().iter().take(16) {
                hex.push_str(&format!("{b:02x}"));
            }
            hex.truncate(8);
            hex
        })
        .unwrap_or_default();

    let session_prefix: String = session_id.chars().take(8).collect();
    let time = timestamp.format("%Y%m%dT%H%M%SZ");

    format!(
        "{}_{}_{}_{}",
        tool_name.to_lowercase(),
        session_prefix,
        time,
        input_hash
    )
}
