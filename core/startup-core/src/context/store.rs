//! Agent context store: one JSONL file per (session, agent) pair.
//!
//! Layout is `<base>/<session_id>/<agent_id>.jsonl`; the path is the index,
//! so entries never serialize their own session or agent. Appends share the
//! process-wide file mutex with the metrics writer. Tail reads slurp small
//! files and reverse-scan large ones in fixed-size blocks.

use std::collections::VecDeque;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use fs_err::File;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::writer::append_line;
use crate::timestamp::serde_millis;

/// Session directories created by the host start with this prefix; discovery
/// of the "latest session" only considers them.
pub const SESSION_DIR_PREFIX: &str = "dev-";

/// Files at or above this size are tail-read in blocks instead of slurped.
const SMALL_FILE_THRESHOLD: u64 = 1024 * 1024;

const TAIL_BLOCK_SIZE: u64 = 8192;

/// Hard ceiling on tail reads.
pub const MAX_TAIL_LINES: usize = 1000;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("session ID is required")]
    MissingSession,

    #[error("agent ID is required")]
    MissingAgent,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Who produced a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversational turn in an agent context file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub role: Role,
    pub content: String,
    #[serde(with = "serde_millis")]
    pub timestamp: DateTime<Utc>,
}

/// Appends one entry to `<base>/<session>/<agent>.jsonl`.
pub fn write_context_in(
    base: &Path,
    session_id: &str,
    agent_id: &str,
    entry: &ContextEntry,
) -> Result<(), ContextError> {
    if session_id.is_empty() {
        return Err(ContextError::MissingSession);
    }
    if agent_id.is_empty() {
        return Err(ContextError::MissingAgent);
    }

    let session_dir = base.join(session_id);
    fs_err::create_dir_all(&session_dir)?;

    let line = serde_json::to_string(entry)?;
    append_line(&session_dir.join(format!("{agent_id}.jsonl")), &line)?;
    Ok(())
}

/// Reads the last `max_lines` lines of an agent's context, oldest first.
///
/// With an empty `session_id`, the most recently modified `dev-*` session
/// directory containing `<agent>.jsonl` is used. Missing sessions or files
/// yield an empty vec. Lines are returned verbatim; parsing (including of
/// corrupt lines) is the caller's concern. `max_lines` is capped at 1000.
pub fn tail_in(base: &Path, session_id: &str, agent_id: &str, max_lines: usize) -> Vec<String> {
    if agent_id.is_empty() || max_lines == 0 {
        return Vec::new();
    }
    let max_lines = max_lines.min(MAX_TAIL_LINES);

    let session = if session_id.is_empty() {
        match find_latest_session_with_agent(base, agent_id) {
            Some(session) => session,
            None => return Vec::new(),
        }
    } else {
        session_id.to_string()
    };

    let path = base.join(session).join(format!("{agent_id}.jsonl"));
    match read_last_lines(&path, max_lines) {
        Ok(lines) => lines,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(error = %e, "failed to tail context file");
            }
            Vec::new()
        }
    }
}

/// Finds the most recently modified `dev-*` session directory under `base`.
pub fn find_latest_session_in(base: &Path) -> Option<String> {
    latest_session_matching(base, |_| true)
}

fn find_latest_session_with_agent(base: &Path, agent_id: &str) -> Option<String> {
    let agent_file = format!("{agent_id}.jsonl");
    latest_session_matching(base, |dir| dir.join(&agent_file).is_file())
}

fn latest_session_matching(base: &Path, keep: impl Fn(&Path) -> bool) -> Option<String> {
    let entries = fs_err::read_dir(base).ok()?;

    let mut latest: Option<(SystemTime, String)> = None;
    for entry in entries.flatten() {
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        if !name.starts_with(SESSION_DIR_PREFIX) {
            continue;
        }
        let path = entry.path();
        if !path.is_dir() || !keep(&path) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if latest.as_ref().map_or(true, |(at, _)| modified > *at) {
            latest = Some((modified, name));
        }
    }

    latest.map(|(_, name)| name)
}

fn read_last_lines(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size == 0 {
        return Ok(Vec::new());
    }

    if size < SMALL_FILE_THRESHOLD {
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(n);
        return Ok(lines[start..].iter().map(|s| s.to_string()).collect());
    }

    read_tail_blocks(&mut file, size, n)
}

/// Reverse-buffered tail read: fixed-size blocks from the end of the file,
/// split on newlines, accumulated until `n` complete lines are held or the
/// file start is reached.
fn read_tail_blocks(file: &mut File, size: u64, n: usize) -> std::io::Result<Vec<String>> {
    let mut lines: VecDeque<String> = VecDeque::new();
    let mut carry: Vec<u8> = Vec::new();
    let mut offset = size;

    while offset > 0 && lines.len() < n {
        let read_size = TAIL_BLOCK_SIZE.min(offset);
        offset -= read_size;

        let mut block = vec![0u8; read_size as usize];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut block)?;

        // The carry holds the partial line continuing into the next block.
        block.extend_from_slice(&carry);

        let mut parts: Vec<&[u8]> = block.split(|b| *b == b'\n').collect();
        let first = parts.remove(0).to_vec();
        for part in parts.iter().rev() {
            if !part.is_empty() && lines.len() < n {
                lines.push_front(String::from_utf8_lossy(part).into_owned());
            }
        }
        carry = first;
    }

    if !carry.is_empty() && lines.len() < n {
        lines.push_front(String::from_utf8_lossy(&carry).into_owned());
    }

    Ok(lines.into())
}
