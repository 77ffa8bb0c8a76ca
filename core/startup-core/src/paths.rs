//! Base-directory resolution for persisted telemetry.
//!
//! Records live under `.the-startup`, either project-local (when the project
//! already carries that directory) or in the user's home. Resolution is a
//! pure function over the environment and filesystem metadata; nothing here
//! creates directories - the writers do that on first append.

use std::env;
use std::path::{Path, PathBuf};

/// Directory name holding all persisted telemetry.
pub const BASE_DIR_NAME: &str = ".the-startup";

/// Environment variable overriding project-root detection (set by the host).
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

/// Environment variable pinning the base directory verbatim.
pub const BASE_OVERRIDE_ENV: &str = "THE_STARTUP_PATH";

/// Environment variable enabling diagnostic output on stderr.
pub const DEBUG_ENV: &str = "DEBUG_HOOKS";

/// Returns the project directory: `CLAUDE_PROJECT_DIR` if set, else `.`.
pub fn project_dir() -> PathBuf {
    match env::var(PROJECT_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("."),
    }
}

/// Resolves the base directory for persisted records.
///
/// Policy, in order:
/// 1. `THE_STARTUP_PATH` is used verbatim when set.
/// 2. `<project_dir>/.the-startup` when it exists and is a directory.
/// 3. `<home>/.the-startup` (not created here).
/// 4. `./.the-startup` when the home directory cannot be determined.
pub fn resolve_base() -> PathBuf {
    let override_path = env::var(BASE_OVERRIDE_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    resolve_base_with(override_path, &project_dir(), dirs::home_dir())
}

/// Pure form of [`resolve_base`] over explicit inputs, for callers and tests
/// that must not touch process environment.
pub fn resolve_base_with(
    override_path: Option<PathBuf>,
    project_dir: &Path,
    home: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = override_path {
        return path;
    }

    let local = project_dir.join(BASE_DIR_NAME);
    if local.is_dir() {
        return local;
    }

    match home {
        Some(home) => home.join(BASE_DIR_NAME),
        None => Path::new(".").join(BASE_DIR_NAME),
    }
}

/// Returns the daily-record directory under `base`.
pub fn logs_dir(base: &Path) -> PathBuf {
    base.join("logs")
}

/// Returns true when `DEBUG_HOOKS` is set to any non-empty value.
pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV).map(|v| !v.is_empty()).unwrap_or(false)
}
