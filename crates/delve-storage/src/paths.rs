//! Path utilities for Delve directory resolution.

use anyhow::Result;
use std::path::PathBuf;

const DELVE_DIR: &str = ".delve";
const DATABASE_FILE: &str = "delve.db";
const LOGS_DIR: &str = "logs";

/// Environment variable to override the Delve directory.
const DELVE_DIR_ENV: &str = "DELVE_DIR";

/// Resolve the Delve data directory.
/// Priority: DELVE_DIR env var > ~/.delve/
pub fn resolve_delve_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DELVE_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(DELVE_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Ensure the Delve directory exists and return its path.
pub fn ensure_delve_dir() -> Result<PathBuf> {
    let dir = resolve_delve_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the database path: ~/.delve/delve.db
pub fn database_path() -> Result<PathBuf> {
    Ok(ensure_delve_dir()?.join(DATABASE_FILE))
}

/// Get the log directory: ~/.delve/logs, created if missing.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let dir = ensure_delve_dir()?.join(LOGS_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
