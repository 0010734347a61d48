//! Error types
//!
//! Every failure the runtime raises is a variant of [`SkillError`]. Script
//! outcomes (non-zero exit, timeout, signal) are not errors; they are fields
//! on [`ScriptExecutionResult`](crate::skills::ScriptExecutionResult).

use std::path::PathBuf;
use thiserror::Error;

/// Why a skill content file could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentLoadReason {
    NotFound,
    PermissionDenied,
    InvalidUtf8,
    Io(String),
}

impl std::fmt::Display for ContentLoadReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found (it may have been deleted after discovery)"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::InvalidUtf8 => write!(f, "file contains invalid UTF-8"),
            Self::Io(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<&std::io::Error> for ContentLoadReason {
    fn from(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            std::io::ErrorKind::InvalidData => Self::InvalidUtf8,
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Skill runtime errors
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("Manager not initialized: call discover() or adiscover() first")]
    NotInitialized,

    #[error("Manager was initialized with discover() (sync mode); use invoke_skill() or create a new manager and call adiscover()")]
    AsyncState,

    #[error("Manager was initialized with {current}(); cannot call {requested}(). Create a new manager instance")]
    InitModeConflict {
        current: &'static str,
        requested: &'static str,
    },

    #[error("Skill '{name}' not found. Available: {}", join_or_none(.available))]
    SkillNotFound { name: String, available: Vec<String> },

    #[error("Script '{script}' not found in skill '{skill}'. Available scripts: {}", join_or_none(.available))]
    ScriptNotFound {
        skill: String,
        script: String,
        available: Vec<String>,
    },

    #[error("Failed to load skill content from {}: {reason}", .path.display())]
    ContentLoad {
        path: PathBuf,
        reason: ContentLoadReason,
    },

    #[error("Parameter '{parameter}' is {size} bytes, exceeding the {limit} byte limit")]
    SizeLimitExceeded {
        parameter: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("Script path {} rejected for base directory {}: {reason}", .path.display(), .base_dir.display())]
    PathSecurity {
        path: PathBuf,
        base_dir: PathBuf,
        reason: String,
    },

    #[error("Script {} has dangerous permissions (mode {mode:o}): setuid/setgid scripts are not executed", .path.display())]
    ScriptPermission { path: PathBuf, mode: u32 },

    #[error("No interpreter for {script_type} scripts found on PATH (tried: {})", .candidates.join(", "))]
    InterpreterNotFound {
        script_type: String,
        candidates: Vec<String>,
    },

    #[error("Script arguments cannot be serialized: {reason}")]
    ArgumentSerialization { reason: String },

    #[error("Script argument payload is {size} bytes, exceeding the {limit} byte limit")]
    ArgumentSize { size: usize, limit: usize },

    #[error("Parameter '{parameter}' must be between 1 and 600 seconds, got {value}")]
    InvalidTimeout { parameter: &'static str, value: u64 },

    #[error("Failed to spawn script {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

pub type Result<T> = std::result::Result<T, SkillError>;
