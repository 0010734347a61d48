//! Interpreter resolution
//!
//! Maps a [`ScriptType`] to the program that runs it and locates that
//! program on `PATH`.

use super::types::ScriptType;
use crate::error::{Result, SkillError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Resolved interpreter and the arguments that precede the script path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Candidate program names, in preference order
pub fn candidates(script_type: ScriptType) -> &'static [&'static str] {
    match script_type {
        ScriptType::Python => &["python3", "python"],
        ScriptType::Shell => &["bash", "sh"],
        ScriptType::JavaScript => &["node"],
        ScriptType::Ruby => &["ruby"],
        ScriptType::Perl => &["perl"],
        ScriptType::PowerShell => &["pwsh", "powershell"],
        ScriptType::Batch => &["cmd"],
    }
}

fn leading_args(script_type: ScriptType) -> Vec<String> {
    match script_type {
        ScriptType::PowerShell => vec![
            "-NoProfile".to_string(),
            "-ExecutionPolicy".to_string(),
            "Bypass".to_string(),
            "-File".to_string(),
        ],
        ScriptType::Batch => vec!["/C".to_string()],
        _ => Vec::new(),
    }
}

/// Find the interpreter for a script type on the current `PATH`
pub fn resolve(script_type: ScriptType) -> Result<Interpreter> {
    resolve_in(script_type, std::env::var_os("PATH"))
}

/// Find the interpreter using an explicit search path
pub fn resolve_in(script_type: ScriptType, search_path: Option<OsString>) -> Result<Interpreter> {
    let names = candidates(script_type);
    let dirs: Vec<PathBuf> = search_path
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();

    for name in names {
        for dir in &dirs {
            if let Some(program) = executable_in(dir, name) {
                return Ok(Interpreter {
                    program,
                    args: leading_args(script_type),
                });
            }
        }
    }

    Err(SkillError::InterpreterNotFound {
        script_type: script_type.to_string(),
        candidates: names.iter().map(|s| s.to_string()).collect(),
    })
}

#[cfg(unix)]
fn executable_in(dir: &Path, name: &str) -> Option<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let meta = std::fs::metadata(&path).ok()?;
    (meta.is_file() && meta.permissions().mode() & 0o111 != 0).then_some(path)
}

#[cfg(not(unix))]
fn executable_in(dir: &Path, name: &str) -> Option<PathBuf> {
    ["exe", "cmd", "bat", "com"]
        .iter()
        .map(|ext| dir.join(name).with_extension(ext))
        .find(|path| path.is_file())
}
