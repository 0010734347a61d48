//! Skill Type Definitions
//!
//! Core data structures for the skill system.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Version reported to scripts when the skill declares none
pub const DEFAULT_SKILL_VERSION: &str = "0.0.0";

/// Skill metadata, already validated by discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMetadata {
    /// Unique skill name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Path to the skill's content file (usually `SKILL.md`)
    pub skill_path: PathBuf,
    /// Semantic version
    #[serde(default)]
    pub version: Option<String>,
}

impl SkillMetadata {
    pub fn new(name: &str, description: &str, skill_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            skill_path: skill_path.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Directory containing the content file
    pub fn base_directory(&self) -> &Path {
        self.skill_path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_SKILL_VERSION)
    }
}

/// Script languages the executor knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    Python,
    Shell,
    JavaScript,
    Ruby,
    Perl,
    PowerShell,
    Batch,
}

impl ScriptType {
    /// Infer the type from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "py" => Some(Self::Python),
            "sh" | "bash" => Some(Self::Shell),
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "rb" => Some(Self::Ruby),
            "pl" => Some(Self::Perl),
            "ps1" => Some(Self::PowerShell),
            "bat" | "cmd" => Some(Self::Batch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Shell => "shell",
            Self::JavaScript => "javascript",
            Self::Ruby => "ruby",
            Self::Perl => "perl",
            Self::PowerShell => "powershell",
            Self::Batch => "batch",
        }
    }
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script bundled with a skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptMetadata {
    /// Script name without extension
    pub name: String,
    /// Script location
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub script_type: ScriptType,
    #[serde(default)]
    pub description: Option<String>,
}

impl ScriptMetadata {
    /// Build metadata from a file path; `None` for unknown extensions
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let script_type = ScriptType::from_path(&path)?;
        let name = path.file_stem()?.to_str()?.to_string();
        Some(Self {
            name,
            path,
            script_type,
            description: None,
        })
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// One discovered skill as handed to the registry
#[derive(Debug, Clone)]
pub struct SkillEntry {
    pub metadata: SkillMetadata,
    pub scripts: Vec<ScriptMetadata>,
    /// Plugin namespace, enabling `plugin:skill` lookup
    pub plugin: Option<String>,
}

impl SkillEntry {
    pub fn new(metadata: SkillMetadata) -> Self {
        Self {
            metadata,
            scripts: Vec::new(),
            plugin: None,
        }
    }

    pub fn with_script(mut self, script: ScriptMetadata) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn with_plugin(mut self, plugin: &str) -> Self {
        self.plugin = Some(plugin.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Outcome of one script execution
///
/// `success` is derived from the other fields and is included when the
/// result is serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptExecutionResult {
    pub script_path: PathBuf,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub execution_time_ms: u64,
    pub timeout: bool,
    pub signaled: bool,
    pub signal_name: Option<String>,
    pub signal_number: Option<i32>,
}

impl ScriptExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.signaled && !self.timeout
    }
}

impl Serialize for ScriptExecutionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ScriptExecutionResult", 12)?;
        s.serialize_field("script_path", &self.script_path)?;
        s.serialize_field("exit_code", &self.exit_code)?;
        s.serialize_field("stdout", &self.stdout)?;
        s.serialize_field("stderr", &self.stderr)?;
        s.serialize_field("stdout_truncated", &self.stdout_truncated)?;
        s.serialize_field("stderr_truncated", &self.stderr_truncated)?;
        s.serialize_field("execution_time_ms", &self.execution_time_ms)?;
        s.serialize_field("timeout", &self.timeout)?;
        s.serialize_field("signaled", &self.signaled)?;
        s.serialize_field("signal_name", &self.signal_name)?;
        s.serialize_field("signal_number", &self.signal_number)?;
        s.serialize_field("success", &self.success())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32) -> ScriptExecutionResult {
        ScriptExecutionResult {
            script_path: PathBuf::from("/skills/demo/scripts/run.py"),
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            stdout_truncated: false,
            stderr_truncated: false,
            execution_time_ms: 12,
            timeout: false,
            signaled: false,
            signal_name: None,
            signal_number: None,
        }
    }

    #[test]
    fn test_success_derived() {
        assert!(result(0).success());
        assert!(!result(1).success());

        let mut timed_out = result(0);
        timed_out.timeout = true;
        assert!(!timed_out.success());

        let mut signaled = result(0);
        signaled.signaled = true;
        assert!(!signaled.success());
    }

    #[test]
    fn test_result_serializes_success() {
        let json = serde_json::to_value(result(0)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["signal_name"], serde_json::Value::Null);
    }

    #[test]
    fn test_script_type_from_extension() {
        assert_eq!(ScriptType::from_path(Path::new("a.py")), Some(ScriptType::Python));
        assert_eq!(ScriptType::from_path(Path::new("a.SH")), Some(ScriptType::Shell));
        assert_eq!(ScriptType::from_path(Path::new("a.mjs")), Some(ScriptType::JavaScript));
        assert_eq!(ScriptType::from_path(Path::new("a.txt")), None);
        assert_eq!(ScriptType::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_script_metadata_from_path() {
        let script = ScriptMetadata::from_path("/skills/pdf/scripts/extract.py").unwrap();
        assert_eq!(script.name, "extract");
        assert_eq!(script.script_type, ScriptType::Python);
        assert!(ScriptMetadata::from_path("/skills/pdf/README.md").is_none());
    }

    #[test]
    fn test_metadata_base_directory() {
        let meta = SkillMetadata::new("demo", "Demo", "/skills/demo/SKILL.md");
        assert_eq!(meta.base_directory(), Path::new("/skills/demo"));
        assert_eq!(meta.version_or_default(), DEFAULT_SKILL_VERSION);
        assert_eq!(meta.with_version("1.2.0").version_or_default(), "1.2.0");
    }
}
