//! Skill content loading and processing
//!
//! The manager reads raw skill text through a [`ContentLoader`] and turns it
//! into the final prompt text through a [`ContentProcessor`]. Both are traits
//! so embedders can swap in their own templating.

use crate::error::{ContentLoadReason, Result, SkillError};
use async_trait::async_trait;
use std::path::Path;

/// Largest argument string the default processor accepts (1 MiB)
pub const MAX_ARGUMENT_BYTES: usize = 1024 * 1024;

const ARGUMENTS_PLACEHOLDER: &str = "$ARGUMENTS";
const ESCAPED_PLACEHOLDER: &str = "$$ARGUMENTS";

/// Reads raw skill content from disk
#[async_trait]
pub trait ContentLoader: Send + Sync {
    /// Blocking read
    fn load(&self, path: &Path) -> Result<String>;

    /// Non-blocking read
    async fn load_async(&self, path: &Path) -> Result<String>;
}

/// Produces final skill text from raw content
pub trait ContentProcessor: Send + Sync {
    fn process(&self, raw: &str, base_dir: &Path, arguments: Option<&str>) -> Result<String>;
}

/// UTF-8 file loader that strips a leading byte-order mark
#[derive(Debug, Default, Clone)]
pub struct FileContentLoader;

impl FileContentLoader {
    fn decode(path: &Path, bytes: Vec<u8>) -> Result<String> {
        let mut text = String::from_utf8(bytes).map_err(|_| SkillError::ContentLoad {
            path: path.to_path_buf(),
            reason: ContentLoadReason::InvalidUtf8,
        })?;
        if text.starts_with('\u{feff}') {
            text.drain(..'\u{feff}'.len_utf8());
        }
        Ok(text)
    }

    fn read_error(path: &Path, err: std::io::Error) -> SkillError {
        SkillError::ContentLoad {
            path: path.to_path_buf(),
            reason: ContentLoadReason::from(&err),
        }
    }
}

#[async_trait]
impl ContentLoader for FileContentLoader {
    fn load(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| Self::read_error(path, e))?;
        Self::decode(path, bytes)
    }

    async fn load_async(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Self::read_error(path, e))?;
        Self::decode(path, bytes)
    }
}

/// Base-directory header plus `$ARGUMENTS` substitution
///
/// `$$ARGUMENTS` renders as a literal `$ARGUMENTS`. When the content has no
/// placeholder and arguments are non-empty, they are appended at the end.
#[derive(Debug, Default, Clone)]
pub struct SubstitutionProcessor;

impl ContentProcessor for SubstitutionProcessor {
    fn process(&self, raw: &str, base_dir: &Path, arguments: Option<&str>) -> Result<String> {
        let arguments = arguments.unwrap_or("");
        if arguments.len() > MAX_ARGUMENT_BYTES {
            return Err(SkillError::SizeLimitExceeded {
                parameter: "arguments",
                size: arguments.len(),
                limit: MAX_ARGUMENT_BYTES,
            });
        }

        let (body, substituted) = substitute_arguments(raw, arguments);

        let mut out = format!("Base directory for this skill: {}\n\n", base_dir.display());
        out.push_str(&body);
        if !substituted && !arguments.is_empty() {
            out.push_str("\n\nARGUMENTS: ");
            out.push_str(arguments);
        }
        Ok(out)
    }
}

/// Returns the rewritten text and whether any placeholder was replaced
fn substitute_arguments(raw: &str, arguments: &str) -> (String, bool) {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut substituted = false;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with(ESCAPED_PLACEHOLDER) {
            out.push_str(ARGUMENTS_PLACEHOLDER);
            rest = &tail[ESCAPED_PLACEHOLDER.len()..];
        } else if tail.starts_with(ARGUMENTS_PLACEHOLDER) {
            out.push_str(arguments);
            substituted = true;
            rest = &tail[ARGUMENTS_PLACEHOLDER.len()..];
        } else {
            out.push('$');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);

    (out, substituted)
}
