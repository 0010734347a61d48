//! Skill Script Execution
//!
//! Runs scripts bundled with a skill as child processes:
//! - Path containment (the script must live inside the skill directory)
//! - Permission checks (setuid/setgid scripts are refused)
//! - Interpreter resolution from the script type
//! - JSON arguments on stdin, skill identity in the environment
//! - Hard timeout with process-group kill
//! - Per-stream output caps that never block the child
//!
//! # Security Model
//!
//! Validation happens before anything is spawned. It restricts *which* file
//! runs and with what privileges; it does not contain what the script does
//! once running.

use super::exit::{self, ExitOutcome};
use super::interpreter;
use super::types::{ScriptExecutionResult, ScriptMetadata, ScriptType, SkillMetadata};
use crate::error::{Result, SkillError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Per-stream output cap (10 MB)
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;
/// Serialized argument payload cap (10 MB)
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 600;
/// Exit code reported when a script is killed for exceeding its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;
/// Environment variable carrying this crate's version
pub const RUNTIME_VERSION_ENV: &str = "SKILL_RUNTIME_VERSION";

/// How long to wait for output pipes to close once the process is gone
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(5);
/// Further wait after killing the process group for readers to see EOF
const KILL_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Timeout used when the caller passes none, in seconds
    pub default_timeout_secs: u64,
    /// Maximum captured bytes per output stream
    pub max_output_bytes: usize,
    /// Maximum serialized argument size in bytes
    pub max_payload_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output_bytes: MAX_OUTPUT_BYTES,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        }
    }
}

/// Check a timeout value against the allowed 1..=600 second range
pub fn validate_timeout(parameter: &'static str, secs: u64) -> Result<Duration> {
    if (MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs) {
        Ok(Duration::from_secs(secs))
    } else {
        Err(SkillError::InvalidTimeout {
            parameter,
            value: secs,
        })
    }
}

/// Skill script executor
#[derive(Debug, Clone, Default)]
pub struct ScriptExecutor {
    config: ExecutorConfig,
}

impl ScriptExecutor {
    /// Create new executor with config
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Validate and run a script, capturing its output
    ///
    /// Validation failures and spawn failures are errors. Everything that
    /// happens after the process starts (non-zero exit, timeout, signal) is
    /// reported in the returned result.
    ///
    /// The script type comes from the extension of `script_path` as given,
    /// falling back to the resolved file.
    pub async fn execute<A: Serialize + ?Sized>(
        &self,
        script_path: &Path,
        arguments: &A,
        skill_base_dir: &Path,
        skill_metadata: &SkillMetadata,
        timeout_secs: Option<u64>,
    ) -> Result<ScriptExecutionResult> {
        self.run(script_path, None, arguments, skill_base_dir, skill_metadata, timeout_secs)
            .await
    }

    /// Run a registered script, trusting its declared type
    pub async fn execute_script<A: Serialize + ?Sized>(
        &self,
        script: &ScriptMetadata,
        arguments: &A,
        skill_base_dir: &Path,
        skill_metadata: &SkillMetadata,
        timeout_secs: Option<u64>,
    ) -> Result<ScriptExecutionResult> {
        self.run(
            &script.path,
            Some(script.script_type),
            arguments,
            skill_base_dir,
            skill_metadata,
            timeout_secs,
        )
        .await
    }

    async fn run<A: Serialize + ?Sized>(
        &self,
        script_path: &Path,
        declared_type: Option<ScriptType>,
        arguments: &A,
        skill_base_dir: &Path,
        skill_metadata: &SkillMetadata,
        timeout_secs: Option<u64>,
    ) -> Result<ScriptExecutionResult> {
        let timeout_secs = timeout_secs.unwrap_or(self.config.default_timeout_secs);
        let timeout = validate_timeout("timeout", timeout_secs)?;

        let (script, base_dir) = validate_path(script_path, skill_base_dir)?;
        check_permissions(&script)?;

        let script_type = declared_type
            .or_else(|| ScriptType::from_path(script_path))
            .or_else(|| ScriptType::from_path(&script))
            .ok_or_else(|| SkillError::InterpreterNotFound {
                script_type: format!(
                    "unknown (.{})",
                    script.extension().and_then(|e| e.to_str()).unwrap_or("")
                ),
                candidates: Vec::new(),
            })?;
        let interpreter = interpreter::resolve(script_type)?;

        let payload = serialize_arguments(arguments, self.config.max_payload_bytes)?;

        info!(
            "Executing {} script {} for skill '{}' (timeout {}s)",
            script_type,
            script.display(),
            skill_metadata.name,
            timeout_secs
        );

        let mut cmd = Command::new(&interpreter.program);
        cmd.args(&interpreter.args)
            .arg(&script)
            .current_dir(&base_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("SKILL_NAME", &skill_metadata.name)
            .env("SKILL_BASE_DIR", &base_dir)
            .env("SKILL_VERSION", skill_metadata.version_or_default())
            .env(RUNTIME_VERSION_ENV, env!("CARGO_PKG_VERSION"))
            .kill_on_drop(true);

        // Own process group, so a timeout can take down anything the script spawned
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| SkillError::Spawn {
            path: script.clone(),
            source,
        })?;
        let mut group = ProcessGroupGuard::new(child.id());

        let stdin_task = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                // The script may exit without reading its input
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!("Script stdin closed early: {}", e);
                }
                let _ = stdin.shutdown().await;
            })
        });

        let max_output = self.config.max_output_bytes;
        let captures = [
            StreamCapture::spawn(child.stdout.take(), max_output),
            StreamCapture::spawn(child.stderr.take(), max_output),
        ];

        let (outcome, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => (exit::decode(status), false),
            Ok(Err(source)) => {
                group.kill();
                return Err(SkillError::Spawn {
                    path: script.clone(),
                    source,
                });
            }
            Err(_) => {
                warn!(
                    "Script {} timed out after {}s, killing",
                    script.display(),
                    timeout_secs
                );
                group.kill();
                if let Err(e) = child.kill().await {
                    debug!("Kill after timeout failed: {}", e);
                }
                (ExitOutcome::exited(TIMEOUT_EXIT_CODE), true)
            }
        };
        let execution_time_ms = start.elapsed().as_millis() as u64;

        if let Some(task) = stdin_task {
            task.abort();
        }
        let [(stdout, stdout_truncated), (stderr, stderr_truncated)] =
            collect_output(captures, &mut group).await;

        // Nothing started by the script outlives the call
        group.kill();

        if stdout_truncated || stderr_truncated {
            warn!(
                "Output of {} truncated at {} bytes (stdout: {}, stderr: {})",
                script.display(),
                max_output,
                stdout_truncated,
                stderr_truncated
            );
        }

        let result = ScriptExecutionResult {
            script_path: script,
            exit_code: outcome.exit_code,
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            execution_time_ms,
            timeout: timed_out,
            signaled: outcome.signaled,
            signal_name: outcome.signal_name,
            signal_number: outcome.signal_number,
        };

        info!(
            "Script {} for skill '{}' finished: exit_code={} signaled={} timeout={} duration={}ms",
            result.script_path.display(),
            skill_metadata.name,
            result.exit_code,
            result.signaled,
            result.timeout,
            result.execution_time_ms
        );

        Ok(result)
    }
}

/// Resolve the script and base directory and require containment
fn validate_path(script_path: &Path, skill_base_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let reject = |reason: String| SkillError::PathSecurity {
        path: script_path.to_path_buf(),
        base_dir: skill_base_dir.to_path_buf(),
        reason,
    };

    let base_dir = skill_base_dir
        .canonicalize()
        .map_err(|e| reject(format!("cannot resolve base directory: {}", e)))?;

    let candidate = if script_path.is_absolute() {
        script_path.to_path_buf()
    } else {
        base_dir.join(script_path)
    };
    let script = candidate
        .canonicalize()
        .map_err(|e| reject(format!("cannot resolve script path: {}", e)))?;

    if !script.starts_with(&base_dir) {
        return Err(reject("path escapes the skill base directory".to_string()));
    }
    if !script.is_file() {
        return Err(reject("not a regular file".to_string()));
    }

    Ok((script, base_dir))
}

#[cfg(unix)]
fn check_permissions(script: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    const SETUID_SETGID: u32 = 0o6000;

    let mode = std::fs::metadata(script)
        .map_err(|source| SkillError::Spawn {
            path: script.to_path_buf(),
            source,
        })?
        .permissions()
        .mode();

    if mode & SETUID_SETGID != 0 {
        return Err(SkillError::ScriptPermission {
            path: script.to_path_buf(),
            mode: mode & 0o7777,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_script: &Path) -> Result<()> {
    Ok(())
}

/// Serialize arguments as a JSON object with lower-cased keys
fn serialize_arguments<A: Serialize + ?Sized>(arguments: &A, limit: usize) -> Result<Vec<u8>> {
    let value = serde_json::to_value(arguments).map_err(|e| SkillError::ArgumentSerialization {
        reason: e.to_string(),
    })?;

    let object = match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            return Err(SkillError::ArgumentSerialization {
                reason: format!("arguments must be a JSON object, got {}", json_kind(&other)),
            })
        }
    };

    let lowered: serde_json::Map<String, serde_json::Value> = object
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();

    let payload = serde_json::to_vec(&lowered).map_err(|e| SkillError::ArgumentSerialization {
        reason: e.to_string(),
    })?;

    if payload.len() > limit {
        return Err(SkillError::ArgumentSize {
            size: payload.len(),
            limit,
        });
    }
    Ok(payload)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Bytes captured from one output stream so far
#[derive(Debug, Default)]
struct CapturedOutput {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Drain a stream to EOF into `sink`, keeping at most `cap` bytes
///
/// Reading continues past the cap so the writer never blocks on a full pipe.
/// The sink is filled as data arrives, so an aborted reader still leaves
/// everything read up to that point.
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    cap: usize,
    sink: Arc<Mutex<CapturedOutput>>,
) {
    let mut chunk = [0u8; 8192];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let mut out = sink.lock();
                let room = cap.saturating_sub(out.bytes.len());
                if n > room {
                    out.bytes.extend_from_slice(&chunk[..room]);
                    out.truncated = true;
                } else {
                    out.bytes.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Output stream read failed: {}", e);
                break;
            }
        }
    }
}

/// Background reader for one child stream
struct StreamCapture {
    task: Option<tokio::task::JoinHandle<()>>,
    output: Arc<Mutex<CapturedOutput>>,
}

impl StreamCapture {
    fn spawn<R>(reader: Option<R>, cap: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let output = Arc::new(Mutex::new(CapturedOutput::default()));
        let task = reader.map(|r| tokio::spawn(read_capped(r, cap, Arc::clone(&output))));
        Self { task, output }
    }

    /// Stop reading and return what was captured
    fn finish(self) -> (String, bool) {
        if let Some(task) = self.task {
            task.abort();
        }
        let out = self.output.lock();
        (String::from_utf8_lossy(&out.bytes).into_owned(), out.truncated)
    }
}

/// Wait until every reader hits EOF; false if `limit` elapses first
async fn wait_for_eof(captures: &mut [StreamCapture], limit: Duration) -> bool {
    tokio::time::timeout(limit, async {
        for capture in captures.iter_mut() {
            if let Some(task) = capture.task.as_mut() {
                if !task.is_finished() {
                    let _ = task.await;
                }
            }
        }
    })
    .await
    .is_ok()
}

/// Gather both streams once the main process is gone
///
/// A descendant still holding a pipe open gets [`OUTPUT_DRAIN_GRACE`] to
/// finish; after that the process group is killed and whatever was read so
/// far is returned.
async fn collect_output(
    mut captures: [StreamCapture; 2],
    group: &mut ProcessGroupGuard,
) -> [(String, bool); 2] {
    if !wait_for_eof(&mut captures, OUTPUT_DRAIN_GRACE).await {
        warn!(
            "Output pipe still open {:?} after exit, killing process group",
            OUTPUT_DRAIN_GRACE
        );
        group.kill();
        if !wait_for_eof(&mut captures, KILL_DRAIN_GRACE).await {
            warn!("Output pipe still open after kill, keeping partial output");
        }
    }
    captures.map(StreamCapture::finish)
}

/// Kills the child's process group on demand or when dropped
///
/// Covers cancellation: dropping an in-flight `execute` future must not
/// leave the script or its descendants running. The group is killed at
/// most once.
struct ProcessGroupGuard {
    pid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn kill(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_process_group(pid);
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!("killpg({}) failed: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
