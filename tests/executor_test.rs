//! Script Executor Integration Tests
//!
//! Runs real shell scripts, so these are unix-only.

#![cfg(unix)]

use serde_json::json;
use skill_runtime::{
    ExecutorConfig, ManagerConfig, ScriptExecutor, ScriptMetadata, SkillEntry, SkillError,
    SkillManager, SkillMetadata,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    base: PathBuf,
    metadata: SkillMetadata,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let base = temp.path().join("reporter");
    std::fs::create_dir_all(base.join("scripts")).unwrap();
    std::fs::write(base.join("SKILL.md"), "Report things").unwrap();
    let metadata = SkillMetadata::new("reporter", "test", base.join("SKILL.md")).with_version("1.2.3");
    Fixture {
        _temp: temp,
        base,
        metadata,
    }
}

fn script(base: &Path, name: &str, body: &str) -> PathBuf {
    let path = base.join("scripts").join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// True while `pid` exists and is not a zombie
fn is_running(pid: i32) -> bool {
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // State follows the parenthesized command name
        return stat
            .rsplit_once(") ")
            .map(|(_, rest)| !rest.starts_with('Z'))
            .unwrap_or(true);
    }
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

async fn wait_until_gone(pid: i32) -> bool {
    for _ in 0..60 {
        if !is_running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn read_pid(path: &Path) -> i32 {
    for _ in 0..60 {
        if let Ok(raw) = std::fs::read_to_string(path) {
            if let Ok(pid) = raw.trim().parse() {
                return pid;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("no pid written to {}", path.display());
}

#[tokio::test]
async fn test_environment_injected() {
    let fx = fixture();
    let path = script(
        &fx.base,
        "env.sh",
        "echo \"$SKILL_NAME|$SKILL_VERSION|$SKILL_RUNTIME_VERSION\"\necho \"$SKILL_BASE_DIR\"\n",
    );

    let executor = ScriptExecutor::new(ExecutorConfig::default());
    let result = executor
        .execute(&path, &json!({}), &fx.base, &fx.metadata, None)
        .await
        .unwrap();

    assert!(result.success());
    let mut lines = result.stdout.lines();
    assert_eq!(
        lines.next().unwrap(),
        format!("reporter|1.2.3|{}", env!("CARGO_PKG_VERSION"))
    );
    let reported = PathBuf::from(lines.next().unwrap());
    assert_eq!(reported, fx.base.canonicalize().unwrap());
}

#[tokio::test]
async fn test_default_version_when_unset() {
    let fx = fixture();
    let path = script(&fx.base, "ver.sh", "printf '%s' \"$SKILL_VERSION\"\n");
    let metadata = SkillMetadata::new("reporter", "test", fx.base.join("SKILL.md"));

    let result = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&path, &json!({}), &fx.base, &metadata, None)
        .await
        .unwrap();
    assert_eq!(result.stdout, "0.0.0");
}

#[tokio::test]
async fn test_arguments_on_stdin_with_lowercase_keys() {
    let fx = fixture();
    let path = script(&fx.base, "echo.sh", "cat\n");

    let result = ScriptExecutor::new(ExecutorConfig::default())
        .execute(
            &path,
            &json!({"Target": "prod", "RETRIES": 2}),
            &fx.base,
            &fx.metadata,
            None,
        )
        .await
        .unwrap();

    let echoed: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(echoed, json!({"target": "prod", "retries": 2}));
}

#[tokio::test]
async fn test_nonzero_exit_is_a_result() {
    let fx = fixture();
    let path = script(&fx.base, "fail.sh", "echo oops >&2\nexit 3\n");

    let result = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&path, &json!({}), &fx.base, &fx.metadata, None)
        .await
        .unwrap();

    assert_eq!(result.exit_code, 3);
    assert!(!result.success());
    assert!(!result.timeout);
    assert!(!result.signaled);
    assert_eq!(result.stderr.trim(), "oops");
}

#[tokio::test]
async fn test_timeout_kills_script() {
    let fx = fixture();
    let path = script(&fx.base, "slow.sh", "sleep 5\necho done\n");

    let start = Instant::now();
    let result = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&path, &json!({}), &fx.base, &fx.metadata, Some(1))
        .await
        .unwrap();

    assert!(result.timeout);
    assert_eq!(result.exit_code, 124);
    assert!(!result.stdout.contains("done"));
    assert!(
        (1000..2500).contains(&result.execution_time_ms),
        "execution_time_ms = {}",
        result.execution_time_ms
    );
    assert!(start.elapsed().as_secs_f64() < 4.0);
}

#[tokio::test]
async fn test_timeout_kills_descendants() {
    let fx = fixture();
    let path = script(&fx.base, "spawner.sh", "sleep 30 &\necho $! > bg.pid\nwait\n");

    let result = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&path, &json!({}), &fx.base, &fx.metadata, Some(1))
        .await
        .unwrap();
    assert!(result.timeout);

    let pid = read_pid(&fx.base.join("bg.pid")).await;
    assert!(wait_until_gone(pid).await, "background child {} survived the timeout", pid);
}

#[tokio::test]
async fn test_dropped_execution_kills_process_group() {
    let fx = fixture();
    let path = script(&fx.base, "hang.sh", "sleep 30 &\necho $! > bg.pid\nwait\n");
    let executor = ScriptExecutor::new(ExecutorConfig::default());

    let pending = tokio::time::timeout(
        Duration::from_millis(1000),
        executor.execute(&path, &json!({}), &fx.base, &fx.metadata, Some(60)),
    )
    .await;
    assert!(pending.is_err());

    let pid = read_pid(&fx.base.join("bg.pid")).await;
    assert!(wait_until_gone(pid).await, "background child {} survived cancellation", pid);
}

#[tokio::test]
async fn test_background_child_keeps_captured_output() {
    let fx = fixture();
    let path = script(
        &fx.base,
        "detach.sh",
        "sleep 20 &\necho $! > bg.pid\necho captured-line\necho err-line >&2\nexit 0\n",
    );

    let start = Instant::now();
    let result = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&path, &json!({}), &fx.base, &fx.metadata, None)
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.stdout.trim(), "captured-line");
    assert_eq!(result.stderr.trim(), "err-line");
    assert!(start.elapsed() < Duration::from_secs(10));

    let pid = read_pid(&fx.base.join("bg.pid")).await;
    assert!(wait_until_gone(pid).await, "background child {} outlived execute", pid);
}

#[tokio::test]
async fn test_detached_child_without_pipes_is_killed() {
    let fx = fixture();
    let path = script(
        &fx.base,
        "quiet.sh",
        "sleep 30 >/dev/null 2>&1 &\necho $! > bg.pid\necho started\n",
    );

    let result = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&path, &json!({}), &fx.base, &fx.metadata, None)
        .await
        .unwrap();
    assert_eq!(result.stdout.trim(), "started");

    let pid = read_pid(&fx.base.join("bg.pid")).await;
    assert!(wait_until_gone(pid).await);
}

#[tokio::test]
async fn test_declared_type_used_for_symlinked_script() {
    let fx = fixture();
    let target = script(&fx.base, "impl", "echo via-symlink\n");
    let link = fx.base.join("scripts").join("run.sh");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let entry = SkillEntry::new(fx.metadata.clone())
        .with_script(ScriptMetadata::from_path(&link).unwrap());
    let manager = SkillManager::new(ManagerConfig::default());
    manager.adiscover([entry]).await.unwrap();

    let result = manager
        .execute_skill_script("reporter", "run", &json!({}), None)
        .await
        .unwrap();
    assert!(result.success());
    assert_eq!(result.stdout.trim(), "via-symlink");
    assert!(result.script_path.ends_with("scripts/impl"));
}

#[tokio::test]
async fn test_invalid_timeout_rejected() {
    let fx = fixture();
    let path = script(&fx.base, "ok.sh", "true\n");
    let executor = ScriptExecutor::new(ExecutorConfig::default());

    for bad in [0, 601] {
        let err = executor
            .execute(&path, &json!({}), &fx.base, &fx.metadata, Some(bad))
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::InvalidTimeout { value, .. } if value == bad));
    }
}

#[tokio::test]
async fn test_output_truncated_but_process_completes() {
    let fx = fixture();
    let path = script(
        &fx.base,
        "noisy.sh",
        "head -c 200000 /dev/zero | tr '\\0' 'a'\necho tail >&2\n",
    );

    let config = ExecutorConfig {
        max_output_bytes: 1024,
        ..ExecutorConfig::default()
    };
    let result = ScriptExecutor::new(config)
        .execute(&path, &json!({}), &fx.base, &fx.metadata, Some(10))
        .await
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert!(result.stdout_truncated);
    assert_eq!(result.stdout.len(), 1024);
    assert!(!result.stderr_truncated);
    assert_eq!(result.stderr.trim(), "tail");
}

#[tokio::test]
async fn test_signal_reported() {
    let fx = fixture();
    let path = script(&fx.base, "suicide.sh", "kill -9 $$\n");

    let result = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&path, &json!({}), &fx.base, &fx.metadata, None)
        .await
        .unwrap();

    assert!(result.signaled);
    assert_eq!(result.signal_number, Some(9));
    assert_eq!(result.signal_name.as_deref(), Some("SIGKILL"));
    assert_eq!(result.exit_code, -9);
    assert!(!result.success());
}

#[tokio::test]
async fn test_script_outside_skill_rejected() {
    let fx = fixture();
    let outside = fx.base.parent().unwrap().join("evil.sh");
    std::fs::write(&outside, "echo pwned\n").unwrap();

    let err = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&outside, &json!({}), &fx.base, &fx.metadata, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SkillError::PathSecurity { .. }));

    let traversal = fx.base.join("scripts/../../evil.sh");
    let err = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&traversal, &json!({}), &fx.base, &fx.metadata, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SkillError::PathSecurity { .. }));
}

#[tokio::test]
async fn test_non_object_arguments_rejected() {
    let fx = fixture();
    let path = script(&fx.base, "ok.sh", "true\n");

    let err = ScriptExecutor::new(ExecutorConfig::default())
        .execute(&path, &json!([1, 2, 3]), &fx.base, &fx.metadata, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SkillError::ArgumentSerialization { .. }));
}

#[tokio::test]
async fn test_manager_runs_registered_script() {
    let fx = fixture();
    let path = script(&fx.base, "greet.sh", "read -r input\necho \"hello $input\"\n");
    let entry = SkillEntry::new(fx.metadata.clone())
        .with_script(ScriptMetadata::from_path(&path).unwrap());

    let manager = SkillManager::new(ManagerConfig::default());
    manager.adiscover([entry]).await.unwrap();

    let result = manager
        .execute_skill_script("reporter", "greet", &json!({"Who": "world"}), None)
        .await
        .unwrap();
    assert!(result.success());
    assert_eq!(result.stdout.trim(), r#"hello {"who":"world"}"#);

    match manager
        .execute_skill_script("reporter", "missing", &json!({}), None)
        .await
    {
        Err(SkillError::ScriptNotFound { available, .. }) => {
            assert_eq!(available, vec!["greet".to_string()])
        }
        other => panic!("unexpected: {:?}", other),
    }
}
