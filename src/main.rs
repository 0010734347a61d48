//! Skill Runtime - Entry Point
//!
//! Commands:
//! - invoke <skill> [arguments...]: print processed skill content
//! - run <skill> <script> [json]: run a bundled script, print the result as JSON

use anyhow::{bail, Context};
use skill_runtime::{Config, ScriptMetadata, SkillEntry, SkillManager, SkillMetadata};
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn print_help() {
    println!("Skill Runtime v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage:");
    println!("  skill-runtime invoke <skill> [arguments...]");
    println!("  skill-runtime run <skill> <script> [json-arguments]");
    println!();
    println!("Options:");
    println!("  --help, -h         Show this help");
    println!();
    println!("Environment variables:");
    println!("  SKILL_RUNTIME_SKILLS_DIR       Skills directory (default: ./skills)");
    println!("  SKILL_RUNTIME_CACHE_SIZE       Content cache capacity (default: 100)");
    println!("  SKILL_RUNTIME_SCRIPT_TIMEOUT   Script timeout in seconds, 1-600 (default: 30)");
    println!("  SKILL_RUNTIME_LOG_FORMAT       Log format: text or json (default: text)");
    println!("  RUST_LOG                       Log level (trace, debug, info, warn, error)");
}

/// Build a registry entry for `<skills_dir>/<name>`, including its scripts/ files
fn skill_entry(skills_dir: &Path, name: &str) -> anyhow::Result<SkillEntry> {
    let dir = skills_dir.join(name);
    let skill_path = dir.join("SKILL.md");
    if !skill_path.is_file() {
        bail!("No SKILL.md found in {}", dir.display());
    }

    let mut entry = SkillEntry::new(SkillMetadata::new(name, "", skill_path));
    if let Ok(read_dir) = std::fs::read_dir(dir.join("scripts")) {
        let mut paths: Vec<_> = read_dir.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        paths.sort();
        for script in paths.into_iter().filter_map(ScriptMetadata::from_path) {
            entry = entry.with_script(script);
        }
    }
    Ok(entry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // Logs go to stderr; stdout carries command output
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        })
        .unwrap_or(Level::WARN);

    let json_logs = std::env::var("SKILL_RUNTIME_LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        // Machine consumers - one JSON object per line
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let config = Config::from_env()?;
    info!("Skill Runtime v{} (skills: {})", env!("CARGO_PKG_VERSION"), config.skills_dir.display());

    let manager = SkillManager::new(config.manager_config());

    match args[0].as_str() {
        "invoke" => {
            let Some(skill) = args.get(1) else {
                bail!("Usage: skill-runtime invoke <skill> [arguments...]");
            };
            let arguments = args[2..].join(" ");

            manager.adiscover([skill_entry(&config.skills_dir, skill)?]).await?;
            let content = manager.ainvoke_skill(skill, Some(&arguments)).await?;
            println!("{}", content);
        }
        "run" => {
            let (Some(skill), Some(script)) = (args.get(1), args.get(2)) else {
                bail!("Usage: skill-runtime run <skill> <script> [json-arguments]");
            };
            let arguments: serde_json::Value = match args.get(3) {
                Some(raw) => serde_json::from_str(raw).context("Script arguments must be valid JSON")?,
                None => serde_json::json!({}),
            };

            // Accept either `fetch` or `fetch.py`
            let script = Path::new(script)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(script);

            manager.adiscover([skill_entry(&config.skills_dir, skill)?]).await?;
            let result = manager
                .execute_skill_script(skill, script, &arguments, None)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if !result.success() {
                std::process::exit(if result.exit_code > 0 { result.exit_code } else { 1 });
            }
        }
        other => {
            print_help();
            bail!("Unknown command: {}", other);
        }
    }

    Ok(())
}
