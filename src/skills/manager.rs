//! Skill Manager
//!
//! Entry point for invoking skills and running their scripts. One manager
//! owns its registry, content cache and per-skill locks; nothing is global,
//! so independent managers can coexist in one process.
//!
//! # Invocation
//!
//! ```text
//! lock(skill) → normalize(args) → stat(SKILL.md) → cache.get
//!                                                     │ miss
//!                                                     ▼
//!                                  load → process → cache.put
//! ```
//!
//! The whole sequence runs under the skill's lock, so at most one caller
//! computes a given skill's content at a time. Different skills never wait
//! on each other.

use super::content::{ContentLoader, ContentProcessor, FileContentLoader, SubstitutionProcessor};
use super::executor::{ExecutorConfig, ScriptExecutor};
use super::locks::SkillLockRegistry;
use super::normalize::normalize_arguments;
use super::registry::SkillRegistry;
use super::types::{ScriptExecutionResult, SkillEntry, SkillMetadata};
use crate::cache::{CacheStats, ContentCache};
use crate::error::{ContentLoadReason, Result, SkillError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// How the manager was initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    Uninitialized,
    Sync,
    Async,
}

impl InitMode {
    /// Discovery call that puts the manager in this mode
    fn entry_point(self) -> &'static str {
        match self {
            InitMode::Uninitialized => "new",
            InitMode::Sync => "discover",
            InitMode::Async => "adiscover",
        }
    }
}

/// Manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Maximum number of cached (skill, arguments) entries
    pub max_cache_size: usize,
    /// Executor settings, including the default script timeout
    pub executor: ExecutorConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 100,
            executor: ExecutorConfig::default(),
        }
    }
}

/// Skill registry, content cache and script runner behind one API
pub struct SkillManager {
    registry: RwLock<SkillRegistry>,
    cache: Mutex<ContentCache>,
    locks: SkillLockRegistry,
    loader: Arc<dyn ContentLoader>,
    processor: Arc<dyn ContentProcessor>,
    executor: ScriptExecutor,
    init_mode: Mutex<InitMode>,
}

impl SkillManager {
    /// Create a manager with the default file loader and processor
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(FileContentLoader),
            Arc::new(SubstitutionProcessor),
        )
    }

    /// Create a manager with custom content collaborators
    pub fn with_collaborators(
        config: ManagerConfig,
        loader: Arc<dyn ContentLoader>,
        processor: Arc<dyn ContentProcessor>,
    ) -> Self {
        Self {
            registry: RwLock::new(SkillRegistry::new()),
            cache: Mutex::new(ContentCache::new(config.max_cache_size)),
            locks: SkillLockRegistry::new(),
            loader,
            processor,
            executor: ScriptExecutor::new(config.executor),
            init_mode: Mutex::new(InitMode::Uninitialized),
        }
    }

    /// Register discovered skills for blocking use
    ///
    /// Replaces any previously registered skills. Entries are expected in
    /// priority order. Fails if the manager was set up with
    /// [`adiscover`](Self::adiscover).
    pub fn discover(&self, entries: impl IntoIterator<Item = SkillEntry>) -> Result<usize> {
        self.initialize(InitMode::Sync, entries)
    }

    /// Register discovered skills for async use
    ///
    /// Fails if the manager was set up with [`discover`](Self::discover).
    pub async fn adiscover(&self, entries: impl IntoIterator<Item = SkillEntry>) -> Result<usize> {
        self.initialize(InitMode::Async, entries)
    }

    fn initialize(
        &self,
        requested: InitMode,
        entries: impl IntoIterator<Item = SkillEntry>,
    ) -> Result<usize> {
        let mut mode = self.init_mode.lock();
        if *mode != InitMode::Uninitialized && *mode != requested {
            return Err(SkillError::InitModeConflict {
                current: mode.entry_point(),
                requested: requested.entry_point(),
            });
        }

        let count = self.replace_registry(entries);
        *mode = requested;
        Ok(count)
    }

    fn replace_registry(&self, entries: impl IntoIterator<Item = SkillEntry>) -> usize {
        let mut registry = self.registry.write();
        registry.clear();
        for entry in entries {
            registry.register(entry);
        }
        info!("Registered {} skills", registry.len());
        registry.len()
    }

    pub fn init_mode(&self) -> InitMode {
        *self.init_mode.lock()
    }

    fn require_initialized(&self) -> Result<InitMode> {
        match self.init_mode() {
            InitMode::Uninitialized => Err(SkillError::NotInitialized),
            mode => Ok(mode),
        }
    }

    /// Metadata for a plain or `plugin:skill` name
    pub fn get_skill(&self, name: &str) -> Result<SkillMetadata> {
        self.registry.read().get(name).map(|entry| entry.metadata.clone())
    }

    pub fn list_skills(&self) -> Vec<SkillMetadata> {
        self.registry.read().list()
    }

    /// Skill names, optionally with qualified names for shadowed plugin skills
    pub fn list_skill_names(&self, include_qualified: bool) -> Vec<String> {
        self.registry.read().names(include_qualified)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Drop cached content for one skill, or everything
    pub fn clear_cache(&self, skill_name: Option<&str>) -> usize {
        let cleared = self.cache.lock().clear(skill_name);
        debug!("Cleared {} cache entries", cleared);
        cleared
    }

    /// Number of skills that have been locked at least once
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Invoke a skill asynchronously, with caching
    ///
    /// Requires [`adiscover`](Self::adiscover). Cancelling the returned
    /// future releases the skill lock.
    pub async fn ainvoke_skill(&self, name: &str, arguments: Option<&str>) -> Result<String> {
        if self.require_initialized()? == InitMode::Sync {
            return Err(SkillError::AsyncState);
        }

        let lock = self.locks.lock_for(name);
        let _guard = lock.lock().await;

        let metadata = self.get_skill(name)?;
        let file_path = metadata.skill_path.as_path();
        let normalized = normalize_arguments(arguments);

        let file_meta = tokio::fs::metadata(file_path)
            .await
            .map_err(|e| content_error(file_path, &e))?;
        let current_mtime = mtime_secs(file_path, &file_meta)?;

        let cached = self.cache.lock().get(name, &normalized, current_mtime);
        if let Some(content) = cached {
            return Ok(content);
        }

        let raw = self.loader.load_async(file_path).await?;
        let processed = self
            .processor
            .process(&raw, metadata.base_directory(), arguments)?;

        self.cache
            .lock()
            .put(name, &normalized, processed.clone(), current_mtime);
        Ok(processed)
    }

    /// Invoke a skill from blocking code, with caching
    ///
    /// Called from inside a Tokio runtime this cannot wait on the skill lock
    /// without stalling the scheduler, so it logs a warning and computes the
    /// content directly, bypassing cache and lock.
    ///
    /// Tokio exposes no way to tell a `spawn_blocking` thread from a worker
    /// thread, so blocking-pool callers also take the uncached path. From
    /// there, use `Handle::current().block_on(manager.ainvoke_skill(..))`
    /// on an async-initialized manager to get caching.
    pub fn invoke_skill(&self, name: &str, arguments: Option<&str>) -> Result<String> {
        self.require_initialized()?;

        if tokio::runtime::Handle::try_current().is_ok() {
            warn!(
                "invoke_skill called from async context for skill '{}'; use ainvoke_skill() for caching",
                name
            );
            return self.compute_uncached(name, arguments);
        }

        let lock = self.locks.lock_for(name);
        let _guard = lock.blocking_lock();

        let metadata = self.get_skill(name)?;
        let file_path = metadata.skill_path.as_path();
        let normalized = normalize_arguments(arguments);

        let file_meta = std::fs::metadata(file_path).map_err(|e| content_error(file_path, &e))?;
        let current_mtime = mtime_secs(file_path, &file_meta)?;

        let cached = self.cache.lock().get(name, &normalized, current_mtime);
        if let Some(content) = cached {
            return Ok(content);
        }

        let raw = self.loader.load(file_path)?;
        let processed = self
            .processor
            .process(&raw, metadata.base_directory(), arguments)?;

        self.cache
            .lock()
            .put(name, &normalized, processed.clone(), current_mtime);
        Ok(processed)
    }

    fn compute_uncached(&self, name: &str, arguments: Option<&str>) -> Result<String> {
        let metadata = self.get_skill(name)?;
        let raw = self.loader.load(&metadata.skill_path)?;
        self.processor
            .process(&raw, metadata.base_directory(), arguments)
    }

    /// Run a script bundled with a skill
    ///
    /// `timeout_secs` overrides the configured default and must be within
    /// 1..=600 seconds.
    pub async fn execute_skill_script(
        &self,
        skill_name: &str,
        script_name: &str,
        arguments: &serde_json::Value,
        timeout_secs: Option<u64>,
    ) -> Result<ScriptExecutionResult> {
        self.require_initialized()?;

        let (metadata, script) = {
            let registry = self.registry.read();
            let entry = registry.get(skill_name)?;
            let script = entry
                .scripts
                .iter()
                .find(|s| s.name == script_name)
                .cloned()
                .ok_or_else(|| SkillError::ScriptNotFound {
                    skill: skill_name.to_string(),
                    script: script_name.to_string(),
                    available: entry.scripts.iter().map(|s| s.name.clone()).collect(),
                })?;
            (entry.metadata.clone(), script)
        };

        self.executor
            .execute_script(
                &script,
                arguments,
                metadata.base_directory(),
                &metadata,
                timeout_secs,
            )
            .await
    }
}

fn content_error(path: &Path, err: &std::io::Error) -> SkillError {
    SkillError::ContentLoad {
        path: path.to_path_buf(),
        reason: ContentLoadReason::from(err),
    }
}

fn mtime_secs(path: &Path, meta: &std::fs::Metadata) -> Result<f64> {
    let modified = meta.modified().map_err(|e| content_error(path, &e))?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    })
}
