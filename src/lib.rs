//! Skill Runtime
//!
//! Cached skill invocation and sandboxed script execution for agent runtimes.
//!
//! # Features
//!
//! - **Content Cache**: LRU eviction with file-mtime invalidation
//! - **Per-Skill Locking**: same-skill work is serialized, different skills run in parallel
//! - **Argument Normalization**: whitespace variants share cache entries
//! - **Script Execution**: path/permission validation, JSON stdin, timeouts, bounded output
//!
//! # Architecture
//!
//! ```text
//! Agent ──► SkillManager ──┬── Locks (one per skill)
//!                          ├── Cache (LRU + mtime)
//!                          ├── Loader / Processor
//!                          └── ScriptExecutor ──► interpreter ──► script
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod skills;

pub use cache::{CacheStats, ContentCache};
pub use config::Config;
pub use error::{ContentLoadReason, Result, SkillError};
pub use skills::{
    normalize_arguments, ExecutorConfig, ManagerConfig, ScriptExecutionResult, ScriptExecutor,
    ScriptMetadata, ScriptType, SkillEntry, SkillManager, SkillMetadata,
};
