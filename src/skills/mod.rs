//! Skills System
//!
//! Invokes skill content with caching and runs skill-bundled scripts.
//!
//! # Architecture
//!
//! ```text
//! Caller ──► SkillManager ──► SkillLockRegistry (one mutex per skill)
//!                 │       ├──► normalize_arguments ──► ContentCache (LRU + mtime)
//!                 │       └──► ContentLoader ──► ContentProcessor
//!                 │
//!                 └──► ScriptExecutor ──► interpreter ──► child process
//!                                    └──► exit (status / signal decoding)
//! ```
//!
//! Discovery is external: callers hand the manager validated
//! [`SkillEntry`] records in priority order.
//!
//! # Security
//!
//! Script execution is guarded by:
//! - Path containment within the skill directory
//! - Refusal of setuid/setgid scripts
//! - Timeout with process-group kill
//! - Output size limits

pub mod content;
pub mod executor;
pub mod exit;
pub mod interpreter;
pub mod locks;
pub mod manager;
pub mod normalize;
pub mod registry;
pub mod types;

pub use content::{ContentLoader, ContentProcessor, FileContentLoader, SubstitutionProcessor};
pub use executor::{ExecutorConfig, ScriptExecutor};
pub use exit::ExitOutcome;
pub use locks::{SkillLock, SkillLockRegistry};
pub use manager::{InitMode, ManagerConfig, SkillManager};
pub use normalize::normalize_arguments;
pub use registry::SkillRegistry;
pub use types::{ScriptExecutionResult, ScriptMetadata, ScriptType, SkillEntry, SkillMetadata};
