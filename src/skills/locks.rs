//! Per-skill lock registry
//!
//! Hands out one mutex per skill name. The map itself sits behind a single
//! coarse lock, so two first-time requests for the same name always end up
//! sharing one mutex. Locks are never removed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Mutual-exclusion handle for one skill
pub type SkillLock = tokio::sync::Mutex<()>;

/// Lazily populated map of skill name to lock
#[derive(Debug, Default)]
pub struct SkillLockRegistry {
    locks: Mutex<HashMap<String, Arc<SkillLock>>>,
}

impl SkillLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for a skill
    pub fn lock_for(&self, skill_name: &str) -> Arc<SkillLock> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(skill_name) {
            return Arc::clone(lock);
        }

        debug!("Creating lock for skill '{}'", skill_name);
        let lock = Arc::new(SkillLock::new(()));
        locks.insert(skill_name.to_string(), Arc::clone(&lock));
        lock
    }

    /// Number of skills that have a lock
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
