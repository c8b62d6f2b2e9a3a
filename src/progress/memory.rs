//! In-memory progress backend

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use super::{check_module, ProgressError, ProgressStore, UnlockTransition, ENTRY_MODULE};

/// Progress record held in process memory. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    unlocked: DashMap<u32, DateTime<Utc>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When a module was unlocked, if it has been
    pub fn unlocked_at(&self, module: u32) -> Option<DateTime<Utc>> {
        self.unlocked.get(&module).map(|at| *at)
    }
}

impl ProgressStore for MemoryProgressStore {
    fn is_unlocked(&self, module: u32) -> bool {
        module == ENTRY_MODULE || self.unlocked.contains_key(&module)
    }

    fn unlock(&self, module: u32) -> Result<UnlockTransition, ProgressError> {
        check_module(module)?;
        if module == ENTRY_MODULE {
            return Ok(UnlockTransition::AlreadyUnlocked);
        }

        // The shard lock held by the entry makes check-and-insert atomic
        match self.unlocked.entry(module) {
            Entry::Occupied(_) => Ok(UnlockTransition::AlreadyUnlocked),
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                info!(module, "Module unlocked");
                Ok(UnlockTransition::Unlocked)
            }
        }
    }
}
