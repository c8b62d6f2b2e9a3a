//! Progress store - durable per-module unlock state
//!
//! The progress record is the single source of truth for gating. Two
//! backends implement [`ProgressStore`]:
//! - [`FileProgressStore`]: one marker file per unlocked module, shared by
//!   every process pointed at the same directory and surviving restarts
//! - [`MemoryProgressStore`]: in-process map, used for tests and ephemeral runs
//!
//! Unlocking is monotonic and there is no way to lock a module again.

pub mod file;
pub mod memory;
pub mod module;

pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;
pub use module::{find_module, Module, ENTRY_MODULE, MODULES, PAGED_MODULES};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{ProgressBackend, ProgressConfig};

/// Result of an unlock request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockTransition {
    /// This call moved the module from locked to unlocked
    Unlocked,
    /// The module was already unlocked, nothing changed
    AlreadyUnlocked,
}

/// Per-module state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Locked,
    Unlocked,
}

impl From<bool> for ModuleState {
    fn from(unlocked: bool) -> Self {
        if unlocked {
            ModuleState::Unlocked
        } else {
            ModuleState::Locked
        }
    }
}

/// Durable mapping from module ordinal to unlock state.
///
/// Implementations must make `unlock` a single atomic create-if-absent so
/// that concurrent callers racing on the same module observe exactly one
/// `Unlocked` transition. Reads never block on writers.
pub trait ProgressStore: Send + Sync {
    /// Whether a module is unlocked. Module 1 is always unlocked.
    fn is_unlocked(&self, module: u32) -> bool;

    /// Mark a module unlocked. Idempotent.
    fn unlock(&self, module: u32) -> Result<UnlockTransition, ProgressError>;

    /// Point-in-time view of every catalog module
    fn snapshot(&self) -> BTreeMap<u32, bool> {
        MODULES
            .iter()
            .map(|m| (m.num, self.is_unlocked(m.num)))
            .collect()
    }

    /// State of a single module
    fn state(&self, module: u32) -> ModuleState {
        self.is_unlocked(module).into()
    }
}

/// Progress store errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProgressError {
    #[error("Unknown module: {0}")]
    UnknownModule(u32),

    #[error("IO error: {0}")]
    Io(String),
}

/// Reject ordinals outside the catalog before touching storage
pub(crate) fn check_module(num: u32) -> Result<(), ProgressError> {
    find_module(num)
        .map(|_| ())
        .ok_or(ProgressError::UnknownModule(num))
}

/// Open the configured backend
pub fn open_store(config: &ProgressConfig) -> Result<Arc<dyn ProgressStore>, ProgressError> {
    match config.backend {
        ProgressBackend::File => Ok(Arc::new(FileProgressStore::open(&config.dir)?)),
        ProgressBackend::Memory => Ok(Arc::new(MemoryProgressStore::new())),
    }
}
