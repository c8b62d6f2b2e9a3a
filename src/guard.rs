//! Access guard for module-specific operations
//!
//! Consults the progress store on every call. Nothing is cached between
//! calls, so an unlock is visible to the very next request.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::progress::{find_module, ProgressStore};

/// Payload returned in place of a locked module's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedModule {
    pub locked: bool,
    pub module_num: u32,
    pub module_name: String,
    pub hint: String,
}

impl LockedModule {
    fn for_module(num: u32) -> Self {
        let (name, hint) = find_module(num)
            .map(|m| (m.name, m.hint))
            .unwrap_or(("Unknown", ""));
        Self {
            locked: true,
            module_num: num,
            module_name: name.to_string(),
            hint: hint.to_string(),
        }
    }
}

/// Outcome of a guarded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    Locked(LockedModule),
    Unlocked(T),
}

impl<T> Guarded<T> {
    pub fn is_locked(&self) -> bool {
        matches!(self, Guarded::Locked(_))
    }
}

/// Stateless gate in front of module operations
#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn ProgressStore>,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Run `operation` only if `module` is unlocked
    pub fn guard<T, F>(&self, module: u32, operation: F) -> Guarded<T>
    where
        F: FnOnce() -> T,
    {
        if self.store.is_unlocked(module) {
            Guarded::Unlocked(operation())
        } else {
            debug!(module, "Module locked");
            Guarded::Locked(LockedModule::for_module(module))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;
    use crate::progress::MemoryProgressStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_locked_module_skips_operation() {
        let store = Arc::new(MemoryProgressStore::new());
        let guard = AccessGuard::new(store);
        let calls = AtomicUsize::new(0);

        let result = guard.guard(2, || calls.fetch_add(1, Ordering::SeqCst));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            result,
            Guarded::Locked(LockedModule {
                locked: true,
                module_num: 2,
                module_name: "System Status".to_string(),
                hint: "Find the flag from the previous module.".to_string(),
            })
        );
    }

    #[test]
    fn test_unlocked_module_returns_operation_result() {
        let store = Arc::new(MemoryProgressStore::new());
        store.unlock(3).unwrap();
        let guard = AccessGuard::new(store);

        assert_eq!(guard.guard(3, || "content"), Guarded::Unlocked("content"));
        assert_eq!(guard.guard(1, || 7), Guarded::Unlocked(7));
    }

    #[test]
    fn test_fallible_operation_passes_through() {
        let store = Arc::new(MemoryProgressStore::new());
        store.unlock(2).unwrap();
        let guard = AccessGuard::new(store);

        let failed: Guarded<Result<u32, PortalError>> =
            guard.guard(2, || Err(PortalError::UpstreamUnavailable));
        assert!(matches!(
            failed,
            Guarded::Unlocked(Err(PortalError::UpstreamUnavailable))
        ));

        let locked: Guarded<Result<u32, PortalError>> = guard.guard(3, || Ok(1));
        assert!(locked.is_locked());
    }

    #[test]
    fn test_unlock_visible_on_next_call() {
        let store = Arc::new(MemoryProgressStore::new());
        let guard = AccessGuard::new(store.clone());

        assert!(guard.guard(4, || ()).is_locked());
        store.unlock(4).unwrap();
        assert!(!guard.guard(4, || ()).is_locked());
    }
}
