//! Module catalog
//!
//! Static description of every gated module. Module 1 is the entry point and
//! is never locked; each later module is unlocked by the flag found in the
//! module before it.

use serde::Serialize;

/// A gated unit of the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Module {
    /// Ordinal, starting at 1
    pub num: u32,
    /// Display name shown on the locked page
    pub name: &'static str,
    /// Short label used in unlock confirmations
    pub label: &'static str,
    /// Hint shown while the module is locked
    pub hint: &'static str,
}

/// All modules, in unlock order
pub const MODULES: &[Module] = &[
    Module {
        num: 1,
        name: "Model Downloads",
        label: "Model Downloads",
        hint: "",
    },
    Module {
        num: 2,
        name: "System Status",
        label: "System Status",
        hint: "Find the flag from the previous module.",
    },
    Module {
        num: 3,
        name: "Monitoring Dashboard",
        label: "Monitoring",
        hint: "Find the previous flag to unlock this module",
    },
    Module {
        num: 4,
        name: "Admin Login",
        label: "Admin",
        hint: "Find the previous flag to unlock this module",
    },
    Module {
        num: 5,
        name: "GPT-6",
        label: "gpt6",
        hint: "Find the previous flag to unlock this module",
    },
];

/// The module that is always unlocked
pub const ENTRY_MODULE: u32 = 1;

/// Modules with a page of their own, reported by the progress endpoint.
/// The final module is the reward for the last flag and has no page.
pub const PAGED_MODULES: u32 = 4;

/// Look up a module by ordinal
pub fn find_module(num: u32) -> Option<&'static Module> {
    MODULES.iter().find(|m| m.num == num)
}
