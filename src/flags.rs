//! Flag validation
//!
//! A submitted flag is trimmed and compared, in module order, against the
//! configured secrets. The secret found in module k unlocks module k+1.
//! Matching depends only on the secret, never on which modules are already
//! unlocked.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PortalError, Result};
use crate::progress::{find_module, ProgressStore, UnlockTransition};

pub const EMPTY_FLAG_MESSAGE: &str = "Please enter a flag";
pub const INVALID_FLAG_MESSAGE: &str = "Invalid flag. Please try again.";

/// Result of a flag submission
#[derive(Debug, Clone, Serialize)]
pub struct FlagOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_unlocked: Option<u32>,
    /// Whether this submission changed the progress record
    #[serde(skip)]
    pub transition: Option<UnlockTransition>,
}

impl FlagOutcome {
    fn invalid() -> Self {
        Self {
            success: false,
            message: INVALID_FLAG_MESSAGE.to_string(),
            module_unlocked: None,
            transition: None,
        }
    }
}

/// Maps submitted secrets to the module they unlock
pub struct FlagValidator {
    secrets: Vec<String>,
    store: Arc<dyn ProgressStore>,
}

impl FlagValidator {
    /// `secrets[k - 1]` is the flag hidden in module k
    pub fn new(secrets: Vec<String>, store: Arc<dyn ProgressStore>) -> Self {
        Self { secrets, store }
    }

    pub fn validate(&self, submitted: &str) -> Result<FlagOutcome> {
        let submitted = submitted.trim();
        if submitted.is_empty() {
            return Err(PortalError::Validation(EMPTY_FLAG_MESSAGE.to_string()));
        }

        let Some(found_in) = self
            .secrets
            .iter()
            .position(|secret| secret == submitted)
            .map(|i| i as u32 + 1)
        else {
            debug!("Flag rejected");
            return Ok(FlagOutcome::invalid());
        };

        let target = found_in + 1;
        let transition = self.store.unlock(target)?;
        info!(found_in, unlocked = target, ?transition, "Flag accepted");

        let label = find_module(target).map(|m| m.label).unwrap_or("Unknown");
        Ok(FlagOutcome {
            success: true,
            message: format!("Correct! Module {} ({}) is now unlocked.", target, label),
            module_unlocked: Some(target),
            transition: Some(transition),
        })
    }
}
