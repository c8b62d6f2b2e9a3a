//! CloudAI Portal - a staged cloud security range
//!
//! The portal reveals its modules one at a time as flags are found, and
//! simulates a service-account escalation chain along the way.
//!
//! ## Components
//!
//! - **Progress**: durable per-module unlock state
//! - **Flags**: maps a submitted flag to the module it unlocks
//! - **Guard**: gates module operations on progress
//! - **Broker**: relays credential selectors to the monitoring function
//! - **Impersonation**: static service-account capability checks
//! - **Monitor**: the monitoring function itself, relaying to the metadata server

pub mod broker;
pub mod config;
pub mod error;
pub mod flags;
pub mod guard;
pub mod impersonation;
pub mod monitor;
pub mod portal;
pub mod progress;

pub use config::Config;
pub use error::{PortalError, Result};
pub use portal::{create_router, AppState, SharedState};
