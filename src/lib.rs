//! Insider Sentinel
//!
//! Insider-threat detection core: risk scoring of logins, bulk downloads and
//! geographic anomalies, with session tracking and deduplicated threats.

pub mod config;
pub mod error;
pub mod logic;

pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use logic::service::{DetectionService, FailedLogin, LoginGrant};
