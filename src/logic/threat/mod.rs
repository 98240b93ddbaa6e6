//! Threat Module
//!
//! Deduplicated threat records and their lifecycle.
//!
//! ## Structure
//! - `types`: ThreatCategory, ThreatDetails, ActiveThreat, ThreatAlert
//! - `manager`: dedup policy, create/update/resolve
//!
//! ## Usage
//! ```ignore
//! use crate::logic::threat::{ThreatDetails, ThreatManager};
//!
//! if let Some(alert) = manager.raise(&employee_id, risk, details, login_ref)? {
//!     // alert.kind is Created or Updated
//! }
//! ```

pub mod types;
pub mod manager;

pub use types::{ActiveThreat, AlertKind, ThreatAlert, ThreatCategory, ThreatDetails};

pub use manager::{DedupPolicy, ThreatManager};
