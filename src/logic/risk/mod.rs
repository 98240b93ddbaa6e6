//! Risk Module
//!
//! Deterministic rule engine turning event attributes into a score, a level
//! and a list of reasons. Three event classes: login, bulk download, geo.
//!
//! ## Structure
//! - `types`: RiskLevel, RiskAssessment and the engine inputs
//! - `rules`: tier constants and the configurable `RiskRules`
//! - `engine`: the scoring functions
//!
//! ## Usage
//! ```ignore
//! use crate::logic::risk::{score_login, LoginRiskInput, LoginOutcome};
//!
//! let risk = score_login(&input);
//! if risk.score >= THREAT_MIN_SCORE {
//!     // hand over to the threat manager
//! }
//! ```

pub mod types;
pub mod rules;
pub mod engine;

pub use types::{
    AnomalyType,
    BulkDownloadRiskInput,
    GeoRiskInput,
    LoginOutcome,
    LoginRiskInput,
    RiskAssessment,
    RiskLevel,
};

pub use rules::{RiskRules, BULK_THREAT_MIN_SCORE, THREAT_MIN_SCORE};

pub use engine::{
    score_bulk_download,
    score_bulk_download_with,
    score_geo,
    score_geo_with,
    score_login,
    score_login_with,
};
