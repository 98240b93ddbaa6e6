//! Geo Module
//!
//! IP geolocation, travel feasibility and login location verification.
//!
//! ## Structure
//! - `types`: Location, LoginPoint, AnomalyResult, GeoError
//! - `distance`: haversine and minimum travel time
//! - `resolver`: LocationResolver trait, ip-api and static resolvers
//! - `analyzer`: cached resolution and anomaly classification
//! - `verification`: employee profile checks

pub mod types;
pub mod distance;
pub mod resolver;
pub mod analyzer;
pub mod verification;

pub use types::{AnomalyResult, GeoError, Location, LoginPoint};
pub use resolver::{IpApiResolver, LocationResolver, StaticResolver};
pub use analyzer::{classify_anomaly, GeoAnalyzer, GeoConfig};
pub use verification::{
    verify_login_location,
    EmployeeProfile,
    LocationKind,
    LocationVerdict,
    VerifiedLocation,
};
