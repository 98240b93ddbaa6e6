//! Logic Module - Detection engines
//!
//! Everything that turns raw login and file activity into scored threats.
//!
//! ## Structure
//! - `risk/` - Rule engine (login, bulk download, geo scoring)
//! - `geo/` - Location resolution, travel analysis, location verification
//! - `activity/` - Folder watching and bulk download aggregation
//! - `threat/` - Active threats and deduplication
//! - `session/` - Sessions and idle timeout
//! - `store/` - Persistence (memory, SQLite)
//! - `service/` - Orchestration of the above

// Engines
pub mod risk;
pub mod geo;
pub mod activity;
pub mod threat;
pub mod session;

// Plumbing
pub mod clock;
pub mod events;
pub mod store;
pub mod validate;

pub mod service;
