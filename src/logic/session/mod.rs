//! Session Module
//!
//! Active sessions keyed by employee id, each with its own idle timer.

pub mod manager;

pub use manager::{Session, SessionConfig, SessionManager};
