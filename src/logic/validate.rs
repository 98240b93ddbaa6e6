//! Boundary validation
//!
//! Rejects malformed input before it reaches the rule engine.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{EngineError, EngineResult};

static EMPLOYEE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^EMP\d{3,}$").expect("valid employee id pattern"));

pub fn employee_id(id: &str) -> EngineResult<()> {
    if EMPLOYEE_ID.is_match(id) {
        Ok(())
    } else {
        Err(EngineError::validation(format!("invalid employee id: {:?}", id)))
    }
}

pub fn ip_address(ip: &str) -> EngineResult<IpAddr> {
    ip.trim()
        .parse::<IpAddr>()
        .map_err(|_| EngineError::validation(format!("invalid IP address: {:?}", ip)))
}

pub fn timestamp(ts: DateTime<Utc>) -> EngineResult<()> {
    if ts.timestamp_millis() < 0 {
        return Err(EngineError::validation(format!("timestamp before epoch: {}", ts)));
    }
    Ok(())
}

/// Sizes arrive signed from callers; negative ones are rejected
pub fn size_bytes(size: i64) -> EngineResult<u64> {
    u64::try_from(size).map_err(|_| EngineError::validation(format!("negative size: {}", size)))
}

pub fn path(path: &str) -> EngineResult<()> {
    if path.trim().is_empty() {
        return Err(EngineError::validation("empty path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_employee_ids() {
        assert!(employee_id("EMP001").is_ok());
        assert!(employee_id("EMP123456").is_ok());
        assert!(employee_id("EMP01").is_err());
        assert!(employee_id("emp001").is_err());
        assert!(employee_id("EMP001 ").is_err());
        assert!(employee_id("").is_err());
    }

    #[test]
    fn test_ip_and_size() {
        assert!(ip_address("192.168.0.1").is_ok());
        assert!(ip_address("2001:db8::1").is_ok());
        assert!(ip_address("999.1.1.1").is_err());
        assert_eq!(size_bytes(42).unwrap(), 42);
        assert!(matches!(size_bytes(-1), Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_timestamp_and_path() {
        assert!(timestamp(Utc.with_ymd_and_hms(1969, 12, 31, 23, 0, 0).unwrap()).is_err());
        assert!(timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).is_ok());
        assert!(path("   ").is_err());
        assert!(path("/tmp/a").is_ok());
    }
}
