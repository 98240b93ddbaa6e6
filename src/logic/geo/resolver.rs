//! IP Location Resolvers
//!
//! `IpApiResolver` queries an ip-api.com compatible endpoint.
//! `StaticResolver` answers from a fixed table (offline runs, tests).

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use super::types::{GeoError, Location};

/// Location-by-IP oracle
pub trait LocationResolver: Send + Sync {
    fn lookup(&self, ip: &str) -> impl Future<Output = Result<Location, GeoError>> + Send;
}

// ============================================================================
// IP-API
// ============================================================================

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

pub struct IpApiResolver {
    base_url: String,
    http_client: reqwest::Client,
}

impl IpApiResolver {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GeoError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeoError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

impl LocationResolver for IpApiResolver {
    async fn lookup(&self, ip: &str) -> Result<Location, GeoError> {
        let url = format!(
            "{}/{}?fields=status,message,country,city,lat,lon,query",
            self.base_url, ip
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| GeoError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeoError::Server(response.status().as_u16()));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| GeoError::Parse(e.to_string()))?;

        if body.status != "success" {
            return Err(GeoError::Lookup {
                ip: ip.to_string(),
                message: body.message.unwrap_or(body.status),
            });
        }

        Ok(Location {
            country: body.country.unwrap_or_else(|| super::types::UNKNOWN.to_string()),
            city: body.city.unwrap_or_else(|| super::types::UNKNOWN.to_string()),
            lat: body.lat.unwrap_or(0.0),
            lon: body.lon.unwrap_or(0.0),
        })
    }
}

// ============================================================================
// STATIC TABLE
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    table: HashMap<String, Location>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ip: &str, location: Location) -> Self {
        self.table.insert(ip.to_string(), location);
        self
    }
}

impl LocationResolver for StaticResolver {
    async fn lookup(&self, ip: &str) -> Result<Location, GeoError> {
        self.table.get(ip).cloned().ok_or_else(|| GeoError::Lookup {
            ip: ip.to_string(),
            message: "not in table".to_string(),
        })
    }
}
