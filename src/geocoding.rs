//! Place name to coordinates, via the GeoNames search API.
//! Restricted to populated places in Brazil.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::metrics::GEOCODER_CALLS;
use crate::models::Coordinates;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const COUNTRY_CODE: &str = "BR";
const COUNTRY_LABEL: &str = "Brasil";
const POPULATED_PLACE: &str = "P";

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `None` covers both "no match" and "provider unavailable".
    async fn resolve(&self, place: &str) -> Option<Coordinates>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    geonames: Vec<GeoName>,
    // set instead of results on account/quota errors
    status: Option<ProviderStatus>,
}

#[derive(Debug, Deserialize)]
struct ProviderStatus {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeoName {
    name: String,
    #[serde(rename = "adminCode1", default)]
    admin_code1: Option<String>,
    lat: serde_json::Value,
    lng: serde_json::Value,
}

// GeoNames sends coordinates as strings, accept numbers too
fn as_degrees(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

impl GeoName {
    fn into_coordinates(self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: as_degrees(&self.lat)?,
            longitude: as_degrees(&self.lng)?,
            city: self.name,
            region: self.admin_code1.unwrap_or_default(),
            country: COUNTRY_LABEL.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GeoNamesClient {
    client: Client,
    base_url: String,
    username: String,
}

impl GeoNamesClient {
    pub fn new(base_url: &str, username: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
        })
    }

    fn search_url(&self, place: &str) -> Result<Url, url::ParseError> {
        let query = place.to_uppercase();
        Url::parse_with_params(
            &format!("{}/searchJSON", self.base_url),
            &[
                ("q", query.as_str()),
                ("country", COUNTRY_CODE),
                ("featureClass", POPULATED_PLACE),
                ("maxRows", "1"),
                ("username", self.username.as_str()),
                ("lang", "pt"),
            ],
        )
    }

    async fn search(&self, place: &str) -> Result<Option<Coordinates>, String> {
        let url = self.search_url(place).map_err(|e| e.to_string())?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("provider returned status {}", response.status()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| format!("parse error: {e}"))?;

        if let Some(status) = body.status {
            return Err(format!("provider error: {}", status.message));
        }

        match body.geonames.into_iter().next() {
            Some(first) => first
                .into_coordinates()
                .map(Some)
                .ok_or_else(|| "result has no usable coordinates".to_string()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Geocoder for GeoNamesClient {
    async fn resolve(&self, place: &str) -> Option<Coordinates> {
        match self.search(place).await {
            Ok(Some(coordinates)) => {
                GEOCODER_CALLS.with_label_values(&["found"]).inc();
                tracing::info!(place, city = %coordinates.city, "place resolved");
                Some(coordinates)
            }
            Ok(None) => {
                GEOCODER_CALLS.with_label_values(&["not_found"]).inc();
                tracing::info!(place, "place not found by provider");
                None
            }
            Err(e) => {
                GEOCODER_CALLS.with_label_values(&["error"]).inc();
                tracing::warn!(place, error = %e, "geocoding call failed");
                None
            }
        }
    }
}
