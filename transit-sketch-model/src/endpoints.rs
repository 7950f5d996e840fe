//! URLs and response parsing for the external services. Both the browser and the native driver
//! perform the actual requests; everything else about the contract lives here.

use geo::{Coord, LineString};
use geojson::de::deserialize_geometry;
use serde::Deserialize;

use crate::{ServiceError, SketchConfig};

/// The matching service rejects traces with more points than this.
pub const MAX_MATCHING_POINTS: usize = 100;

pub fn matching_url(config: &SketchConfig, points: &[Coord]) -> Result<String, ServiceError> {
    if config.service_credential.is_empty() {
        return Err(ServiceError::MissingCredential);
    }
    if points.len() < 2 {
        return Err(ServiceError::TooFewPoints(points.len()));
    }
    if points.len() > MAX_MATCHING_POINTS {
        return Err(ServiceError::TooManyPoints {
            got: points.len(),
            max: MAX_MATCHING_POINTS,
        });
    }

    let coordinates = points
        .iter()
        .map(|pt| format!("{},{}", pt.x, pt.y))
        .collect::<Vec<_>>()
        .join(";");
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("access_token", &config.service_credential)
        .append_pair("geometries", "geojson")
        .append_pair("steps", "false")
        .append_pair("tidy", if config.tidy { "true" } else { "false" })
        .finish();
    Ok(format!(
        "{}/matching/v5/mapbox/{}/{}?{}",
        config.matching_base_url.trim_end_matches('/'),
        config.matching_profile,
        coordinates,
        query
    ))
}

pub fn analyze_url(config: &SketchConfig) -> String {
    format!("{}/analyze", config.analysis_base_url.trim_end_matches('/'))
}

pub fn baseline_url(config: &SketchConfig) -> String {
    format!(
        "{}/baseline_analysis",
        config.analysis_base_url.trim_end_matches('/')
    )
}

pub fn health_url(config: &SketchConfig) -> String {
    format!("{}/healthy", config.analysis_base_url.trim_end_matches('/'))
}

#[derive(Deserialize)]
struct MatchingResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    matchings: Vec<Matching>,
}

#[derive(Deserialize)]
struct Matching {
    #[serde(deserialize_with = "deserialize_geometry")]
    geometry: LineString,
}

/// Returns every candidate geometry, best first. An empty list is never returned; that case is
/// reported as `NoMatch`.
pub fn parse_matching_response(body: &str) -> Result<Vec<LineString>, ServiceError> {
    let response: MatchingResponse = serde_json::from_str(body)?;
    if response.code != "Ok" {
        let message = response.message.unwrap_or_default();
        return Err(ServiceError::NoMatch(format!("{}: {}", response.code, message)));
    }
    if response.matchings.is_empty() {
        return Err(ServiceError::NoMatch("no matchings returned".to_string()));
    }
    Ok(response.matchings.into_iter().map(|m| m.geometry).collect())
}
