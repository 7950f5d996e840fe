use serde::{Deserialize, Serialize};

/// Everything needed to reach the external services. Missing fields fall back to the defaults, so
/// hosts can pass in just the pieces they care about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SketchConfig {
    /// Access token for the map-matching service
    pub service_credential: String,
    pub analysis_base_url: String,
    pub matching_base_url: String,
    /// Travel profile for map matching, like "driving" or "cycling"
    pub matching_profile: String,
    /// Ask the matching service to clean up noisy input first
    pub tidy: bool,
}

impl Default for SketchConfig {
    fn default() -> Self {
        SketchConfig {
            service_credential: String::new(),
            analysis_base_url: "http://127.0.0.1:5000".to_string(),
            matching_base_url: "https://api.mapbox.com".to_string(),
            matching_profile: "driving".to_string(),
            tidy: false,
        }
    }
}
