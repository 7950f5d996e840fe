//! Data shared by the transit sketch map view, its browser binding and the native driver: the
//! baseline network, user-drawn routes, analysis payloads, endpoint contracts and map styling.

mod config;
mod endpoints;
mod error;
mod network;
mod results;
mod routes;
pub mod style;

pub use config::SketchConfig;
pub use endpoints::{
    analyze_url, baseline_url, health_url, matching_url, parse_matching_response,
    MAX_MATCHING_POINTS,
};
pub use error::{LoadError, ServiceError};
pub use network::{random_color, round_coordinate, round_geometry, NetworkLine, NetworkShape};
pub use results::{AnalysisResult, BaselineAnalysis, CentralityKind, CentralityNode, NodeChange};
pub use routes::{parse_draw_event, parse_feature_ids, DrawnLine, FeatureId, RouteSet};

use geojson::FeatureCollection;

/// The GeoJSON sources a map surface renders.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum SourceId {
    Network,
    AnalysisResults,
    Baseline,
}

impl SourceId {
    pub fn name(self) -> &'static str {
        match self {
            SourceId::Network => "originalRoutes",
            SourceId::AnalysisResults => "analysisResults",
            SourceId::Baseline => "baselineAnalysis",
        }
    }
}

pub fn empty_feature_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}
