use geo::Point;
use geojson::{Feature, FeatureCollection, GeoJson, Value};
use log::warn;

use crate::ServiceError;

/// How much one node's accessibility changed once the candidate routes were added.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeChange {
    pub geometry: Point,
    /// Signed; 0.3 means a 30% improvement
    pub percent_change: f64,
}

/// The backend's answer for one set of candidate routes. The map shows the response exactly as
/// it arrived; `nodes` is the typed view of the features that carry a score.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisResult {
    pub nodes: Vec<NodeChange>,
    features: FeatureCollection,
}

impl AnalysisResult {
    pub fn from_geojson(input: &str) -> Result<AnalysisResult, ServiceError> {
        AnalysisResult::from_feature_collection(expect_feature_collection(input.parse()?)?)
    }

    pub fn from_feature_collection(
        features: FeatureCollection,
    ) -> Result<AnalysisResult, ServiceError> {
        let mut nodes = Vec::new();
        for (idx, feature) in features.features.iter().enumerate() {
            let Some(geometry) = point(feature) else {
                return Err(ServiceError::Malformed(format!(
                    "analysis feature {idx} isn't a Point"
                )));
            };
            match feature.property("percent_change").and_then(|x| x.as_f64()) {
                Some(percent_change) => nodes.push(NodeChange {
                    geometry,
                    percent_change,
                }),
                None => warn!("Analysis feature {idx} has no percent_change"),
            }
        }
        Ok(AnalysisResult { nodes, features })
    }

    pub fn len(&self) -> usize {
        self.features.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.features.is_empty()
    }

    pub fn into_feature_collection(self) -> FeatureCollection {
        self.features
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CentralityKind {
    Weak,
    Strong,
}

impl CentralityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CentralityKind::Weak => "weak",
            CentralityKind::Strong => "strong",
        }
    }

    fn parse(x: &str) -> Option<CentralityKind> {
        match x {
            "weak" => Some(CentralityKind::Weak),
            "strong" => Some(CentralityKind::Strong),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CentralityNode {
    pub geometry: Point,
    /// Distance from the median centrality of the whole network
    pub centrality: f64,
    pub kind: CentralityKind,
}

/// Centrality of the network as it is today, with no candidate routes.
#[derive(Clone, Debug, PartialEq)]
pub struct BaselineAnalysis {
    pub nodes: Vec<CentralityNode>,
    features: FeatureCollection,
}

impl BaselineAnalysis {
    /// Accepts either a bare FeatureCollection or one wrapped as `{"centrality": ...}`.
    pub fn from_geojson(input: &str) -> Result<BaselineAnalysis, ServiceError> {
        let mut value: serde_json::Value = serde_json::from_str(input)?;
        if value.get("type").is_none() {
            if let Some(inner) = value.get_mut("centrality") {
                value = inner.take();
            }
        }
        BaselineAnalysis::from_feature_collection(expect_feature_collection(
            GeoJson::from_json_value(value)?,
        )?)
    }

    pub fn from_feature_collection(
        features: FeatureCollection,
    ) -> Result<BaselineAnalysis, ServiceError> {
        let mut nodes = Vec::new();
        for (idx, feature) in features.features.iter().enumerate() {
            let Some(geometry) = point(feature) else {
                return Err(ServiceError::Malformed(format!(
                    "baseline feature {idx} isn't a Point"
                )));
            };
            let centrality = feature.property("centrality").and_then(|x| x.as_f64());
            let kind = feature
                .property("type")
                .and_then(|x| x.as_str())
                .and_then(CentralityKind::parse);
            match (centrality, kind) {
                (Some(centrality), Some(kind)) => nodes.push(CentralityNode {
                    geometry,
                    centrality,
                    kind,
                }),
                _ => warn!("Baseline feature {idx} is missing centrality or type"),
            }
        }
        Ok(BaselineAnalysis { nodes, features })
    }

    pub fn len(&self) -> usize {
        self.features.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.features.is_empty()
    }

    pub fn feature_collection(&self) -> &FeatureCollection {
        &self.features
    }
}

fn expect_feature_collection(gj: GeoJson) -> Result<FeatureCollection, ServiceError> {
    match gj {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        GeoJson::Feature(_) => Err(ServiceError::Malformed(
            "expected a FeatureCollection, got a Feature".to_string(),
        )),
        GeoJson::Geometry(_) => Err(ServiceError::Malformed(
            "expected a FeatureCollection, got a Geometry".to_string(),
        )),
    }
}

fn point(feature: &Feature) -> Option<Point> {
    match feature.geometry.as_ref()?.value {
        Value::Point(ref pt) if pt.len() >= 2 => Some(Point::new(pt[0], pt[1])),
        _ => None,
    }
}
