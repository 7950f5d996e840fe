use std::collections::BTreeMap;
use std::fmt;

use geo::LineString;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value};

use crate::LoadError;

/// Opaque identifier a draw surface assigns to each feature it manages.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FeatureId(pub String);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&geojson::feature::Id> for FeatureId {
    fn from(id: &geojson::feature::Id) -> Self {
        match id {
            geojson::feature::Id::String(x) => FeatureId(x.clone()),
            geojson::feature::Id::Number(x) => FeatureId(x.to_string()),
        }
    }
}

/// A line the user drew, before or after snapping.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawnLine {
    pub id: FeatureId,
    pub geometry: LineString,
}

/// The candidate routes the user has added, keyed by draw surface id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteSet {
    routes: BTreeMap<FeatureId, LineString>,
}

impl RouteSet {
    pub fn contains(&self, id: &FeatureId) -> bool {
        self.routes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureId, &LineString)> {
        self.routes.iter()
    }

    /// The payload the analysis backend expects. Properties are left empty; the backend fills in
    /// its own service assumptions.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        self.routes
            .iter()
            .map(|(id, geometry)| Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(Value::from(geometry))),
                id: Some(geojson::feature::Id::String(id.0.clone())),
                properties: Some(JsonObject::new()),
                foreign_members: None,
            })
            .collect()
    }
}

impl FromIterator<(FeatureId, LineString)> for RouteSet {
    fn from_iter<I: IntoIterator<Item = (FeatureId, LineString)>>(iter: I) -> Self {
        RouteSet {
            routes: iter.into_iter().collect(),
        }
    }
}

/// Parses the features carried by a draw create/update event. Anything that isn't a LineString
/// is skipped, since only lines can be snapped.
pub fn parse_draw_event(input: &str) -> Result<Vec<DrawnLine>, LoadError> {
    let mut lines = Vec::new();
    for (idx, feature) in event_features(input)?.into_iter().enumerate() {
        let id = feature
            .id
            .as_ref()
            .map(FeatureId::from)
            .ok_or(LoadError::MissingId { idx })?;
        let Some(geometry) = feature.geometry else {
            return Err(LoadError::MissingGeometry { idx });
        };
        if !matches!(geometry.value, Value::LineString(_)) {
            continue;
        }
        lines.push(DrawnLine {
            id,
            geometry: geometry.try_into()?,
        });
    }
    Ok(lines)
}

/// Parses just the ids out of a draw delete event.
pub fn parse_feature_ids(input: &str) -> Result<Vec<FeatureId>, LoadError> {
    event_features(input)?
        .iter()
        .enumerate()
        .map(|(idx, feature)| {
            feature
                .id
                .as_ref()
                .map(FeatureId::from)
                .ok_or(LoadError::MissingId { idx })
        })
        .collect()
}

fn event_features(input: &str) -> Result<Vec<Feature>, LoadError> {
    Ok(match input.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_draw_event() {
        let input = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": "a1b2",
                    "properties": {},
                    "geometry": {"type": "LineString", "coordinates": [[-122.27, 37.8], [-122.26, 37.81]]}
                },
                {
                    "type": "Feature",
                    "id": 7,
                    "properties": {},
                    "geometry": {"type": "Point", "coordinates": [-122.27, 37.8]}
                }
            ]
        }"#;
        let lines = parse_draw_event(input).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, FeatureId("a1b2".to_string()));
        assert_eq!(lines[0].geometry.0.len(), 2);

        let ids = parse_feature_ids(input).unwrap();
        assert_eq!(
            ids,
            vec![FeatureId("a1b2".to_string()), FeatureId("7".to_string())]
        );
    }

    #[test]
    fn test_parse_draw_event_needs_ids() {
        let input = r#"{"type": "Feature", "properties": {}, "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}}"#;
        assert!(matches!(
            parse_draw_event(input),
            Err(LoadError::MissingId { idx: 0 })
        ));
    }

    #[test]
    fn test_route_set_payload() {
        let routes: RouteSet = vec![(
            FeatureId("snapped-0".to_string()),
            LineString::from(vec![(-122.27, 37.8), (-122.26, 37.81)]),
        )]
        .into_iter()
        .collect();
        let fc = routes.to_feature_collection();
        assert_eq!(fc.features.len(), 1);
        let feature = &fc.features[0];
        assert_eq!(
            feature.id,
            Some(geojson::feature::Id::String("snapped-0".to_string()))
        );
        assert_eq!(feature.properties, Some(JsonObject::new()));
        assert_eq!(
            feature.geometry.as_ref().map(|g| &g.value),
            Some(&Value::LineString(vec![
                vec![-122.27, 37.8],
                vec![-122.26, 37.81]
            ]))
        );
    }
}
