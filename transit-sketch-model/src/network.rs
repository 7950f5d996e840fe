use geo::{Coord, Geometry, MapCoordsInPlace};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value};
use log::info;
use rand::Rng;

use crate::LoadError;

// Coordinates are kept to 4 decimal places, about 11m at the equator. That's plenty for drawing
// the baseline network and keeps the payload small.
const COORDINATE_PRECISION: f64 = 10_000.0;

pub fn round_coordinate(value: f64) -> f64 {
    (value * COORDINATE_PRECISION).round() / COORDINATE_PRECISION
}

pub fn round_geometry(geometry: &mut Geometry) {
    geometry.map_coords_in_place(|Coord { x, y }| Coord {
        x: round_coordinate(x),
        y: round_coordinate(y),
    });
}

/// A random display color, like "#3FA0C2".
pub fn random_color<R: Rng>(rng: &mut R) -> String {
    format!("#{:06X}", rng.gen_range(0..=0x00FF_FFFFu32))
}

/// One line of the baseline transportation network, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkLine {
    pub id: Option<geojson::feature::Id>,
    pub geometry: Geometry,
    pub color: String,
    /// Everything from the input feature, plus `color`
    pub properties: JsonObject,
}

/// The baseline network. It's fixed once loaded; user edits live elsewhere.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkShape {
    lines: Vec<NetworkLine>,
}

impl NetworkShape {
    /// Parses GeoJSON with LineString or MultiLineString features, rounding every coordinate and
    /// assigning each line a random color.
    pub fn from_geojson<R: Rng>(input: &str, rng: &mut R) -> Result<NetworkShape, LoadError> {
        let features = match input.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(geometry) => vec![Feature::from(geometry)],
        };

        let mut lines = Vec::with_capacity(features.len());
        for (idx, feature) in features.into_iter().enumerate() {
            let geometry = feature
                .geometry
                .ok_or(LoadError::MissingGeometry { idx })?;
            match geometry.value {
                Value::LineString(_) | Value::MultiLineString(_) => {}
                ref other => {
                    return Err(LoadError::NotALine {
                        idx,
                        kind: value_kind(other),
                    });
                }
            }
            let mut geometry: Geometry = geometry.try_into()?;
            round_geometry(&mut geometry);

            let color = random_color(rng);
            let mut properties = feature.properties.unwrap_or_default();
            properties.insert("color".to_string(), color.clone().into());

            lines.push(NetworkLine {
                id: feature.id,
                geometry,
                color,
                properties,
            });
        }

        info!("Loaded a network with {} lines", lines.len());
        Ok(NetworkShape { lines })
    }

    pub fn lines(&self) -> &[NetworkLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        self.lines
            .iter()
            .map(|line| Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(Value::from(&line.geometry))),
                id: line.id.clone(),
                properties: Some(line.properties.clone()),
                foreign_members: None,
            })
            .collect()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const NETWORK: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "route_51A",
                "properties": {"name": "51A"},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-122.271234567, 37.804567891], [-122.26, 37.81]]
                }
            },
            {
                "type": "Feature",
                "properties": null,
                "geometry": {
                    "type": "MultiLineString",
                    "coordinates": [[[-122.30001, 37.8], [-122.29, 37.79999]]]
                }
            }
        ]
    }"#;

    #[test]
    fn test_rounding_is_idempotent() {
        for value in [-122.271234567, 37.80456, 0.00005, -0.00005, 179.99999, 1e-9] {
            let once = round_coordinate(value);
            assert_eq!(round_coordinate(once), once);
        }
        assert_eq!(round_coordinate(-122.271234567), -122.2712);
        assert_eq!(round_coordinate(37.804567891), 37.8046);
    }

    #[test]
    fn test_load_rounds_and_colors() {
        let mut rng = SmallRng::seed_from_u64(42);
        let network = NetworkShape::from_geojson(NETWORK, &mut rng).unwrap();
        assert_eq!(network.len(), 2);

        let first = &network.lines()[0];
        assert_eq!(
            first.geometry,
            Geometry::LineString(LineString::from(vec![
                (-122.2712, 37.8046),
                (-122.26, 37.81)
            ]))
        );
        assert_eq!(first.properties["name"], "51A");
        assert_eq!(first.properties["color"], first.color.as_str());

        for line in network.lines() {
            assert_eq!(line.color.len(), 7);
            assert!(line.color.starts_with('#'));
            assert!(line.color[1..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }

        // Same seed, same colors
        let again = NetworkShape::from_geojson(NETWORK, &mut SmallRng::seed_from_u64(42)).unwrap();
        assert_eq!(network, again);
    }

    #[test]
    fn test_feature_collection_keeps_ids_and_properties() {
        let mut rng = SmallRng::seed_from_u64(7);
        let network = NetworkShape::from_geojson(NETWORK, &mut rng).unwrap();
        let fc = network.to_feature_collection();
        assert_eq!(fc.features.len(), 2);
        assert_eq!(
            fc.features[0].id,
            Some(geojson::feature::Id::String("route_51A".to_string()))
        );
        assert!(fc.features[1].property("color").is_some());
    }

    #[test]
    fn test_rejects_points() {
        let input = r#"{"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}"#;
        let mut rng = SmallRng::seed_from_u64(0);
        match NetworkShape::from_geojson(input, &mut rng) {
            Err(LoadError::NotALine { idx: 0, kind }) => assert_eq!(kind, "Point"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
