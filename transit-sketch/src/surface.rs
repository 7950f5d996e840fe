use std::collections::{BTreeMap, BTreeSet};

use geo::LineString;
use geojson::FeatureCollection;
use serde_json::json;

use transit_sketch_model::{empty_feature_collection, DrawnLine, FeatureId, RouteSet, SourceId};

/// Something the user draws lines on. It owns the set of drawn features; the map view only asks
/// for changes and reads the result back.
pub trait DrawSurface {
    /// Adds a line, returning the id the surface assigned to it.
    fn add(&mut self, geometry: LineString) -> FeatureId;
    /// Deleting something that doesn't exist does nothing.
    fn delete(&mut self, id: &FeatureId);
    fn get_all(&self) -> RouteSet;
}

/// Something that renders named GeoJSON sources.
pub trait MapSurface {
    fn set_source_data(&mut self, source: SourceId, data: FeatureCollection);
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Add { id: FeatureId, geometry: LineString },
    Delete { id: FeatureId },
}

impl DrawOp {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DrawOp::Add { id, geometry } => json!({
                "op": "add",
                "feature": {
                    "type": "Feature",
                    "id": id.0,
                    "properties": {},
                    "geometry": geojson::Geometry::new(geojson::Value::from(geometry)),
                }
            }),
            DrawOp::Delete { id } => json!({
                "op": "delete",
                "id": id.0,
            }),
        }
    }
}

/// Mirrors the features of a draw plugin living elsewhere (in the browser, usually). Changes the
/// user makes there are recorded here as they're reported; changes made from this side are
/// journaled as `DrawOp`s for the host to replay.
#[derive(Default)]
pub struct FeatureStore {
    features: BTreeMap<FeatureId, LineString>,
    next_id: usize,
    ops: Vec<DrawOp>,
}

impl FeatureStore {
    /// The user created or edited this line.
    pub fn record(&mut self, line: DrawnLine) {
        self.features.insert(line.id, line.geometry);
    }

    /// The user deleted this feature.
    pub fn forget(&mut self, id: &FeatureId) {
        self.features.remove(id);
    }

    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }
}

impl DrawSurface for FeatureStore {
    fn add(&mut self, geometry: LineString) -> FeatureId {
        let id = FeatureId(format!("snapped-{}", self.next_id));
        self.next_id += 1;
        self.features.insert(id.clone(), geometry.clone());
        self.ops.push(DrawOp::Add {
            id: id.clone(),
            geometry,
        });
        id
    }

    fn delete(&mut self, id: &FeatureId) {
        if self.features.remove(id).is_some() {
            self.ops.push(DrawOp::Delete { id: id.clone() });
        }
    }

    fn get_all(&self) -> RouteSet {
        self.features
            .iter()
            .map(|(id, geometry)| (id.clone(), geometry.clone()))
            .collect()
    }
}

/// Holds the latest data for every source, and remembers which ones the host hasn't picked up yet.
#[derive(Default)]
pub struct SourceCache {
    data: BTreeMap<SourceId, FeatureCollection>,
    dirty: BTreeSet<SourceId>,
}

impl SourceCache {
    pub fn get(&self, source: SourceId) -> Option<&FeatureCollection> {
        self.data.get(&source)
    }

    /// True if the source was never set or currently holds nothing
    pub fn is_empty(&self, source: SourceId) -> bool {
        self.data
            .get(&source)
            .map(|fc| fc.features.is_empty())
            .unwrap_or(true)
    }

    /// Returns every source that changed since the last call.
    pub fn take_updates(&mut self) -> Vec<(SourceId, FeatureCollection)> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .map(|source| {
                let fc = self
                    .data
                    .get(&source)
                    .cloned()
                    .unwrap_or_else(empty_feature_collection);
                (source, fc)
            })
            .collect()
    }
}

impl MapSurface for SourceCache {
    fn set_source_data(&mut self, source: SourceId, data: FeatureCollection) {
        self.data.insert(source, data);
        self.dirty.insert(source);
    }
}
