//! MapLibre layer definitions and the matching legend. The legend is derived from the same stops
//! as the layer paint, so they can't disagree.

use serde::Serialize;
use serde_json::{json, Value};

use crate::SourceId;

/// Colors by `percent_change`; each color holds from its stop up to the next one.
pub const CHANGE_COLOR_STOPS: [(f64, &str); 11] = [
    (-1.0, "#ff0000"),
    (-0.8, "#ff0000"),
    (-0.6, "#ff0000"),
    (-0.4, "#ff0000"),
    (-0.2, "#ff0000"),
    (0.0, "#cccccc"),
    (0.2, "#00ff04"),
    (0.4, "#00ff04"),
    (0.6, "#00ff04"),
    (0.8, "#00ff04"),
    (1.0, "#00ff04"),
];

/// Circle radius by `percent_change`, interpolated between stops.
pub const CHANGE_RADIUS_STOPS: [(f64, f64); 11] = [
    (-1.0, 32.0),
    (-0.8, 16.0),
    (-0.6, 8.0),
    (-0.4, 4.0),
    (-0.2, 2.0),
    (0.0, 1.0),
    (0.2, 2.0),
    (0.4, 4.0),
    (0.6, 8.0),
    (0.8, 16.0),
    (1.0, 32.0),
];

pub const WEAK_COLOR: &str = "#ff9900";
pub const STRONG_COLOR: &str = "#3399ff";
const CENTRALITY_RADIUS_STOPS: [(f64, f64); 2] = [(0.0, 2.0), (0.5, 16.0)];

pub const DRAWN_ROUTE_COLOR: &str = "#FF0000";

pub fn color_for_change(percent_change: f64) -> &'static str {
    let mut color = CHANGE_COLOR_STOPS[0].1;
    for (stop, c) in CHANGE_COLOR_STOPS {
        if percent_change >= stop {
            color = c;
        }
    }
    color
}

pub fn radius_for_change(percent_change: f64) -> f64 {
    interpolate(&CHANGE_RADIUS_STOPS, percent_change)
}

// Linear between stops, clamped at both ends
fn interpolate(stops: &[(f64, f64)], x: f64) -> f64 {
    let (first, last) = (stops[0], stops[stops.len() - 1]);
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    for pair in stops.windows(2) {
        let ((x1, y1), (x2, y2)) = (pair[0], pair[1]);
        if x <= x2 {
            return y1 + (y2 - y1) * (x - x1) / (x2 - x1);
        }
    }
    last.1
}

/// Every layer the map needs, bottom to top.
pub fn layers() -> Vec<Value> {
    vec![network_layer(), baseline_layer(), analysis_layer()]
}

pub fn network_layer() -> Value {
    json!({
        "id": SourceId::Network.name(),
        "type": "line",
        "source": SourceId::Network.name(),
        "layout": {
            "line-join": "round",
            "line-cap": "round"
        },
        "paint": {
            "line-color": {
                "property": "color",
                "type": "identity"
            },
            "line-width": 1
        }
    })
}

pub fn analysis_layer() -> Value {
    json!({
        "id": SourceId::AnalysisResults.name(),
        "type": "circle",
        "source": SourceId::AnalysisResults.name(),
        "paint": {
            "circle-color": {
                "property": "percent_change",
                "type": "interval",
                "stops": CHANGE_COLOR_STOPS.iter().map(|(x, c)| json!([x, c])).collect::<Vec<_>>()
            },
            "circle-radius": {
                "property": "percent_change",
                "type": "exponential",
                "stops": CHANGE_RADIUS_STOPS.iter().map(|(x, r)| json!([x, r])).collect::<Vec<_>>()
            },
            "circle-opacity": 0.8
        }
    })
}

pub fn baseline_layer() -> Value {
    json!({
        "id": SourceId::Baseline.name(),
        "type": "circle",
        "source": SourceId::Baseline.name(),
        "paint": {
            "circle-color": {
                "property": "type",
                "type": "categorical",
                "stops": [["weak", WEAK_COLOR], ["strong", STRONG_COLOR]]
            },
            "circle-radius": {
                "property": "centrality",
                "type": "exponential",
                "stops": CENTRALITY_RADIUS_STOPS.iter().map(|(x, r)| json!([x, r])).collect::<Vec<_>>()
            },
            "circle-opacity": 0.6
        }
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: &'static str,
    pub radius: f64,
}

/// One entry per analysis stop, from the biggest loss to the biggest gain.
pub fn legend() -> Vec<LegendEntry> {
    CHANGE_COLOR_STOPS
        .iter()
        .map(|&(x, color)| LegendEntry {
            label: format!("{:+.0}%", x * 100.0),
            color,
            radius: radius_for_change(x),
        })
        .collect()
}

/// Overrides for the draw plugin's default line styles, so drawn routes stand out.
pub fn route_draw_styles() -> Vec<Value> {
    let line = |id: &str, filter: Value| {
        json!({
            "id": id,
            "type": "line",
            "filter": filter,
            "layout": {
                "line-cap": "round",
                "line-join": "round"
            },
            "paint": {
                "line-color": DRAWN_ROUTE_COLOR,
                "line-width": 5
            }
        })
    };
    vec![
        line(
            "gl-draw-line-inactive",
            json!([
                "all",
                ["==", "active", "false"],
                ["==", "$type", "LineString"],
                ["!=", "mode", "static"]
            ]),
        ),
        line(
            "gl-draw-line-static",
            json!(["all", ["==", "$type", "LineString"], ["==", "mode", "static"]]),
        ),
    ]
}

/// Replaces styles in `theme` that share an `id` with one of `overrides`, keeping their position.
/// Overrides with no counterpart are appended.
pub fn patch_draw_styles(theme: &[Value], overrides: &[Value]) -> Vec<Value> {
    let mut result = theme.to_vec();
    for style in overrides {
        match result
            .iter()
            .position(|existing| existing.get("id").is_some() && existing.get("id") == style.get("id"))
        {
            Some(idx) => result[idx] = style.clone(),
            None => result.push(style.clone()),
        }
    }
    result
}
