//! Drives a map view from the command line, talking to the real services over blocking HTTP.

use std::time::Duration;

use geo::LineString;
use log::{debug, error};
use reqwest::blocking::{Client, Response};

use transit_sketch::{
    AnalysisRequest, BaselineRequest, DrawSurface, FeatureStore, MapSurface, MapView, Phase,
    SnapRequest,
};
use transit_sketch_model::{
    health_url, parse_matching_response, AnalysisResult, BaselineAnalysis, DrawnLine,
    ServiceError, SketchConfig,
};

pub trait MapMatcher {
    /// Returns candidate geometries, best first.
    fn match_line(
        &self,
        request: &SnapRequest,
        config: &SketchConfig,
    ) -> Result<Vec<LineString>, ServiceError>;
}

pub trait AnalysisBackend {
    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ServiceError>;
    fn baseline(&self, request: &BaselineRequest) -> Result<BaselineAnalysis, ServiceError>;
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<HttpClient, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(transport)?;
        Ok(HttpClient { client })
    }

    pub fn healthy(&self, config: &SketchConfig) -> Result<bool, ServiceError> {
        let url = health_url(config);
        let response = self.client.get(&url).send().map_err(transport)?;
        if !response.status().is_success() {
            return Ok(false);
        }
        Ok(response.text().map_err(transport)?.trim() == "healthy")
    }
}

impl MapMatcher for HttpClient {
    fn match_line(
        &self,
        request: &SnapRequest,
        config: &SketchConfig,
    ) -> Result<Vec<LineString>, ServiceError> {
        let url = request.url(config)?;
        debug!(
            "Matching {} points of {} ({:?})",
            request.points.len(),
            request.id,
            request.ticket
        );
        let response = self.client.get(&url).send().map_err(transport)?;
        parse_matching_response(&read_body(response)?)
    }
}

impl AnalysisBackend for HttpClient {
    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ServiceError> {
        let response = self
            .client
            .post(&request.url)
            .json(&request.routes)
            .send()
            .map_err(transport)?;
        AnalysisResult::from_geojson(&read_body(response)?)
    }

    fn baseline(&self, request: &BaselineRequest) -> Result<BaselineAnalysis, ServiceError> {
        let response = self.client.get(&request.url).send().map_err(transport)?;
        BaselineAnalysis::from_geojson(&read_body(response)?)
    }
}

fn read_body(response: Response) -> Result<String, ServiceError> {
    let status = response.status();
    let url = response.url().to_string();
    let text = response.text().map_err(transport)?;
    if status.is_success() {
        return Ok(text);
    }

    // Prefer the structured message both services put in error bodies
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| body.get("message")?.as_str().map(|x| x.to_string()))
        .unwrap_or(text);
    error!("{} returned {}: {}", redact(&url), status, message);
    Err(ServiceError::Status {
        code: status.as_u16(),
        message,
    })
}

fn transport(err: reqwest::Error) -> ServiceError {
    ServiceError::Transport(err.without_url().to_string())
}

// Don't leak the access token into logs
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Records the drawn lines and snaps each one in turn.
pub fn replay_drawing<M: MapSurface>(
    view: &mut MapView<FeatureStore, M>,
    lines: Vec<DrawnLine>,
    matcher: &impl MapMatcher,
) {
    for line in &lines {
        view.draw_mut().record(line.clone());
    }
    for request in view.on_draw_change(lines) {
        let result = matcher.match_line(&request, view.config());
        view.on_snap_response(request.ticket, result);
    }
}

/// Returns true if fresh results are now on the map.
pub fn run_analysis<D: DrawSurface, M: MapSurface>(
    view: &mut MapView<D, M>,
    backend: &impl AnalysisBackend,
) -> bool {
    let Some(request) = view.run_analysis() else {
        return false;
    };
    let result = backend.analyze(&request);
    view.on_analysis_response(request.ticket, result);
    view.phase() == Phase::Fresh
}

/// Returns true if the baseline is now held, fetching it if needed.
pub fn fetch_baseline<D: DrawSurface, M: MapSurface>(
    view: &mut MapView<D, M>,
    backend: &impl AnalysisBackend,
) -> bool {
    if view.baseline().is_some() {
        return true;
    }
    let Some(request) = view.toggle_baseline() else {
        return false;
    };
    let result = backend.baseline(&request);
    view.on_baseline_response(request.ticket, result);
    view.baseline().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use transit_sketch::SourceCache;
    use transit_sketch_model::{FeatureId, SourceId};

    // Snaps by nudging every point, or refuses lines that start at the origin
    struct FakeMatcher;

    impl MapMatcher for FakeMatcher {
        fn match_line(
            &self,
            request: &SnapRequest,
            config: &SketchConfig,
        ) -> Result<Vec<LineString>, ServiceError> {
            request.url(config)?;
            if request.points[0].x == 0.0 {
                return Err(ServiceError::NoMatch("NoMatch: off the map".to_string()));
            }
            Ok(vec![request
                .points
                .iter()
                .map(|pt| (pt.x + 0.0001, pt.y))
                .collect()])
        }
    }

    struct FakeBackend {
        fail: bool,
    }

    impl AnalysisBackend for FakeBackend {
        fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ServiceError> {
            if self.fail {
                return Err(ServiceError::Status {
                    code: 500,
                    message: "boom".to_string(),
                });
            }
            // One changed node per route
            let features: Vec<serde_json::Value> = request
                .routes
                .features
                .iter()
                .map(|_| {
                    json!({
                        "type": "Feature",
                        "geometry": {"type": "Point", "coordinates": [-122.27, 37.8]},
                        "properties": {"percent_change": 0.3}
                    })
                })
                .collect();
            AnalysisResult::from_geojson(
                &json!({"type": "FeatureCollection", "features": features}).to_string(),
            )
        }

        fn baseline(&self, _: &BaselineRequest) -> Result<BaselineAnalysis, ServiceError> {
            let body = json!({
                "centrality": {
                    "type": "FeatureCollection",
                    "features": [
                        {
                            "type": "Feature",
                            "geometry": {"type": "Point", "coordinates": [-122.27, 37.8]},
                            "properties": {"centrality": 0.1, "type": "strong"}
                        }
                    ]
                }
            });
            BaselineAnalysis::from_geojson(&body.to_string())
        }
    }

    fn new_view() -> MapView<FeatureStore, SourceCache> {
        let config = SketchConfig {
            service_credential: "pk.test".to_string(),
            ..Default::default()
        };
        MapView::new(config, FeatureStore::default(), SourceCache::default())
    }

    fn drawn(id: &str, pts: Vec<(f64, f64)>) -> DrawnLine {
        DrawnLine {
            id: FeatureId(id.to_string()),
            geometry: LineString::from(pts),
        }
    }

    #[test]
    fn test_replay_and_analyze() {
        let mut view = new_view();
        replay_drawing(
            &mut view,
            vec![
                drawn("a", vec![(-122.27, 37.8), (-122.26, 37.81)]),
                drawn("b", vec![(-122.25, 37.8), (-122.24, 37.79)]),
            ],
            &FakeMatcher,
        );
        assert_eq!(view.routes().len(), 2);
        assert_eq!(view.phase(), Phase::Stale);

        assert!(run_analysis(&mut view, &FakeBackend { fail: false }));
        assert_eq!(
            view.map()
                .get(SourceId::AnalysisResults)
                .unwrap()
                .features
                .len(),
            2
        );
        // Nothing to do until the routes change
        assert!(!run_analysis(&mut view, &FakeBackend { fail: false }));
    }

    #[test]
    fn test_replay_keeps_unmatched_drawings() {
        let mut view = new_view();
        replay_drawing(
            &mut view,
            vec![
                drawn("off", vec![(0.0, 0.0), (0.1, 0.1)]),
                drawn("on", vec![(-122.27, 37.8), (-122.26, 37.81)]),
            ],
            &FakeMatcher,
        );
        // The unmatched raw drawing is still on the surface, and counts once routes refresh
        assert!(view.routes().contains(&FeatureId("off".to_string())));
        assert!(view.routes().contains(&FeatureId("snapped-0".to_string())));
        assert!(!view.routes().contains(&FeatureId("on".to_string())));
    }

    #[test]
    fn test_replay_without_credential() {
        let mut view = MapView::new(
            SketchConfig::default(),
            FeatureStore::default(),
            SourceCache::default(),
        );
        replay_drawing(
            &mut view,
            vec![drawn("a", vec![(-122.27, 37.8), (-122.26, 37.81)])],
            &FakeMatcher,
        );
        assert!(view.routes().is_empty());
        assert_eq!(view.phase(), Phase::Empty);
        assert!(view.notice().is_some());
    }

    #[test]
    fn test_failed_analysis() {
        let mut view = new_view();
        replay_drawing(
            &mut view,
            vec![drawn("a", vec![(-122.27, 37.8), (-122.26, 37.81)])],
            &FakeMatcher,
        );
        assert!(!run_analysis(&mut view, &FakeBackend { fail: true }));
        assert_eq!(view.phase(), Phase::Stale);
        assert!(view.notice().unwrap().to_string().contains("boom"));
    }

    #[test]
    fn test_fetch_baseline() {
        let mut view = new_view();
        let backend = FakeBackend { fail: false };
        assert!(fetch_baseline(&mut view, &backend));
        // Already held, so this doesn't toggle it off
        assert!(fetch_baseline(&mut view, &backend));
        assert_eq!(view.baseline().unwrap().len(), 1);
    }

    #[test]
    fn test_redact() {
        assert_eq!(
            redact("https://api.mapbox.com/matching/v5/mapbox/driving/1,2;3,4?access_token=pk.secret"),
            "https://api.mapbox.com/matching/v5/mapbox/driving/1,2;3,4"
        );
        assert_eq!(redact("http://127.0.0.1:5000/analyze"), "http://127.0.0.1:5000/analyze");
    }
}
