use std::collections::BTreeMap;
use std::fmt;

use geo::{Coord, LineString};
use geojson::FeatureCollection;
use log::{debug, info, warn};

use transit_sketch_model::{
    analyze_url, baseline_url, empty_feature_collection, matching_url, AnalysisResult,
    BaselineAnalysis, DrawnLine, FeatureId, NetworkShape, RouteSet, ServiceError, SketchConfig,
    SourceId,
};

use crate::surface::{DrawSurface, MapSurface};

/// Identifies one outstanding request, so late or superseded responses can be recognized.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Ticket(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    /// No routes added
    Empty,
    /// Waiting on the matching service
    Drawing,
    /// Routes present, nothing on screen matches them
    Stale,
    /// Waiting on the analysis service
    Querying,
    /// The analysis on screen matches the current routes
    Fresh,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Empty => "empty",
            Phase::Drawing => "drawing",
            Phase::Stale => "stale",
            Phase::Querying => "querying",
            Phase::Fresh => "fresh",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActionButton {
    /// `ready` is false while routes are still being snapped or an analysis is in flight.
    RunAnalysis { pending: bool, ready: bool },
    ClearResults,
}

impl ActionButton {
    pub fn label(self) -> &'static str {
        match self {
            ActionButton::RunAnalysis { pending: false, .. } => "Run network analysis",
            ActionButton::RunAnalysis { pending: true, .. } => "Running analysis...",
            ActionButton::ClearResults => "Clear results",
        }
    }

    pub fn enabled(self) -> bool {
        match self {
            ActionButton::RunAnalysis { ready, .. } => ready,
            ActionButton::ClearResults => true,
        }
    }
}

/// The last thing that went wrong, for showing to the user.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    SnapFailed { id: FeatureId, error: ServiceError },
    AnalysisFailed(ServiceError),
    BaselineFailed(ServiceError),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SnapFailed { error, .. } => {
                write!(f, "Couldn't snap the drawn line to streets: {}", error)
            }
            Notice::AnalysisFailed(error) => write!(f, "Network analysis failed: {}", error),
            Notice::BaselineFailed(error) => {
                write!(f, "Couldn't load the baseline analysis: {}", error)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapRequest {
    pub ticket: Ticket,
    /// The raw drawing to replace
    pub id: FeatureId,
    pub points: Vec<Coord>,
}

impl SnapRequest {
    pub fn url(&self, config: &SketchConfig) -> Result<String, ServiceError> {
        matching_url(config, &self.points)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisRequest {
    pub ticket: Ticket,
    pub url: String,
    pub routes: FeatureCollection,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BaselineRequest {
    pub ticket: Ticket,
    pub url: String,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum AnalysisState {
    Idle,
    Querying {
        ticket: Ticket,
        routes_version: u64,
    },
    Fresh,
}

#[derive(Clone, Debug, PartialEq)]
enum BaselineState {
    Absent,
    Fetching(Ticket),
    Held(BaselineAnalysis),
}

/// Tracks the routes a user sketches and the analysis of them. Nothing here performs IO: events
/// produce requests, and the host reports back with the responses.
pub struct MapView<D, M> {
    config: SketchConfig,
    draw: D,
    map: M,

    routes: RouteSet,
    // Bumped whenever routes change, so analysis of an older set is never shown as current
    routes_version: u64,
    next_ticket: u32,
    // The latest snap request for each raw drawing
    pending_snaps: BTreeMap<FeatureId, Ticket>,
    analysis: AnalysisState,
    baseline: BaselineState,
    notice: Option<Notice>,
}

impl<D: DrawSurface, M: MapSurface> MapView<D, M> {
    pub fn new(config: SketchConfig, draw: D, mut map: M) -> MapView<D, M> {
        map.set_source_data(SourceId::AnalysisResults, empty_feature_collection());
        map.set_source_data(SourceId::Baseline, empty_feature_collection());
        let routes = draw.get_all();
        MapView {
            config,
            draw,
            map,
            routes,
            routes_version: 0,
            next_ticket: 0,
            pending_snaps: BTreeMap::new(),
            analysis: AnalysisState::Idle,
            baseline: BaselineState::Absent,
            notice: None,
        }
    }

    pub fn config(&self) -> &SketchConfig {
        &self.config
    }

    /// Only affects requests issued from now on.
    pub fn set_config(&mut self, config: SketchConfig) {
        self.config = config;
    }

    pub fn draw(&self) -> &D {
        &self.draw
    }

    pub fn draw_mut(&mut self) -> &mut D {
        &mut self.draw
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn baseline(&self) -> Option<&BaselineAnalysis> {
        match self.baseline {
            BaselineState::Held(ref baseline) => Some(baseline),
            _ => None,
        }
    }

    pub fn load_network(&mut self, network: &NetworkShape) {
        self.map
            .set_source_data(SourceId::Network, network.to_feature_collection());
    }

    pub fn phase(&self) -> Phase {
        if !self.pending_snaps.is_empty() {
            return Phase::Drawing;
        }
        match self.analysis {
            AnalysisState::Querying { .. } => Phase::Querying,
            _ if self.routes.is_empty() => Phase::Empty,
            AnalysisState::Fresh => Phase::Fresh,
            AnalysisState::Idle => Phase::Stale,
        }
    }

    /// True when routes exist but the analysis on screen (if any) doesn't describe them.
    pub fn is_stale(&self) -> bool {
        !self.routes.is_empty() && self.analysis != AnalysisState::Fresh
    }

    /// None when there are no routes to analyze.
    pub fn action_button(&self) -> Option<ActionButton> {
        if self.routes.is_empty() {
            return None;
        }
        let ready = self.phase() == Phase::Stale;
        Some(match self.analysis {
            AnalysisState::Fresh => ActionButton::ClearResults,
            AnalysisState::Querying { .. } => ActionButton::RunAnalysis {
                pending: true,
                ready,
            },
            AnalysisState::Idle => ActionButton::RunAnalysis {
                pending: false,
                ready,
            },
        })
    }

    /// The user created or edited lines. Each one with at least two points needs snapping; a
    /// newer request for the same line supersedes older ones.
    pub fn on_draw_change(&mut self, lines: Vec<DrawnLine>) -> Vec<SnapRequest> {
        let mut requests = Vec::new();
        for line in lines {
            if line.geometry.0.len() < 2 {
                warn!("Not snapping {}, it only has {} points", line.id, line.geometry.0.len());
                continue;
            }
            let ticket = self.ticket();
            debug!("Snapping {} with {:?}", line.id, ticket);
            self.pending_snaps.insert(line.id.clone(), ticket);
            requests.push(SnapRequest {
                ticket,
                id: line.id,
                points: line.geometry.0,
            });
        }
        requests
    }

    /// Handles the matching service's answer. The first candidate replaces the raw drawing.
    /// Returns true if anything changed.
    pub fn on_snap_response(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<LineString>, ServiceError>,
    ) -> bool {
        let Some(id) = self
            .pending_snaps
            .iter()
            .find(|(_, t)| **t == ticket)
            .map(|(id, _)| id.clone())
        else {
            warn!("Ignoring snap response for superseded {:?}", ticket);
            return false;
        };
        self.pending_snaps.remove(&id);

        let matched = result.and_then(|matchings| {
            matchings
                .into_iter()
                .next()
                .ok_or_else(|| ServiceError::NoMatch("no matchings returned".to_string()))
        });
        match matched {
            Ok(geometry) => {
                if !self.draw.get_all().contains(&id) {
                    warn!("{} disappeared while snapping it, dropping the match", id);
                    return false;
                }
                let new_id = self.draw.add(geometry);
                self.draw.delete(&id);
                debug!("Replaced {} with snapped {}", id, new_id);
                self.notice = None;
                self.refresh_routes();
            }
            Err(error) => {
                warn!("Snapping {} failed: {}", id, error);
                self.notice = Some(Notice::SnapFailed { id, error });
            }
        }
        true
    }

    /// The user deleted features from the draw surface.
    pub fn on_draw_delete(&mut self, ids: &[FeatureId]) {
        for id in ids {
            self.pending_snaps.remove(id);
        }
        self.refresh_routes();
    }

    /// Only possible while stale; otherwise returns None. Clears any baseline on screen.
    pub fn run_analysis(&mut self) -> Option<AnalysisRequest> {
        if self.phase() != Phase::Stale {
            debug!("Can't run analysis while {}", self.phase().as_str());
            return None;
        }
        self.drop_baseline();

        let ticket = self.ticket();
        self.analysis = AnalysisState::Querying {
            ticket,
            routes_version: self.routes_version,
        };
        info!(
            "Running analysis of {} routes with {:?}",
            self.routes.len(),
            ticket
        );
        Some(AnalysisRequest {
            ticket,
            url: analyze_url(&self.config),
            routes: self.routes.to_feature_collection(),
        })
    }

    pub fn on_analysis_response(
        &mut self,
        ticket: Ticket,
        result: Result<AnalysisResult, ServiceError>,
    ) -> bool {
        let routes_version = match self.analysis {
            AnalysisState::Querying {
                ticket: expected,
                routes_version,
            } if expected == ticket => routes_version,
            _ => {
                warn!("Ignoring analysis response for {:?}", ticket);
                return false;
            }
        };
        self.analysis = AnalysisState::Idle;

        match result {
            Ok(result) => {
                if routes_version != self.routes_version {
                    warn!("Routes changed while analyzing them, dropping the result");
                    return true;
                }
                info!("Analysis found {} changed nodes", result.nodes.len());
                self.map
                    .set_source_data(SourceId::AnalysisResults, result.into_feature_collection());
                self.analysis = AnalysisState::Fresh;
                self.notice = None;
            }
            Err(error) => {
                warn!("Analysis failed: {}", error);
                self.notice = Some(Notice::AnalysisFailed(error));
            }
        }
        true
    }

    /// Only possible while results are shown. Returns true if they were cleared.
    pub fn clear_results(&mut self) -> bool {
        if self.analysis != AnalysisState::Fresh {
            return false;
        }
        self.analysis = AnalysisState::Idle;
        self.map
            .set_source_data(SourceId::AnalysisResults, empty_feature_collection());
        true
    }

    /// Hides the baseline if it's held, otherwise asks for it. Returns a request only when a
    /// fetch should start.
    pub fn toggle_baseline(&mut self) -> Option<BaselineRequest> {
        match self.baseline {
            BaselineState::Held(_) => {
                self.drop_baseline();
                None
            }
            BaselineState::Fetching(ticket) => {
                debug!("Baseline already requested with {:?}", ticket);
                None
            }
            BaselineState::Absent => {
                let ticket = self.ticket();
                self.baseline = BaselineState::Fetching(ticket);
                Some(BaselineRequest {
                    ticket,
                    url: baseline_url(&self.config),
                })
            }
        }
    }

    pub fn on_baseline_response(
        &mut self,
        ticket: Ticket,
        result: Result<BaselineAnalysis, ServiceError>,
    ) -> bool {
        if self.baseline != BaselineState::Fetching(ticket) {
            warn!("Ignoring baseline response for {:?}", ticket);
            return false;
        }

        match result {
            Ok(baseline) => {
                info!("Showing baseline with {} nodes", baseline.len());
                self.map
                    .set_source_data(SourceId::Baseline, baseline.feature_collection().clone());
                self.baseline = BaselineState::Held(baseline);
                self.notice = None;
            }
            Err(error) => {
                warn!("Baseline fetch failed: {}", error);
                self.baseline = BaselineState::Absent;
                self.notice = Some(Notice::BaselineFailed(error));
            }
        }
        true
    }

    fn ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    // The draw surface is authoritative. Any analysis on screen no longer applies.
    fn refresh_routes(&mut self) {
        self.routes = self.draw.get_all();
        self.routes_version += 1;
        if self.analysis == AnalysisState::Fresh {
            self.analysis = AnalysisState::Idle;
        }
        self.map
            .set_source_data(SourceId::AnalysisResults, empty_feature_collection());
        debug!(
            "Now {} routes, version {}",
            self.routes.len(),
            self.routes_version
        );
    }

    fn drop_baseline(&mut self) {
        if self.baseline != BaselineState::Absent {
            self.baseline = BaselineState::Absent;
            self.map
                .set_source_data(SourceId::Baseline, empty_feature_collection());
        }
    }
}
