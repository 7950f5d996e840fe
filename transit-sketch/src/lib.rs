use std::sync::Once;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde_json::json;
use wasm_bindgen::prelude::*;

use transit_sketch_model::{
    parse_draw_event, parse_feature_ids, parse_matching_response, style, AnalysisResult,
    BaselineAnalysis, NetworkShape, ServiceError, SketchConfig,
};

pub use surface::{DrawOp, DrawSurface, FeatureStore, MapSurface, SourceCache};
pub use view::{
    ActionButton, AnalysisRequest, BaselineRequest, MapView, Notice, Phase, SnapRequest, Ticket,
};

mod surface;
mod view;

static START: Once = Once::new();

/// The browser side of a map view. JavaScript forwards draw plugin events and HTTP responses in,
/// then replays the draw operations and source updates this hands back.
#[wasm_bindgen]
pub struct JsMapView {
    view: MapView<FeatureStore, SourceCache>,
}

#[wasm_bindgen]
impl JsMapView {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<JsMapView, JsValue> {
        START.call_once(|| {
            // The host page may have set up its own logger already
            let _ = console_log::init_with_level(log::Level::Info);
            // Panics shouldn't happen, but if they do, console.log them.
            console_error_panic_hook::set_once();
        });

        let config: SketchConfig = if config.is_undefined() || config.is_null() {
            SketchConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(err_to_js)?
        };
        Ok(JsMapView {
            view: MapView::new(config, FeatureStore::default(), SourceCache::default()),
        })
    }

    /// Updates configuration for requests issued from now on.
    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&mut self, input: JsValue) {
        match serde_wasm_bindgen::from_value(input) {
            Ok(config) => {
                self.view.set_config(config);
            }
            Err(err) => {
                log::warn!("Bad input to setConfig: {}", err);
            }
        }
    }

    /// Loads the baseline network. `seed` picks the line colors.
    #[wasm_bindgen(js_name = loadNetwork)]
    pub fn load_network(&mut self, raw_geojson: &str, seed: u32) -> Result<(), JsValue> {
        let mut rng = SmallRng::seed_from_u64(seed as u64);
        let network = NetworkShape::from_geojson(raw_geojson, &mut rng).map_err(err_to_js)?;
        self.view.load_network(&network);
        Ok(())
    }

    /// Takes the features of a `draw.create` event as GeoJSON. Returns a list of
    /// `{ticket, id, url}` requests to send to the matching service.
    #[wasm_bindgen(js_name = onDrawCreate)]
    pub fn on_draw_create(&mut self, raw_geojson: &str) -> Result<String, JsValue> {
        self.on_draw_change(raw_geojson)
    }

    /// Same as `onDrawCreate`, for `draw.update` events.
    #[wasm_bindgen(js_name = onDrawUpdate)]
    pub fn on_draw_update(&mut self, raw_geojson: &str) -> Result<String, JsValue> {
        self.on_draw_change(raw_geojson)
    }

    #[wasm_bindgen(js_name = onDrawDelete)]
    pub fn on_draw_delete(&mut self, raw_geojson: &str) -> Result<(), JsValue> {
        let ids = parse_feature_ids(raw_geojson).map_err(err_to_js)?;
        for id in &ids {
            self.view.draw_mut().forget(id);
        }
        self.view.on_draw_delete(&ids);
        Ok(())
    }

    // True if something has changed
    #[wasm_bindgen(js_name = onSnapResponse)]
    pub fn on_snap_response(&mut self, ticket: u32, body: &str) -> bool {
        self.view
            .on_snap_response(Ticket(ticket), parse_matching_response(body))
    }

    #[wasm_bindgen(js_name = onSnapError)]
    pub fn on_snap_error(&mut self, ticket: u32, message: String) -> bool {
        self.view
            .on_snap_response(Ticket(ticket), Err(ServiceError::Transport(message)))
    }

    /// Returns `{ticket, url, body}` to POST, or nothing if analysis can't run now.
    #[wasm_bindgen(js_name = runAnalysis)]
    pub fn run_analysis(&mut self) -> Result<Option<String>, JsValue> {
        let Some(req) = self.view.run_analysis() else {
            return Ok(None);
        };
        let obj = json!({
            "ticket": req.ticket.0,
            "url": req.url,
            "body": geojson::GeoJson::from(req.routes),
        });
        serde_json::to_string(&obj).map(Some).map_err(err_to_js)
    }

    #[wasm_bindgen(js_name = onAnalysisResponse)]
    pub fn on_analysis_response(&mut self, ticket: u32, body: &str) -> bool {
        self.view
            .on_analysis_response(Ticket(ticket), AnalysisResult::from_geojson(body))
    }

    #[wasm_bindgen(js_name = onAnalysisError)]
    pub fn on_analysis_error(&mut self, ticket: u32, message: String) -> bool {
        self.view
            .on_analysis_response(Ticket(ticket), Err(ServiceError::Transport(message)))
    }

    #[wasm_bindgen(js_name = clearResults)]
    pub fn clear_results(&mut self) -> bool {
        self.view.clear_results()
    }

    /// Returns `{ticket, url}` to GET, or nothing if the baseline was just hidden.
    #[wasm_bindgen(js_name = toggleBaseline)]
    pub fn toggle_baseline(&mut self) -> Option<String> {
        let req = self.view.toggle_baseline()?;
        Some(json!({"ticket": req.ticket.0, "url": req.url}).to_string())
    }

    #[wasm_bindgen(js_name = onBaselineResponse)]
    pub fn on_baseline_response(&mut self, ticket: u32, body: &str) -> bool {
        self.view
            .on_baseline_response(Ticket(ticket), BaselineAnalysis::from_geojson(body))
    }

    #[wasm_bindgen(js_name = onBaselineError)]
    pub fn on_baseline_error(&mut self, ticket: u32, message: String) -> bool {
        self.view
            .on_baseline_response(Ticket(ticket), Err(ServiceError::Transport(message)))
    }

    /// Draw plugin changes to replay, like `{op: "add", feature}` or `{op: "delete", id}`.
    #[wasm_bindgen(js_name = takeDrawOps)]
    pub fn take_draw_ops(&mut self) -> String {
        let ops: Vec<serde_json::Value> = self
            .view
            .draw_mut()
            .take_ops()
            .iter()
            .map(DrawOp::to_json)
            .collect();
        serde_json::Value::from(ops).to_string()
    }

    /// Sources to `setData` on, as `{source, data}`.
    #[wasm_bindgen(js_name = takeSourceUpdates)]
    pub fn take_source_updates(&mut self) -> String {
        let updates: Vec<serde_json::Value> = self
            .view
            .map_mut()
            .take_updates()
            .into_iter()
            .map(|(source, fc)| json!({"source": source.name(), "data": geojson::GeoJson::from(fc)}))
            .collect();
        serde_json::Value::from(updates).to_string()
    }

    /// `{label, kind, enabled}` for the one action button, or nothing to hide it.
    #[wasm_bindgen(js_name = actionButton)]
    pub fn action_button(&self) -> Option<String> {
        let button = self.view.action_button()?;
        let kind = match button {
            ActionButton::RunAnalysis { .. } => "run-analysis",
            ActionButton::ClearResults => "clear-results",
        };
        Some(
            json!({
                "label": button.label(),
                "kind": kind,
                "enabled": button.enabled(),
            })
            .to_string(),
        )
    }

    pub fn phase(&self) -> String {
        self.view.phase().as_str().to_string()
    }

    #[wasm_bindgen(js_name = isStale)]
    pub fn is_stale(&self) -> bool {
        self.view.is_stale()
    }

    pub fn notice(&self) -> Option<String> {
        self.view.notice().map(|notice| notice.to_string())
    }

    /// MapLibre layer definitions for every source.
    pub fn layers(&self) -> String {
        serde_json::Value::from(style::layers()).to_string()
    }

    pub fn legend(&self) -> Result<String, JsValue> {
        serde_json::to_string(&style::legend()).map_err(err_to_js)
    }

    /// Takes the draw plugin's default theme as a JSON array and returns it with the route
    /// styles patched in.
    #[wasm_bindgen(js_name = drawStyles)]
    pub fn draw_styles(&self, default_theme: &str) -> Result<String, JsValue> {
        let theme: Vec<serde_json::Value> =
            serde_json::from_str(default_theme).map_err(err_to_js)?;
        let patched = style::patch_draw_styles(&theme, &style::route_draw_styles());
        serde_json::to_string(&patched).map_err(err_to_js)
    }
}

impl JsMapView {
    fn on_draw_change(&mut self, raw_geojson: &str) -> Result<String, JsValue> {
        let lines = parse_draw_event(raw_geojson).map_err(err_to_js)?;
        for line in &lines {
            self.view.draw_mut().record(line.clone());
        }

        let mut requests = Vec::new();
        for req in self.view.on_draw_change(lines) {
            match req.url(self.view.config()) {
                Ok(url) => {
                    requests.push(json!({"ticket": req.ticket.0, "id": req.id.0, "url": url}));
                }
                // Nothing to send, so fail it right away
                Err(err) => {
                    self.view.on_snap_response(req.ticket, Err(err));
                }
            }
        }
        serde_json::to_string(&requests).map_err(err_to_js)
    }
}

fn err_to_js<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}
