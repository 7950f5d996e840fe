use std::fs;

use anyhow::{bail, Context, Result};
use clap::Parser;
use geojson::{FeatureCollection, GeoJson};
use log::{info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use transit_sketch::{FeatureStore, MapView, SourceCache};
use transit_sketch_cli::{fetch_baseline, replay_drawing, run_analysis, HttpClient};
use transit_sketch_model::{
    empty_feature_collection, parse_draw_event, NetworkShape, SketchConfig, SourceId,
};

#[derive(Parser)]
struct Args {
    /// Path to a GeoJSON file with hand-drawn LineStrings to snap and analyze. Every feature
    /// needs an id.
    #[arg(long)]
    drawn: String,

    /// Where to write the analysis result
    #[arg(long, default_value = "analysis.geojson")]
    output: String,

    /// Where to write the snapped routes that were sent for analysis
    #[arg(long)]
    routes_output: Option<String>,

    /// Path to the baseline network. It's written back out with rounded coordinates and a color
    /// per line.
    #[arg(long)]
    network: Option<String>,

    #[arg(long, default_value = "network.geojson")]
    network_output: String,

    /// Seed for the network line colors
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Also fetch the baseline centrality and write it here
    #[arg(long)]
    baseline_output: Option<String>,

    /// JSON file with service settings, like {"serviceCredential": "pk..."}
    #[arg(long)]
    config: Option<String>,

    /// Access token for the map-matching service. Overrides the config file.
    #[arg(long)]
    credential: Option<String>,

    /// Base URL of the analysis service. Overrides the config file.
    #[arg(long)]
    analysis_url: Option<String>,

    /// Map-matching travel profile. Overrides the config file.
    #[arg(long)]
    profile: Option<String>,

    /// Make sure the analysis service is up before doing anything
    #[clap(long)]
    check_health: bool,
}

impl Args {
    fn sketch_config(&self) -> Result<SketchConfig> {
        let mut config = match self.config {
            Some(ref path) => {
                let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?
            }
            None => SketchConfig::default(),
        };
        if let Some(ref credential) = self.credential {
            config.service_credential = credential.clone();
        }
        if let Some(ref url) = self.analysis_url {
            config.analysis_base_url = url.clone();
        }
        if let Some(ref profile) = self.profile {
            config.matching_profile = profile.clone();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    let args = Args::parse();
    let config = args.sketch_config()?;

    let client = HttpClient::new()?;
    if args.check_health && !client.healthy(&config)? {
        bail!(
            "The analysis service at {} isn't healthy",
            config.analysis_base_url
        );
    }

    let mut view = MapView::new(config, FeatureStore::default(), SourceCache::default());

    if let Some(ref path) = args.network {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        let network = NetworkShape::from_geojson(&raw, &mut SmallRng::seed_from_u64(args.seed))?;
        view.load_network(&network);
        write_source(&view, SourceId::Network, &args.network_output)?;
    }

    let raw = fs::read_to_string(&args.drawn).with_context(|| format!("reading {}", args.drawn))?;
    let drawn = parse_draw_event(&raw)?;
    info!("Snapping {} drawn lines", drawn.len());
    replay_drawing(&mut view, drawn, &client);
    if let Some(notice) = view.notice() {
        warn!("{}", notice);
    }
    if view.routes().is_empty() {
        bail!("None of the drawn lines could be snapped to streets");
    }
    if let Some(ref path) = args.routes_output {
        write_geojson(view.routes().to_feature_collection(), path)?;
    }

    if !run_analysis(&mut view, &client) {
        match view.notice() {
            Some(notice) => bail!("{}", notice),
            None => bail!("Analysis didn't run"),
        }
    }
    write_source(&view, SourceId::AnalysisResults, &args.output)?;

    if let Some(ref path) = args.baseline_output {
        if !fetch_baseline(&mut view, &client) {
            match view.notice() {
                Some(notice) => bail!("{}", notice),
                None => bail!("Baseline wasn't fetched"),
            }
        }
        write_source(&view, SourceId::Baseline, path)?;
    }

    Ok(())
}

fn write_source(
    view: &MapView<FeatureStore, SourceCache>,
    source: SourceId,
    path: &str,
) -> Result<()> {
    let fc = view
        .map()
        .get(source)
        .cloned()
        .unwrap_or_else(empty_feature_collection);
    write_geojson(fc, path)
}

fn write_geojson(fc: FeatureCollection, path: &str) -> Result<()> {
    info!("Writing {} features to {}", fc.features.len(), path);
    let gj = GeoJson::from(fc);
    fs::write(path, serde_json::to_string_pretty(&gj)?).with_context(|| format!("writing {path}"))?;
    Ok(())
}
