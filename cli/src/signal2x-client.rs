//! # signal2x-client
//!
//! Command-line client for the SPaT traffic-signal service. Downloads the
//! static map data (intersections, trigger lines, lane map) as GeoJSON and
//! shows the live signal states of one lane group in the terminal.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;

use lib_signal::configs::{Config, Settings, load_config};
use lib_signal::geometry::{SpatMapApi, spatbox_id, write_feature_collection};
use lib_signal::loggers::setup_logging;
use lib_signal::{BatchHandler, Dispatcher, LaneIndex, SpatStreamClient, TerminalRenderer, Termination};

/// CLI arguments for signal2x-client.
#[derive(Parser)]
#[clap(
    name = "signal2x-client",
    version = "0.1.0",
    author = "ckir",
    about = "Downloads SPaT map data and shows live traffic-signal states.",
    long_about = "Talks to the SPaT service: fetches intersections, trigger lines and lane maps as GeoJSON \
                  feature collections, and renders the live signal states of a lane group in the terminal."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    config: Config,
}

#[derive(Subcommand)]
enum Command {
    /// Write all intersections in the configured bounding box to the intersections file.
    GetIntersections,
    /// Write the trigger lines of one intersection to the triggers file.
    GetTriggerLines {
        /// Intersection (spat box) id.
        intersection_id: String,
    },
    /// Download the lane map of every intersection into the lanes file.
    GetLaneMap,
    /// Show the live signal states of a lane group until the stream ends.
    LiveStatus {
        /// Lane group id, prefixed with its intersection id.
        lane_group_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = load_config(cli.config);
    setup_logging(&settings.log_dir, &settings.log_level, "signal2x-client", false)?;

    match cli.command {
        Command::GetIntersections => get_intersections(&settings).await,
        Command::GetTriggerLines { intersection_id } => get_trigger_lines(&settings, &intersection_id).await,
        Command::GetLaneMap => get_lane_map(&settings).await,
        Command::LiveStatus { lane_group_id } => live_status(&settings, &lane_group_id).await,
    }
}

async fn map_api(settings: &Settings) -> Result<SpatMapApi> {
    let credentials = settings.credentials()?;
    let api = SpatMapApi::connect(&settings.api_client()?, &credentials)
        .await
        .context("Failed to authenticate against the SPaT service")?;
    Ok(api)
}

async fn get_intersections(settings: &Settings) -> Result<()> {
    let api = map_api(settings).await?;
    let intersections = api.get_intersections(&settings.bbox).await?;
    write_feature_collection(&settings.intersections_file, intersections)?;
    Ok(())
}

async fn get_trigger_lines(settings: &Settings, intersection_id: &str) -> Result<()> {
    let api = map_api(settings).await?;
    let trigger_lines = api.get_trigger_lines(intersection_id).await?;
    write_feature_collection(&settings.triggers_file, trigger_lines)?;
    Ok(())
}

async fn get_lane_map(settings: &Settings) -> Result<()> {
    let api = map_api(settings).await?;
    let intersections = api.get_intersections(&settings.bbox).await?;
    let total = intersections.len();

    let mut lanes = Vec::new();
    for (i, intersection) in intersections.iter().enumerate() {
        print!("\rProgress: {}/{}", i + 1, total);
        std::io::stdout().flush()?;

        let Some(box_id) = spatbox_id(intersection) else {
            log::warn!("Intersection feature without spatboxId skipped");
            continue;
        };
        lanes.extend(api.get_lane_map(box_id).await?);

        // Spread requests out a little.
        let pause = rand::rng().random_range(100..=950);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }
    println!();

    write_feature_collection(&settings.lanes_file, lanes)?;
    Ok(())
}

async fn live_status(settings: &Settings, lane_group_id: &str) -> Result<()> {
    let source = Arc::new(SpatStreamClient::new(settings.api_client()?, settings.credentials()?));
    let dispatcher = Dispatcher::new(source);
    let index = LaneIndex::new(&settings.lanes_file);
    log::info!("Live status for {} using lane map {}", lane_group_id, index.path().display());
    let mut handler = BatchHandler::Terminal(TerminalRenderer::stdout(index));

    match dispatcher.run(lane_group_id, &mut handler, None).await? {
        Termination::StreamEnded { handled } | Termination::BudgetExhausted { handled } => {
            log::info!("Live status for {} finished after {} batches", lane_group_id, handled);
        }
    }
    Ok(())
}
