use std::path::{Path, PathBuf};

use beatgrid_core::{
    resolve, AppConfig, ChartFile, EventKind, Manifest, Session, SimulatedTransport,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Seconds simulated past the last stamp when no duration is given.
const TAIL_SECONDS: f64 = 2.0;

fn main() -> beatgrid_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { chart, duration } => run_inspect(&chart, duration),
        Commands::Simulate {
            chart,
            duration,
            config,
        } => run_simulate(&chart, duration, config.as_deref()),
        Commands::Resolve { chart, kind, time } => run_resolve(&chart, &kind, time),
        Commands::New {
            output,
            name,
            artist,
            bpm,
            config,
        } => run_new(&output, name, artist, bpm, config.as_deref()),
    }
}

fn run_inspect(path: &Path, duration: Option<f64>) -> beatgrid_core::Result<()> {
    let chart = ChartFile::load(path)?;
    let mut conductor = chart.conductor(0)?;
    let timeline = chart.timeline(&conductor);
    conductor.set_song_duration(duration.unwrap_or_else(|| song_length(&chart)));

    tracing::info!(
        name = %chart.manifest.name,
        artist = %chart.manifest.artist,
        charter = %chart.manifest.charter,
        uuid = %chart.manifest.uuid,
        "chart"
    );
    tracing::info!(
        bpm = conductor.bpm(),
        time_signature = ?conductor.time_signature(),
        beat_interval = conductor.beat_interval(),
        step_interval = conductor.step_interval(),
        total_beats = conductor.total_beats(),
        total_steps = conductor.total_steps(),
        "timing"
    );
    tracing::info!(
        notes = timeline.notes().len(),
        events = timeline.events().len(),
        dropped = chart.chart.notes.len().saturating_sub(timeline.notes().len()),
        "contents"
    );
    for kind in EventKind::ALL {
        let count = timeline.events_of_kind(kind).count();
        if count > 0 {
            tracing::info!(kind = %kind, count, "events");
        }
    }
    Ok(())
}

fn run_simulate(
    path: &Path,
    duration: Option<f64>,
    config: Option<&Path>,
) -> beatgrid_core::Result<()> {
    let chart = ChartFile::load(path)?;
    let config = load_config(config)?;
    let duration = duration.unwrap_or_else(|| song_length(&chart));
    tracing::info!(name = %chart.manifest.name, duration, "starting simulation");

    let mut session = Session::new(&chart, SimulatedTransport::new(duration), &config)?;
    session
        .conductor_mut()
        .on_count_in(|beats| tracing::info!(beats, "count-in"));
    session.on_stamp_hit(|stamp| tracing::info!(id = %stamp.id(), time = stamp.time(), "stamp hit"));

    let dt = config.playback.frame_delta();
    let mut frames = 0u64;
    loop {
        session.transport_mut().advance(dt);
        let report = session.update(dt)?;
        frames += 1;

        if let Some(beat) = report.tick.beat {
            let camera = session.presentation().camera;
            tracing::info!(
                beat,
                measure = session.conductor().current_measure(),
                x = camera.x,
                y = camera.y,
                zoom = camera.zoom,
                angle = camera.angle,
                "beat"
            );
        }
        if let Some(bpm) = report.tempo {
            tracing::info!(bpm, "tempo change");
        }
        if !session.conductor().in_pre_roll() && session.transport().is_finished() {
            break;
        }
    }

    let elapsed = session.conductor().elapsed();
    session.finish();
    tracing::info!(frames, elapsed, "simulation finished");
    Ok(())
}

fn run_resolve(path: &Path, kind: &str, time: f64) -> beatgrid_core::Result<()> {
    let chart = ChartFile::load(path)?;
    let kind = EventKind::from_name(kind)?;
    let conductor = chart.conductor(0)?;
    let timeline = chart.timeline(&conductor);

    let params = resolve(kind, time, timeline.events());
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::Value::Object(params.to_json()))?
    );
    Ok(())
}

fn run_new(
    output: &Path,
    name: String,
    artist: String,
    bpm: Option<f64>,
    config: Option<&Path>,
) -> beatgrid_core::Result<()> {
    let config = load_config(config)?;
    let mut manifest = Manifest::with_defaults(name, artist, &config.conductor);
    if let Some(bpm) = bpm {
        manifest.initial_bpm = bpm;
    }
    let chart = ChartFile::new(manifest);
    chart.conductor(0)?;
    chart.save(output)?;
    tracing::info!(path = %output.display(), uuid = %chart.manifest.uuid, "created chart");
    Ok(())
}

fn load_config(path: Option<&Path>) -> beatgrid_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

/// Time of the last stamp plus a short tail.
fn song_length(chart: &ChartFile) -> f64 {
    let notes = chart.chart.notes.iter().map(|note| note.time);
    let events = chart.chart.events.iter().map(|event| event.time);
    notes.chain(events).fold(0.0, f64::max) + TAIL_SECONDS
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Rhythm chart editor core tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a chart's manifest, timing and contents.
    Inspect {
        /// Path to the chart file.
        chart: PathBuf,
        /// Song length in seconds used for beat and step totals.
        #[arg(short, long)]
        duration: Option<f64>,
    },
    /// Play a chart against a simulated transport and log what fires.
    Simulate {
        /// Path to the chart file.
        chart: PathBuf,
        /// Seconds to simulate. Defaults to just past the last stamp.
        #[arg(short, long)]
        duration: Option<f64>,
        /// Optional configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the effective parameters of an event kind at a time.
    Resolve {
        /// Path to the chart file.
        chart: PathBuf,
        /// Event kind name, e.g. `cam-move`.
        #[arg(short, long)]
        kind: String,
        /// Song time in seconds.
        #[arg(short, long)]
        time: f64,
    },
    /// Write an empty chart with a fresh uuid.
    New {
        /// Output path for the chart file.
        output: PathBuf,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        artist: String,
        /// Initial tempo. Defaults to the configured tempo.
        #[arg(short, long)]
        bpm: Option<f64>,
        /// Optional configuration file supplying tempo and time signature.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
