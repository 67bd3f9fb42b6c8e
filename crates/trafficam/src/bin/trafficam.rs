use clap::{Parser, Subcommand};
use std::{error::Error, fs, path::PathBuf, process::ExitCode};
use trafficam::{
    count::{count_crossings, open_detection_stream},
    frames::stabilize_frame_dir,
    zones::Anchor,
    ClipContext, StabilizerParams, ZoneConfig, ZoneSet,
};

#[derive(Parser, Debug)]
#[command(name = "trafficam", version, about = "Traffic-camera clip stabilization and zone-crossing counts")]
struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stabilize a directory of frame images against its first frame.
    Stabilize {
        /// Directory of PNG/JPEG frames, processed in file-name order.
        #[arg(long, value_name = "DIR")]
        input: PathBuf,
        /// Directory that receives the stabilized PNG frames.
        #[arg(long, value_name = "DIR")]
        output: PathBuf,
        /// Stabilizer parameters as JSON; defaults are used when omitted.
        #[arg(long, value_name = "PATH")]
        params: Option<PathBuf>,
        /// Write the stabilization report as JSON.
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
    /// Count entry→exit zone crossings from a JSON-lines detection stream.
    Count {
        /// Zone config JSON with `zones_in` and `zones_out`.
        #[arg(long, value_name = "PATH")]
        zones: PathBuf,
        /// One `{"frame": .., "detections": [..]}` object per line.
        #[arg(long, value_name = "PATH")]
        detections: PathBuf,
        #[arg(long)]
        fps: f64,
        #[arg(long, default_value = "")]
        rotunda: String,
        #[arg(long, default_value = "")]
        schedule: String,
        #[arg(long, default_value = "")]
        day: String,
        /// Process only every n-th frame.
        #[arg(long, default_value_t = 1)]
        frame_stride: u64,
        /// Bounding-box point tested against the zones, e.g. `center` or `bottom_center`.
        #[arg(long, default_value = "center")]
        anchor: String,
        /// Write the count report here instead of stdout.
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        let _ = tracing_log::LogTracer::init();
        trafficam::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        let _ = trafficam::core::init_with_level(level);
    }
}

fn parse_anchor(name: &str) -> Result<Anchor, Box<dyn Error>> {
    serde_json::from_value(serde_json::Value::String(name.to_owned()))
        .map_err(|_| format!("unknown anchor `{name}`").into())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Stabilize {
            input,
            output,
            params,
            report,
        } => {
            let params = match params {
                Some(path) => StabilizerParams::load_json(path)?,
                None => StabilizerParams::default(),
            };
            let summary = stabilize_frame_dir(&input, &output, &params)?;
            if let Some(path) = report {
                fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
                log::info!("wrote report to {}", path.display());
            }
            println!(
                "{} frames: {} warped, {} passed through",
                summary.frames, summary.warped, summary.pass_through
            );
        }
        Command::Count {
            zones,
            detections,
            fps,
            rotunda,
            schedule,
            day,
            frame_stride,
            anchor,
            output,
        } => {
            let config = ZoneConfig::load_json(&zones)?;
            let zone_set = ZoneSet::from_config(&config, parse_anchor(&anchor)?)?;
            let context = ClipContext {
                rotunda,
                schedule,
                day,
            };
            let frames = open_detection_stream(&detections)?;
            let report = count_crossings(&zone_set, frames, fps, context, frame_stride)?;
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    log::info!(
                        "{} crossings written to {}",
                        report.events.len(),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }
    }
    Ok(())
}
