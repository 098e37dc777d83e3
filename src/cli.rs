// Sunlapse CLI binary

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use sunlapse_lib::config::{resolve_config_path, Config};
use sunlapse_lib::constants::{
    DEFAULT_END_OFFSET_MIN, DEFAULT_FRAME_INTERVAL_SECS, DEFAULT_START_OFFSET_MIN,
};
use sunlapse_lib::{
    CaptureOutcome, CaptureRequest, Orchestrator, ScheduleRequest, Scheduler, SolarEventKind,
    SunlapseError, SystemRunner,
};

#[derive(Parser)]
#[command(name = "sunlapse")]
#[command(about = "Sunlapse - sunrise/sunset timelapses from network cameras", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.json (defaults: $SUNLAPSE_CONFIG, next to the binary, ~/.sunlapse/)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for today's sunrise/sunset window, then record a timelapse
    Schedule {
        /// Camera id from the config
        #[arg(long)]
        cam: String,
        /// sunrise or sunset
        #[arg(long)]
        mode: SolarEventKind,
        /// Minutes relative to the event to start (negative = before)
        #[arg(long, alias = "start_offset", default_value_t = DEFAULT_START_OFFSET_MIN, allow_negative_numbers = true)]
        start_offset: i64,
        /// Minutes relative to the event to stop
        #[arg(long, alias = "end_offset", default_value_t = DEFAULT_END_OFFSET_MIN, allow_negative_numbers = true)]
        end_offset: i64,
        /// Seconds between captured frames
        #[arg(long, default_value_t = DEFAULT_FRAME_INTERVAL_SECS)]
        interval: u64,
        /// Latitude override
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Longitude override
        #[arg(long = "long", allow_negative_numbers = true)]
        longitude: Option<f64>,
    },

    /// Capture frames now for a fixed duration and assemble them
    Capture {
        /// Camera id from the config
        #[arg(long)]
        cam: String,
        /// Recording length in seconds
        #[arg(long)]
        duration: u64,
        /// Seconds between captured frames
        #[arg(long)]
        interval: u64,
        /// Output size, e.g. 1280x720 or 1280:720
        #[arg(long)]
        res: Option<String>,
        /// Appended to the video filename
        #[arg(long)]
        suffix: Option<String>,
        /// Keep the raw frames after assembly
        #[arg(long)]
        keep_raw: bool,
        /// Only capture frames (implies --keep-raw)
        #[arg(long)]
        skip_assembly: bool,
    },

    /// Show today's recording window without waiting or recording
    Window {
        /// sunrise or sunset
        #[arg(long)]
        mode: SolarEventKind,
        #[arg(long, alias = "start_offset", default_value_t = DEFAULT_START_OFFSET_MIN, allow_negative_numbers = true)]
        start_offset: i64,
        #[arg(long, alias = "end_offset", default_value_t = DEFAULT_END_OFFSET_MIN, allow_negative_numbers = true)]
        end_offset: i64,
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long = "long", allow_negative_numbers = true)]
        longitude: Option<f64>,
    },

    /// List configured cameras
    Cameras,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<SunlapseError>()
                .map(|se| se.exit_code())
                .unwrap_or(1);
            log::error!("{:#}", e);
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref())?;
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Schedule { cam, mode, start_offset, end_offset, interval, lat, longitude } => {
            let request = ScheduleRequest {
                camera: cam,
                event: mode,
                start_offset_min: start_offset,
                end_offset_min: end_offset,
                interval_secs: interval,
                latitude: lat,
                longitude,
            };
            cmd_schedule(&config, request)
        }
        Commands::Capture { cam, duration, interval, res, suffix, keep_raw, skip_assembly } => {
            let request = CaptureRequest {
                camera: cam,
                duration_secs: duration,
                interval_secs: interval,
                resolution: res,
                suffix,
                keep_raw,
                skip_assembly,
            };
            cmd_capture(&config, request)
        }
        Commands::Window { mode, start_offset, end_offset, lat, longitude } => {
            cmd_window(&config, mode, start_offset, end_offset, lat, longitude)
        }
        Commands::Cameras => cmd_cameras(&config),
    }
}

fn cmd_schedule(config: &Config, request: ScheduleRequest) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let runner = SystemRunner;
    let scheduler = Scheduler::new(config, &runner, shutdown);
    let outcome = scheduler.run(&request)?;
    print_outcome(&outcome);
    Ok(())
}

fn cmd_capture(config: &Config, request: CaptureRequest) -> Result<()> {
    let runner = SystemRunner;
    let orchestrator = Orchestrator::new(config, &runner);
    let outcome = orchestrator.capture(&request)?;
    print_outcome(&outcome);
    Ok(())
}

fn cmd_window(
    config: &Config,
    mode: SolarEventKind,
    start_offset: i64,
    end_offset: i64,
    lat: Option<f64>,
    longitude: Option<f64>,
) -> Result<()> {
    let runner = SystemRunner;
    let scheduler = Scheduler::new(config, &runner, Arc::new(AtomicBool::new(false)));

    // Camera is irrelevant for a dry run; take the first one
    let camera = config.camera_ids().into_iter().next().unwrap_or_default();
    let mut request = ScheduleRequest::new(camera, mode);
    request.start_offset_min = start_offset;
    request.end_offset_min = end_offset;
    request.latitude = lat;
    request.longitude = longitude;

    let location = scheduler.location(&request)?;
    let now = Utc::now().with_timezone(&location.timezone);
    let window = scheduler.window(&request, now)?;
    let wait = window.wait_seconds(now);

    println!("Location:    {:.4}, {:.4} ({})", location.latitude, location.longitude, location.timezone);
    println!("Event:       {} at {}", mode, window.event.time.format("%H:%M:%S on %Y-%m-%d"));
    println!("Window:      {} to {}", window.start.format("%H:%M:%S"), window.end.format("%H:%M:%S"));
    println!("Duration:    {}s", window.duration_secs);
    if wait >= 0 {
        println!("Starts in:   {}", format_duration(wait));
    } else {
        println!("Started:     {} ago", format_duration(-wait));
    }

    Ok(())
}

fn cmd_cameras(config: &Config) -> Result<()> {
    println!("{:<16}  {}", "Camera", "Stream");
    println!("{}", "-".repeat(60));
    for (name, url) in &config.cameras {
        println!("{:<16}  {}", name, url);
    }
    println!();
    println!("Output root: {}", config.system.webroot.display());
    Ok(())
}

fn print_outcome(outcome: &CaptureOutcome) {
    println!();
    println!("Timelapse complete: {}", outcome.run_prefix);
    println!("  Frames:     {} captured ({} expected)", outcome.frames_captured, outcome.expected_frames);
    match outcome.video_path {
        Some(ref video) => println!("  Video:      {}", video.display()),
        None => println!("  Video:      skipped"),
    }
    if outcome.raw_kept {
        println!("  Raw frames: kept in {}", outcome.raw_dir.display());
    } else {
        println!("  Raw frames: {} removed", outcome.cleanup.removed);
        if outcome.cleanup.failed > 0 {
            println!("              {} could not be deleted", outcome.cleanup.failed);
        }
    }
}

// --- Helper Functions ---

fn format_duration(total_seconds: i64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
