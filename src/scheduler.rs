// Solar event scheduler
//
// Resolve camera -> compute today's window -> refuse if it already opened ->
// sleep until it opens -> hand the duration to the orchestrator.
// Runs once per invocation; cron (or similar) re-invokes it tomorrow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::config::{Config, Location};
use crate::constants::{
    DEFAULT_END_OFFSET_MIN, DEFAULT_FRAME_INTERVAL_SECS, DEFAULT_START_OFFSET_MIN, SLEEP_TICK_MS,
};
use crate::error::{Result, SunlapseError};
use crate::process::ProcessRunner;
use crate::solar::{self, RecordingWindow, SolarEventKind};
use crate::timelapse::{CaptureOutcome, CaptureRequest, Orchestrator};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    pub camera: String,
    pub event: SolarEventKind,
    pub start_offset_min: i64,
    pub end_offset_min: i64,
    pub interval_secs: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ScheduleRequest {
    pub fn new(camera: impl Into<String>, event: SolarEventKind) -> Self {
        Self {
            camera: camera.into(),
            event,
            start_offset_min: DEFAULT_START_OFFSET_MIN,
            end_offset_min: DEFAULT_END_OFFSET_MIN,
            interval_secs: DEFAULT_FRAME_INTERVAL_SECS,
            latitude: None,
            longitude: None,
        }
    }
}

pub struct Scheduler<'a> {
    config: &'a Config,
    orchestrator: Orchestrator<'a>,
    shutdown: Arc<AtomicBool>,
}

impl<'a> Scheduler<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn ProcessRunner, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            config,
            orchestrator: Orchestrator::new(config, runner),
            shutdown,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: Orchestrator<'a>) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Location after applying any --lat/--long override.
    pub fn location(&self, request: &ScheduleRequest) -> Result<Location> {
        let location = self
            .config
            .location
            .with_overrides(request.latitude, request.longitude);
        location.validate()?;
        Ok(location)
    }

    /// Window for today's event, without checking whether it has opened.
    pub fn window(&self, request: &ScheduleRequest, now: DateTime<Tz>) -> Result<RecordingWindow> {
        let location = self.location(request)?;
        solar::compute_window(
            &location,
            request.event,
            request.start_offset_min,
            request.end_offset_min,
            now,
        )
    }

    pub fn run(&self, request: &ScheduleRequest) -> Result<CaptureOutcome> {
        let now = Utc::now().with_timezone(&self.config.location.timezone);
        self.run_at(request, now)
    }

    pub fn run_at(&self, request: &ScheduleRequest, now: DateTime<Tz>) -> Result<CaptureOutcome> {
        self.config.stream_address(&request.camera)?;
        if request.interval_secs == 0 {
            return Err(SunlapseError::InvalidInterval);
        }

        let window = self.window(request, now)?;
        log_status(request, &window, now);

        let wait = window.wait_seconds(now);
        if wait < 0 {
            return Err(SunlapseError::WindowAlreadyPassed(format!(
                "{} - {} = {}s",
                window.start.format("%m/%d %H:%M"),
                now.format("%m/%d %H:%M"),
                wait
            )));
        }

        log::info!("Sleeping for {} seconds...", wait);
        sleep_interruptible(Duration::from_secs(wait as u64), &self.shutdown)?;
        log::info!("Wake up! Starting recording...");

        let capture = CaptureRequest {
            camera: request.camera.clone(),
            duration_secs: window.duration_secs,
            interval_secs: request.interval_secs,
            resolution: None,
            suffix: Some(request.event.to_string()),
            keep_raw: false,
            skip_assembly: false,
        };
        self.orchestrator.capture_at(&capture, window.start)
    }
}

fn log_status(request: &ScheduleRequest, window: &RecordingWindow, now: DateTime<Tz>) {
    log::info!("--- SCHEDULER: {} ---", now.format("%Y-%m-%d %H:%M:%S %Z"));
    log::info!(
        "Target: {} | Event: {} at {}",
        request.camera,
        request.event,
        window.event.time.format("%H:%M on %m/%d/%y")
    );
    log::info!(
        "Recording Window: {} to {}",
        window.start.format("%H:%M"),
        window.end.format("%H:%M")
    );
    log::info!("Duration: {}s", window.duration_secs);
}

/// Sleep for `duration`, waking early with `Interrupted` if `shutdown` is set.
pub fn sleep_interruptible(duration: Duration, shutdown: &AtomicBool) -> Result<()> {
    let deadline = Instant::now() + duration;
    let tick = Duration::from_millis(SLEEP_TICK_MS);

    loop {
        if shutdown.load(Ordering::SeqCst) {
            log::warn!("Interrupted while waiting for the recording window");
            return Err(SunlapseError::Interrupted);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep(tick.min(deadline - now));
    }
}
