// Timelapse capture orchestrator
//
// Two external phases (frame capture, assembly) followed by optional cleanup
// of raw frames, driven as an explicit state machine:
//
//   Idle -> Capturing -> CaptureFailed
//                     -> Captured -> Done                      (skip assembly)
//                                 -> Assembling -> AssemblyFailed
//                                               -> Assembled -> Done        (keep raw)
//                                                            -> CleaningUp -> Done
//
// Raw frames are only ever deleted from CleaningUp, which is only reachable
// from Assembled.

pub mod ffmpeg_args;
pub mod job;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::config::Config;
use crate::error::{Result, SunlapseError};
use crate::process::ProcessRunner;

pub use job::{expected_frame_count, CaptureJob, CaptureRequest, CleanupReport};

pub const CAPTURE_LABEL: &str = "frame capture";
pub const ASSEMBLY_LABEL: &str = "video assembly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    Capturing,
    CaptureFailed,
    Captured,
    Assembling,
    AssemblyFailed,
    Assembled,
    CleaningUp,
    Done,
}

impl RunState {
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Capturing)
                | (Capturing, CaptureFailed)
                | (Capturing, Captured)
                | (Captured, Assembling)
                | (Captured, Done)
                | (Assembling, AssemblyFailed)
                | (Assembling, Assembled)
                | (Assembled, CleaningUp)
                | (Assembled, Done)
                | (CleaningUp, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::CaptureFailed | RunState::AssemblyFailed | RunState::Done)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// State plus the path taken to reach it.
#[derive(Debug, Clone)]
struct PipelineRun {
    state: RunState,
    history: Vec<RunState>,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal pipeline transition {} -> {}",
            self.state,
            next
        );
        log::debug!("pipeline: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }
}

/// Result of a run that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub camera: String,
    pub run_prefix: String,
    pub expected_frames: u64,
    /// Frames actually on disk after capture; authoritative over the estimate
    pub frames_captured: usize,
    pub video_path: Option<PathBuf>,
    pub raw_dir: PathBuf,
    pub raw_kept: bool,
    pub cleanup: CleanupReport,
    pub states: Vec<RunState>,
}

pub struct Orchestrator<'a> {
    config: &'a Config,
    runner: &'a dyn ProcessRunner,
    ffmpeg: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn ProcessRunner) -> Self {
        Self {
            config,
            runner,
            ffmpeg: crate::tools::ffmpeg_path(),
        }
    }

    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    /// Run the pipeline now, naming files after the current local time.
    pub fn capture(&self, request: &CaptureRequest) -> Result<CaptureOutcome> {
        let started_at = Utc::now().with_timezone(&self.config.location.timezone);
        self.capture_at(request, started_at)
    }

    /// Run the pipeline with an explicit start time (used for the run prefix).
    pub fn capture_at(&self, request: &CaptureRequest, started_at: DateTime<Tz>) -> Result<CaptureOutcome> {
        let job = CaptureJob::prepare(self.config, request, started_at)?;
        if request.skip_assembly && !request.keep_raw {
            log::info!("Assembly skipped, keeping raw frames");
        }

        let capture_cmd = ffmpeg_args::capture_command(&self.ffmpeg, &job)?;
        let assembly_cmd = if job.skip_assembly {
            None
        } else {
            Some(ffmpeg_args::assembly_command(&self.ffmpeg, &job)?)
        };

        job.ensure_dirs()?;

        let mut run = PipelineRun::new();

        log::info!(
            "Capturing {} for {}s, one frame every {}s (~{} frames) as {}",
            job.camera, job.duration_secs, job.interval_secs, job.expected_frames, job.run_prefix
        );
        run.advance(RunState::Capturing);

        let captured = self.runner.execute(&capture_cmd, CAPTURE_LABEL);
        let failure = match captured {
            Ok(ref r) if r.success => None,
            Ok(ref r) => Some(r.failure_detail(CAPTURE_LABEL)),
            Err(ref e) => Some(format!("{}: {}", CAPTURE_LABEL, e)),
        };
        if let Some(detail) = failure {
            run.advance(RunState::CaptureFailed);
            let leftover = job.list_frames().len();
            if leftover > 0 {
                log::warn!(
                    "{} partial frames left in {}",
                    leftover,
                    job.raw_dir.display()
                );
            }
            return Err(SunlapseError::CaptureFailure(detail));
        }

        let frames_captured = job.list_frames().len();
        run.advance(RunState::Captured);
        log::info!("Captured {} frames ({} expected)", frames_captured, job.expected_frames);
        if frames_captured == 0 {
            log::warn!("Capture finished but no frames matching {} were written", job.run_prefix);
        }

        let Some(assembly_cmd) = assembly_cmd else {
            run.advance(RunState::Done);
            log::info!("Frames kept in {}", job.raw_dir.display());
            return Ok(outcome(&job, frames_captured, None, CleanupReport::default(), run));
        };

        run.advance(RunState::Assembling);
        log::info!("Assembling {} at {} fps", job.video_path.display(), crate::constants::TIMELAPSE_FPS);

        let assembled = self.runner.execute(&assembly_cmd, ASSEMBLY_LABEL);
        let failure = match assembled {
            Ok(ref r) if r.success => None,
            Ok(ref r) => Some(r.failure_detail(ASSEMBLY_LABEL)),
            Err(ref e) => Some(format!("{}: {}", ASSEMBLY_LABEL, e)),
        };
        if let Some(detail) = failure {
            run.advance(RunState::AssemblyFailed);
            log::warn!(
                "Raw frames for {} preserved in {} for manual recovery",
                job.run_prefix,
                job.raw_dir.display()
            );
            return Err(SunlapseError::AssemblyFailure(detail));
        }

        run.advance(RunState::Assembled);
        log::info!("Saved {}", job.video_path.display());

        let cleanup = if job.keep_raw {
            run.advance(RunState::Done);
            CleanupReport::default()
        } else {
            run.advance(RunState::CleaningUp);
            let report = job.remove_frames();
            if report.failed > 0 {
                log::warn!(
                    "Cleanup removed {} frames, {} could not be deleted",
                    report.removed,
                    report.failed
                );
            }
            run.advance(RunState::Done);
            report
        };

        let video = job.video_path.clone();
        Ok(outcome(&job, frames_captured, Some(video), cleanup, run))
    }
}

fn outcome(
    job: &CaptureJob,
    frames_captured: usize,
    video_path: Option<PathBuf>,
    cleanup: CleanupReport,
    run: PipelineRun,
) -> CaptureOutcome {
    CaptureOutcome {
        camera: job.camera.clone(),
        run_prefix: job.run_prefix.clone(),
        expected_frames: job.expected_frames,
        frames_captured,
        video_path,
        raw_dir: job.raw_dir.clone(),
        raw_kept: job.keep_raw,
        cleanup,
        states: run.history,
    }
}
