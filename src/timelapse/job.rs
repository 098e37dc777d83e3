// Capture job: everything one timelapse run needs, resolved up front.

use std::path::{Path, PathBuf};

use chrono::DateTime;
use chrono_tz::Tz;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::constants::{
    FRAME_EXTENSION, FRAME_SEQUENCE_DIGITS, RUN_PREFIX_TIME_FORMAT, RUN_TOKEN_LEN, VIDEO_EXTENSION,
};
use crate::error::{Result, SunlapseError};

use super::ffmpeg_args::scale_filter;

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub camera: String,
    pub duration_secs: u64,
    pub interval_secs: u64,
    pub resolution: Option<String>,
    pub suffix: Option<String>,
    pub keep_raw: bool,
    pub skip_assembly: bool,
}

impl CaptureRequest {
    pub fn new(camera: impl Into<String>, duration_secs: u64, interval_secs: u64) -> Self {
        Self {
            camera: camera.into(),
            duration_secs,
            interval_secs,
            resolution: None,
            suffix: None,
            keep_raw: false,
            skip_assembly: false,
        }
    }
}

/// A validated, fully resolved run. Owned by exactly one orchestrator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureJob {
    pub camera: String,
    pub stream_url: String,
    pub run_prefix: String,
    pub raw_dir: PathBuf,
    pub video_dir: PathBuf,
    pub frame_pattern: PathBuf,
    pub video_path: PathBuf,
    pub duration_secs: u64,
    pub interval_secs: u64,
    pub expected_frames: u64,
    pub resolution: Option<String>,
    pub suffix: Option<String>,
    pub keep_raw: bool,
    pub skip_assembly: bool,
}

impl CaptureJob {
    /// Validate `request` and resolve paths. Touches nothing on disk.
    pub fn prepare(config: &Config, request: &CaptureRequest, started_at: DateTime<Tz>) -> Result<Self> {
        if request.interval_secs == 0 {
            return Err(SunlapseError::InvalidInterval);
        }
        if request.duration_secs == 0 {
            return Err(SunlapseError::InvalidDuration);
        }
        if let Some(ref res) = request.resolution {
            scale_filter(res)?;
        }

        let stream_url = config.stream_address(&request.camera)?.to_string();

        let run_prefix = run_prefix(&request.camera, started_at, &new_run_token());
        let raw_dir = config.raw_images_dir(&request.camera);
        let video_dir = config.videos_dir(&request.camera);

        let frame_pattern = raw_dir.join(format!(
            "{}_%0{}d.{}",
            run_prefix, FRAME_SEQUENCE_DIGITS, FRAME_EXTENSION
        ));

        let suffix = request
            .suffix
            .as_deref()
            .map(sanitize_suffix)
            .filter(|s| !s.is_empty());
        let video_name = match suffix {
            Some(ref s) => format!("{}_{}.{}", run_prefix, s, VIDEO_EXTENSION),
            None => format!("{}.{}", run_prefix, VIDEO_EXTENSION),
        };
        let video_path = video_dir.join(video_name);

        Ok(Self {
            camera: request.camera.clone(),
            stream_url,
            run_prefix,
            raw_dir,
            video_dir,
            frame_pattern,
            video_path,
            duration_secs: request.duration_secs,
            interval_secs: request.interval_secs,
            expected_frames: expected_frame_count(request.duration_secs, request.interval_secs),
            resolution: request.resolution.clone(),
            suffix,
            // Skipping assembly with no frames kept would throw the run away
            keep_raw: request.keep_raw || request.skip_assembly,
            skip_assembly: request.skip_assembly,
        })
    }

    /// Create raw_images/ and videos/ for the camera.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.raw_dir)?;
        std::fs::create_dir_all(&self.video_dir)?;
        Ok(())
    }

    /// True when `path` is one of this run's frames.
    pub fn owns_frame(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let Some(rest) = name.strip_prefix(&self.run_prefix) else {
            return false;
        };
        let Some(seq) = rest
            .strip_prefix('_')
            .and_then(|r| r.strip_suffix(FRAME_EXTENSION))
            .and_then(|r| r.strip_suffix('.'))
        else {
            return false;
        };
        !seq.is_empty() && seq.chars().all(|c| c.is_ascii_digit())
    }

    /// This run's frames currently on disk, sorted by name.
    pub fn list_frames(&self) -> Vec<PathBuf> {
        self.owned_entries(true)
    }

    fn owned_entries(&self, files_only: bool) -> Vec<PathBuf> {
        if !self.raw_dir.exists() {
            return Vec::new();
        }

        let mut entries: Vec<PathBuf> = WalkDir::new(&self.raw_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !files_only || e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.owns_frame(p))
            .collect();
        entries.sort();
        entries
    }

    /// Delete everything named as one of this run's frames. Best effort:
    /// failures are logged and counted.
    pub fn remove_frames(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for frame in self.owned_entries(false) {
            match std::fs::remove_file(&frame) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    log::warn!("Could not delete frame {}: {}", frame.display(), e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

/// `<camera>_<YYYY-MM-DD_HH-MM-SS>_<token>`
///
/// The token keeps two runs of one camera apart when they start in the same
/// second (e.g. two scheduled runs sharing a window start).
pub fn run_prefix(camera: &str, started_at: DateTime<Tz>, token: &str) -> String {
    format!("{}_{}_{}", camera, started_at.format(RUN_PREFIX_TIME_FORMAT), token)
}

/// Short random hex token, unique per run.
pub fn new_run_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(RUN_TOKEN_LEN);
    token
}

/// ceil(duration / interval). Advisory only.
pub fn expected_frame_count(duration_secs: u64, interval_secs: u64) -> u64 {
    if interval_secs == 0 {
        return 0;
    }
    duration_secs.div_ceil(interval_secs)
}

fn sanitize_suffix(suffix: &str) -> String {
    suffix
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}
