// FFmpeg argument builders for the two timelapse phases
//
// Phase 1 samples one JPEG every `interval` seconds from the live stream.
// Phase 2 reads back exactly this run's numbered frames and encodes H.264.

use std::path::Path;

use regex::Regex;

use crate::constants::{
    FRAME_JPEG_QUALITY, TIMELAPSE_CODEC, TIMELAPSE_CRF, TIMELAPSE_FPS, TIMELAPSE_PIXEL_FORMAT,
};
use crate::error::{Result, SunlapseError};
use crate::process::CommandSpec;

use super::job::CaptureJob;

/// Quiet, overwrite-without-asking prefix shared by both phases.
fn base_args() -> Vec<String> {
    vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
    ]
}

/// Phase 1: stream -> numbered JPEG frames.
pub fn capture_command(ffmpeg: &Path, job: &CaptureJob) -> Result<CommandSpec> {
    let mut args = base_args();

    // TCP is far more reliable than UDP for RTSP over WiFi
    if job.stream_url.starts_with("rtsp://") || job.stream_url.starts_with("rtsps://") {
        args.extend(["-rtsp_transport".into(), "tcp".into()]);
    }

    args.extend([
        "-i".into(),
        job.stream_url.clone(),
        "-t".into(),
        job.duration_secs.to_string(),
        "-vf".into(),
        format!("fps=1/{}", job.interval_secs),
        "-q:v".into(),
        FRAME_JPEG_QUALITY.to_string(),
        "-start_number".into(),
        "1".into(),
        path_str(&job.frame_pattern)?,
    ]);

    Ok(CommandSpec::new(ffmpeg).args(args))
}

/// Phase 2: numbered frames -> video at a fixed frame rate.
pub fn assembly_command(ffmpeg: &Path, job: &CaptureJob) -> Result<CommandSpec> {
    let mut args = base_args();

    args.extend([
        "-framerate".into(),
        TIMELAPSE_FPS.to_string(),
        "-start_number".into(),
        "1".into(),
        "-i".into(),
        path_str(&job.frame_pattern)?,
    ]);

    if let Some(ref resolution) = job.resolution {
        args.extend(["-vf".into(), scale_filter(resolution)?]);
    }

    args.extend([
        "-c:v".into(),
        TIMELAPSE_CODEC.into(),
        "-crf".into(),
        TIMELAPSE_CRF.to_string(),
        "-pix_fmt".into(),
        TIMELAPSE_PIXEL_FORMAT.into(),
        path_str(&job.video_path)?,
    ]);

    Ok(CommandSpec::new(ffmpeg).args(args))
}

/// Turn a user resolution into a scale filter.
///
/// `1280x720`, `1280:720` and `-2x720` become `scale=W:H`; anything else is
/// taken as a raw scale expression (e.g. `iw/2:-2`).
pub fn scale_filter(resolution: &str) -> Result<String> {
    let trimmed = resolution.trim();
    if trimmed.is_empty() {
        return Err(SunlapseError::InvalidResolution("empty resolution".to_string()));
    }

    let dims = Regex::new(r"^(-?\d+)\s*[xX:]\s*(-?\d+)$")
        .map_err(|e| SunlapseError::InvalidResolution(e.to_string()))?;

    if let Some(caps) = dims.captures(trimmed) {
        let (w, h) = (&caps[1], &caps[2]);
        if w == "0" || h == "0" {
            return Err(SunlapseError::InvalidResolution(format!(
                "'{}' has a zero dimension",
                resolution
            )));
        }
        return Ok(format!("scale={}:{}", w, h));
    }

    if trimmed.contains(char::is_whitespace) || trimmed.contains(',') {
        return Err(SunlapseError::InvalidResolution(format!(
            "'{}' is not WIDTHxHEIGHT or a single scale expression",
            resolution
        )));
    }

    Ok(format!("scale={}", trimmed))
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| SunlapseError::InvalidPath(format!("{} contains non-UTF8 characters", path.display())))
}
