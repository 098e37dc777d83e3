// External tool resolver for ffmpeg
//
// Resolution order:
// 1) Environment variable override (SUNLAPSE_FFMPEG_PATH)
// 2) Sidecar next to the executable, or in its bin/ subdirectory
// 3) PATH fallback

use std::env;
use std::path::PathBuf;

pub const FFMPEG_ENV_VAR: &str = "SUNLAPSE_FFMPEG_PATH";

/// Get the directory containing the current executable
pub fn exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Resolve a tool path from an env override, a sidecar, or PATH.
fn resolve_tool(env_key: &str, default_name: &str) -> PathBuf {
    if let Ok(v) = env::var(env_key) {
        let p = PathBuf::from(&v);
        if p.exists() {
            return p;
        }
        log::warn!("{} points to missing file {}, ignoring", env_key, v);
    }

    let mut filename = default_name.to_string();
    if cfg!(windows) && !filename.to_lowercase().ends_with(".exe") {
        filename.push_str(".exe");
    }

    if let Some(dir) = exe_dir() {
        let candidate = dir.join(&filename);
        if candidate.exists() {
            return candidate;
        }

        let bin_candidate = dir.join("bin").join(&filename);
        if bin_candidate.exists() {
            return bin_candidate;
        }
    }

    PathBuf::from(default_name)
}

/// Get path to ffmpeg binary
pub fn ffmpeg_path() -> PathBuf {
    resolve_tool(FFMPEG_ENV_VAR, "ffmpeg")
}
