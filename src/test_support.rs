// Shared helpers for unit tests: a temp webroot config and a scripted
// stand-in for ffmpeg.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::process::{CommandSpec, ProcessResult, ProcessRunner};
use crate::timelapse::{ASSEMBLY_LABEL, CAPTURE_LABEL};

pub fn test_config(webroot: &Path) -> Config {
    let text = serde_json::json!({
        "cameras": {
            "cam1": "rtsp://192.168.1.20:554/stream1",
            "backyard": "http://192.168.1.21/video.mjpg"
        },
        "location": {
            "latitude": 40.7128,
            "longitude": -74.006,
            "timezone": "America/New_York"
        },
        "system": { "webroot": webroot }
    })
    .to_string();
    Config::from_json(&text).unwrap()
}

/// Plays ffmpeg: capture writes `frames` numbered files into the output
/// pattern, assembly writes the output video. Either can be told to fail.
/// `undeletable` adds that many non-empty directories named like the
/// following frames, which cleanup cannot remove with a file delete.
#[derive(Debug, Default)]
pub struct FakeRunner {
    pub frames: usize,
    pub fail_capture: bool,
    pub fail_assembly: bool,
    pub undeletable: usize,
    pub calls: RefCell<Vec<(String, CommandSpec)>>,
}

impl FakeRunner {
    pub fn producing(frames: usize) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(l, _)| l.clone()).collect()
    }

    pub fn call(&self, label: &str) -> Option<CommandSpec> {
        self.calls
            .borrow()
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, spec)| spec.clone())
    }
}

fn output_path(spec: &CommandSpec) -> PathBuf {
    PathBuf::from(spec.args.last().cloned().unwrap_or_default())
}

impl ProcessRunner for FakeRunner {
    fn execute(&self, spec: &CommandSpec, label: &str) -> Result<ProcessResult> {
        self.calls.borrow_mut().push((label.to_string(), spec.clone()));

        if label == CAPTURE_LABEL {
            let pattern = output_path(spec).to_string_lossy().into_owned();
            // A failing capture may still have written a couple of frames
            let written = if self.fail_capture { self.frames.min(2) } else { self.frames };
            for i in 1..=written {
                let frame = pattern.replace("%05d", &format!("{:05}", i));
                std::fs::write(&frame, b"jpeg").unwrap();
            }
            for i in written + 1..=written + self.undeletable {
                let dir = PathBuf::from(pattern.replace("%05d", &format!("{:05}", i)));
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("keep"), b"x").unwrap();
            }
            if self.fail_capture {
                return Ok(ProcessResult::failed(
                    Some(1),
                    "rtsp://192.168.1.20:554/stream1: Connection timed out",
                ));
            }
        } else if label == ASSEMBLY_LABEL {
            if self.fail_assembly {
                return Ok(ProcessResult::failed(Some(1), "Could not find codec parameters"));
            }
            std::fs::write(output_path(spec), b"mp4").unwrap();
        }

        Ok(ProcessResult::ok())
    }
}
