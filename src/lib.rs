// Sunlapse - Library Entry Point

pub mod constants;
pub mod error;
pub mod tools;
pub mod config;
pub mod process;
pub mod solar;
pub mod timelapse;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Result, SunlapseError};
pub use process::{ProcessRunner, SystemRunner};
pub use scheduler::{ScheduleRequest, Scheduler};
pub use solar::{RecordingWindow, SolarEventKind};
pub use timelapse::{CaptureOutcome, CaptureRequest, Orchestrator};
