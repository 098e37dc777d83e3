// Sunlapse Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SunlapseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown camera '{requested}'. Valid cameras: {}", .known.join(", "))]
    UnknownCamera { requested: String, known: Vec<String> },

    #[error("Invalid recording window: {0}")]
    InvalidWindow(String),

    #[error("Start time has already passed: {0}")]
    WindowAlreadyPassed(String),

    #[error("Solar calculation error: {0}")]
    SolarCalculation(String),

    #[error("Interval must be greater than zero seconds")]
    InvalidInterval,

    #[error("Duration must be greater than zero seconds")]
    InvalidDuration,

    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("Capture failed: {0}")]
    CaptureFailure(String),

    #[error("Assembly failed: {0}")]
    AssemblyFailure(String),

    #[error("Interrupted before capture started")]
    Interrupted,
}

impl SunlapseError {
    /// Process exit status for this error. Each class is distinct so cron
    /// wrappers can tell them apart.
    pub fn exit_code(&self) -> u8 {
        match self {
            SunlapseError::Io(_) | SunlapseError::Json(_) | SunlapseError::InvalidPath(_) => 1,
            SunlapseError::InvalidInterval
            | SunlapseError::InvalidDuration
            | SunlapseError::InvalidResolution(_) => 2,
            SunlapseError::Config(_) => 3,
            SunlapseError::UnknownCamera { .. } => 4,
            SunlapseError::InvalidWindow(_) | SunlapseError::SolarCalculation(_) => 5,
            SunlapseError::WindowAlreadyPassed(_) => 6,
            SunlapseError::CaptureFailure(_) => 7,
            SunlapseError::AssemblyFailure(_) => 8,
            SunlapseError::Interrupted => 130,
        }
    }
}

pub type Result<T> = std::result::Result<T, SunlapseError>;
