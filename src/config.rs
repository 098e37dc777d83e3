// Configuration and camera registry
//
// Loaded once at startup from config.json and passed by reference to the
// scheduler and the capture orchestrator.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_ENV_VAR, CONFIG_FILENAME, CONFIG_HOME_FOLDER, RAW_IMAGES_FOLDER, VIDEOS_FOLDER,
};
use crate::error::{Result, SunlapseError};

/// Observer location used for solar calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Tz,
}

impl Location {
    /// Same timezone, different coordinates (CLI --lat/--long override).
    pub fn with_overrides(&self, latitude: Option<f64>, longitude: Option<f64>) -> Location {
        Location {
            latitude: latitude.unwrap_or(self.latitude),
            longitude: longitude.unwrap_or(self.longitude),
            timezone: self.timezone,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(SunlapseError::Config(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(SunlapseError::Config(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub webroot: PathBuf,
}

/// Top-level configuration. `cameras` is the camera registry: id -> stream address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub cameras: BTreeMap<String, String>,
    pub location: Location,
    pub system: SystemSettings,
}

impl Config {
    /// Parse and validate a config from JSON text.
    pub fn from_json(text: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| SunlapseError::Config(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SunlapseError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Config::from_json(&text)?;
        log::debug!(
            "Loaded config from {} ({} cameras)",
            path.display(),
            config.cameras.len()
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(SunlapseError::Config("no cameras configured".to_string()));
        }
        for (name, url) in &self.cameras {
            if name.trim().is_empty() {
                return Err(SunlapseError::Config("camera id must not be empty".to_string()));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(SunlapseError::Config(format!(
                    "camera id '{}' cannot be used as a folder name",
                    name
                )));
            }
            if url.trim().is_empty() {
                return Err(SunlapseError::Config(format!(
                    "camera '{}' has an empty stream address",
                    name
                )));
            }
        }
        self.location.validate()?;
        if self.system.webroot.as_os_str().is_empty() {
            return Err(SunlapseError::Config("system.webroot is empty".to_string()));
        }
        Ok(())
    }

    /// Resolve a camera id to its stream address.
    pub fn stream_address(&self, camera: &str) -> Result<&str> {
        self.cameras
            .get(camera)
            .map(String::as_str)
            .ok_or_else(|| SunlapseError::UnknownCamera {
                requested: camera.to_string(),
                known: self.camera_ids(),
            })
    }

    pub fn camera_ids(&self) -> Vec<String> {
        self.cameras.keys().cloned().collect()
    }

    /// `<webroot>/<camera>`
    pub fn camera_dir(&self, camera: &str) -> PathBuf {
        self.system.webroot.join(camera)
    }

    pub fn raw_images_dir(&self, camera: &str) -> PathBuf {
        self.camera_dir(camera).join(RAW_IMAGES_FOLDER)
    }

    pub fn videos_dir(&self, camera: &str) -> PathBuf {
        self.camera_dir(camera).join(VIDEOS_FOLDER)
    }
}

/// Find the config file.
/// Order: explicit path, $SUNLAPSE_CONFIG, config.json next to the
/// executable, ~/.sunlapse/config.json.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }

    if let Ok(v) = env::var(CONFIG_ENV_VAR) {
        if !v.is_empty() {
            return Ok(PathBuf::from(v));
        }
    }

    let mut candidates = Vec::new();
    if let Some(dir) = crate::tools::exe_dir() {
        candidates.push(dir.join(CONFIG_FILENAME));
    }
    if let Some(base) = directories::BaseDirs::new() {
        candidates.push(base.home_dir().join(CONFIG_HOME_FOLDER).join(CONFIG_FILENAME));
    }

    candidates
        .iter()
        .find(|p| p.exists())
        .cloned()
        .ok_or_else(|| {
            let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            SunlapseError::Config(format!(
                "config file not found (tried: {}). Use --config or set {}",
                tried.join(", "),
                CONFIG_ENV_VAR
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "cameras": {
            "cam1": "rtsp://192.168.1.20:554/stream1",
            "backyard": "http://192.168.1.21/video.mjpg"
        },
        "location": {
            "latitude": 40.7128,
            "longitude": -74.006,
            "timezone": "America/New_York"
        },
        "system": { "webroot": "/var/www/html/cams", "log_dir": "logs" }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.location.timezone, chrono_tz::America::New_York);
        assert_eq!(
            config.stream_address("cam1").unwrap(),
            "rtsp://192.168.1.20:554/stream1"
        );
        assert_eq!(
            config.raw_images_dir("cam1"),
            PathBuf::from("/var/www/html/cams/cam1/raw_images")
        );
        assert_eq!(
            config.videos_dir("cam1"),
            PathBuf::from("/var/www/html/cams/cam1/videos")
        );
    }

    #[test]
    fn test_unknown_camera_lists_known_ids() {
        let config = Config::from_json(SAMPLE).unwrap();
        match config.stream_address("frontdoor") {
            Err(SunlapseError::UnknownCamera { requested, known }) => {
                assert_eq!(requested, "frontdoor");
                assert_eq!(known, vec!["backyard".to_string(), "cam1".to_string()]);
            }
            other => panic!("expected UnknownCamera, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_timezone_is_config_error() {
        let text = SAMPLE.replace("America/New_York", "Mars/Olympus_Mons");
        assert!(matches!(Config::from_json(&text), Err(SunlapseError::Config(_))));
    }

    #[test]
    fn test_out_of_range_latitude_rejected() {
        let text = SAMPLE.replace("40.7128", "123.4");
        assert!(matches!(Config::from_json(&text), Err(SunlapseError::Config(_))));
    }

    #[test]
    fn test_empty_registry_rejected() {
        let text = r#"{
            "cameras": {},
            "location": { "latitude": 0.0, "longitude": 0.0, "timezone": "UTC" },
            "system": { "webroot": "/tmp/cams" }
        }"#;
        assert!(matches!(Config::from_json(text), Err(SunlapseError::Config(_))));
    }

    #[test]
    fn test_shared_system_keys_are_ignored() {
        // log_dir belongs to the web indexer that shares this file
        let text = r#"{
            "cameras": { "cam1": "rtsp://x" },
            "location": { "latitude": 0.0, "longitude": 0.0, "timezone": "UTC" },
            "system": { "webroot": "/tmp/cams", "log_dir": "logs" }
        }"#;
        let config = Config::from_json(text).unwrap();
        assert_eq!(config.system.webroot, PathBuf::from("/tmp/cams"));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let result = Config::load(&tmp.path().join("nope.json"));
        assert!(matches!(result, Err(SunlapseError::Config(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.camera_ids(), vec!["backyard", "cam1"]);
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let p = PathBuf::from("/etc/sunlapse/config.json");
        assert_eq!(resolve_config_path(Some(&p)).unwrap(), p);
    }

    #[test]
    fn test_location_overrides() {
        let config = Config::from_json(SAMPLE).unwrap();
        let loc = config.location.with_overrides(Some(51.5), None);
        assert_eq!(loc.latitude, 51.5);
        assert_eq!(loc.longitude, -74.006);
        assert_eq!(loc.timezone, config.location.timezone);
    }
}
