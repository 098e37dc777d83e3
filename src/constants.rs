// Sunlapse Constants

// Scheduler defaults (minutes relative to the solar event, negative = before)
pub const DEFAULT_START_OFFSET_MIN: i64 = -20;
pub const DEFAULT_END_OFFSET_MIN: i64 = 30;
pub const DEFAULT_FRAME_INTERVAL_SECS: u64 = 10;

// Solar calculation
pub const SUN_ZENITH_OFFICIAL: f64 = 90.8333;
pub const SOLAR_DATE_SEARCH_CAP: usize = 3;

// Sleep is sliced so Ctrl-C is noticed promptly
pub const SLEEP_TICK_MS: u64 = 250;

// Paths
pub const CONFIG_FILENAME: &str = "config.json";
pub const CONFIG_HOME_FOLDER: &str = ".sunlapse";
pub const CONFIG_ENV_VAR: &str = "SUNLAPSE_CONFIG";
pub const RAW_IMAGES_FOLDER: &str = "raw_images";
pub const VIDEOS_FOLDER: &str = "videos";

// File naming
pub const RUN_PREFIX_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
pub const RUN_TOKEN_LEN: usize = 8;
pub const FRAME_EXTENSION: &str = "jpg";
pub const FRAME_SEQUENCE_DIGITS: usize = 5;
pub const VIDEO_EXTENSION: &str = "mp4";

// Frame capture
pub const FRAME_JPEG_QUALITY: u32 = 2; // ffmpeg -q:v, 2-31 where 2 is best

// Assembly
pub const TIMELAPSE_FPS: u32 = 30;
pub const TIMELAPSE_CODEC: &str = "libx264";
pub const TIMELAPSE_PIXEL_FORMAT: &str = "yuv420p";
pub const TIMELAPSE_CRF: u32 = 20;
