//! Config Handler.

use serde::{Deserialize, Serialize};

/// Provides TOML config file handling.
pub mod toml {

    use super::DEFAULT_CONFIG;
    use crate::module::define;
    use std::fs::File;
    use std::io::prelude::*;
    use std::path::Path;

    /// Loads a configuration file from the given directory.
    /// If not found, generates a default config file.
    ///
    /// # Arguments
    ///
    /// * `dir` - The directory where the configuration file is located or should be created.
    ///
    pub fn load(dir: &str) -> super::Config {
        // Check if the config file exists
        let path = Path::new(dir).join(define::path::CONF_FILE);
        let exist: bool = path.is_file();

        if !exist {
            // Create the default config if it doesn't exist
            let config: super::Config = toml::from_str(DEFAULT_CONFIG).unwrap();
            let toml_str = toml::to_string(&config).unwrap();
            let mut file = File::create(&path).unwrap();
            file.write_all(toml_str.as_bytes()).unwrap();
        }

        // Load the config
        let conf_str: String = std::fs::read_to_string(&path).unwrap();
        let setting: Result<super::Config, toml::de::Error> = toml::from_str(&conf_str);

        match setting {
            Ok(conf) => conf,
            Err(e) => panic!("Failed to parse TOML: {}", e),
        }
    }

    /// Saves a configuration file to the given directory.
    ///
    /// # Arguments
    ///
    /// * `dir` - The directory where the configuration file should be saved.
    /// * `conf` - The configuration data to be saved.
    ///
    pub fn save(dir: &str, conf: super::Config) {
        let toml_str = toml::to_string(&conf).unwrap();
        let path = crate::module::util::path::join(&[dir, define::path::CONF_FILE]);
        let mut file = File::create(path).unwrap();
        file.write_all(toml_str.as_bytes()).unwrap();
    }
}

/// Represents the configuration data structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub system: System,
    pub camera: Camera,
    pub pin: Pin,
    pub display: Display,
    pub preprocess: Preprocess,
    pub roi: Roi,
    pub segmentation: Segmentation,
    pub classification: Classification,
    pub runtime: Runtime,
}

impl Config {
    /// The built-in default template, also written on first run.
    pub fn template() -> Self {
        ::toml::from_str(DEFAULT_CONFIG).unwrap()
    }
}

/// Represents system-related configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct System {
    pub persistent_dir: String,
    pub ephemeral_dir: String,
    pub log_level: String,
}

/// Represents camera-related configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Camera {
    pub video_idx: i8,
    pub width: u16,
    pub height: u16,
    pub grab_times: u8,
    pub capture_budget_ms: u64,
}

/// Represents pin-related configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Pin {
    pub button_pin: u8,
    pub light_pin: u8,
}

/// Represents display-related configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Display {
    pub enabled: bool,
    pub i2c_addr: u16,
    pub brightness: u8,
}

/// Represents preprocessing-related configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Preprocess {
    pub work_width: u32,
    pub white_percentile: f32,
    pub denoise_radius: u32,
}

/// Represents ROI-localization configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Roi {
    pub saturation_min: f32,
    pub value_max: f32,
    pub lead_thickness: u8,
    pub min_elongation: f32,
    pub min_area_frac: f32,
    pub max_area_frac: f32,
    pub min_confidence: f32,
}

/// Represents band-segmentation configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Segmentation {
    pub end_margin: f32,
    pub smooth_window: usize,
    pub min_band_width: u32,
}

/// Represents color-classification configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Classification {
    pub min_confidence: f32,
}

/// Represents runtime configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Runtime {
    pub budget_ms: u64,
    pub debug: bool,
}

// Default configuration data in TOML format
const DEFAULT_CONFIG: &str = r#"
[system]
  persistent_dir = '/data' # Directory for persistent data
  ephemeral_dir = '/run/user/1000' # Directory for ephemeral data
  log_level = 'INFO' # Log level (e.g., 'INFO', 'DEBUG')

[camera]
  video_idx = 0 # V4L2 device index
  width = 640 # Capture width
  height = 480 # Capture height
  grab_times = 2 # Frames grabbed per capture to flush stale buffers
  capture_budget_ms = 400 # Sub-budget for the blocking capture call

[pin]
  button_pin = 17 # Trigger button pin (BCM)
  light_pin = 27 # Illumination LED pin (BCM)

[display]
  enabled = true # Render results on the segment display
  i2c_addr = 112 # HT16K33 address (0x70)
  brightness = 8 # Display brightness (0-15)

[preprocess]
  work_width = 320 # Working resolution width, aspect preserved
  white_percentile = 0.99 # Brightest percentile mapped to neutral white
  denoise_radius = 1 # Median filter radius

[roi]
  saturation_min = 0.20 # Foreground gate: saturation above this
  value_max = 0.85 # Foreground gate: value below this
  lead_thickness = 3 # Distance-transform threshold for lead removal
  min_elongation = 2.0 # Reject candidates below this long/short axis ratio
  min_area_frac = 0.005 # Plausible candidate area, fraction of frame
  max_area_frac = 0.40 # Plausible candidate area, fraction of frame
  min_confidence = 0.2 # Reject localizations below this confidence

[segmentation]
  end_margin = 0.07 # Body-end fraction ignored on each side
  smooth_window = 9 # Moving-average window for the column profile
  min_band_width = 3 # Minimum band width in working pixels

[classification]
  min_confidence = 0.25 # Reject band labels below this confidence

[runtime]
  budget_ms = 800 # Wall-clock deadline for a full run
  debug = false # Persist intermediate artifacts
"#;
