use crate::orientation::Facing;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct QuickcamConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Facing opened on first resume
    #[serde(default = "default_facing")]
    pub default_facing: Facing,

    /// Start on the front camera when the device has more than one
    #[serde(default = "default_prefer_front")]
    pub prefer_front_when_available: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PreviewConfig {
    /// Maximum aspect ratio deviation for preview size candidates
    #[serde(default = "default_aspect_tolerance")]
    pub aspect_tolerance: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FocusConfig {
    /// Focus area side is the longer preview edge divided by this
    #[serde(default = "default_area_divisor")]
    pub area_divisor: u32,

    /// Metering area side relative to the focus area side
    #[serde(default = "default_metering_scale")]
    pub metering_scale: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// JPEG quality for captured stills (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl QuickcamConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.default_facing", "back")?
            .set_default(
                "camera.prefer_front_when_available",
                default_prefer_front(),
            )?
            .set_default("preview.aspect_tolerance", default_aspect_tolerance())?
            .set_default("focus.area_divisor", default_area_divisor())?
            .set_default("focus.metering_scale", default_metering_scale() as f64)?
            .set_default("capture.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with QUICKCAM_ prefix
            .add_source(
                Environment::with_prefix("QUICKCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: QuickcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.preview.aspect_tolerance > 0.0) {
            return Err(ConfigError::Message(
                "Preview aspect_tolerance must be greater than 0".to_string(),
            ));
        }

        if self.focus.area_divisor == 0 {
            return Err(ConfigError::Message(
                "Focus area_divisor must be greater than 0".to_string(),
            ));
        }

        if !(self.focus.metering_scale >= 1.0) {
            return Err(ConfigError::Message(
                "Focus metering_scale must be at least 1.0".to_string(),
            ));
        }

        if self.capture.jpeg_quality == 0 || self.capture.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Capture jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_facing: default_facing(),
            prefer_front_when_available: default_prefer_front(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            aspect_tolerance: default_aspect_tolerance(),
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            area_divisor: default_area_divisor(),
            metering_scale: default_metering_scale(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

// Default value functions
fn default_facing() -> Facing {
    Facing::Back
}
fn default_prefer_front() -> bool {
    true
}
fn default_aspect_tolerance() -> f64 {
    crate::preview::DEFAULT_ASPECT_TOLERANCE
}
fn default_area_divisor() -> u32 {
    8
}
fn default_metering_scale() -> f32 {
    1.5
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_event_bus_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = QuickcamConfig::default();
        assert_eq!(config.camera.default_facing, Facing::Back);
        assert!(config.camera.prefer_front_when_available);
        assert_eq!(config.preview.aspect_tolerance, 0.1);
        assert_eq!(config.focus.area_divisor, 8);
        assert_eq!(config.focus.metering_scale, 1.5);
        assert_eq!(config.capture.jpeg_quality, 80);
        assert_eq!(config.system.event_bus_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = QuickcamConfig::default();
        config.capture.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = QuickcamConfig::default();
        config.focus.area_divisor = 0;
        assert!(config.validate().is_err());

        let mut config = QuickcamConfig::default();
        config.focus.metering_scale = 0.5;
        assert!(config.validate().is_err());

        let mut config = QuickcamConfig::default();
        config.preview.aspect_tolerance = 0.0;
        assert!(config.validate().is_err());

        let mut config = QuickcamConfig::default();
        config.system.event_bus_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[camera]
default_facing = "front"
prefer_front_when_available = false

[capture]
jpeg_quality = 95
"#
        )
        .unwrap();

        let config = QuickcamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.camera.default_facing, Facing::Front);
        assert!(!config.camera.prefer_front_when_available);
        assert_eq!(config.capture.jpeg_quality, 95);
        // Untouched sections keep their defaults
        assert_eq!(config.focus.area_divisor, 8);
        assert_eq!(config.preview.aspect_tolerance, 0.1);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = QuickcamConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.capture.jpeg_quality, 80);
        assert_eq!(config.camera.default_facing, Facing::Back);
    }

    #[test]
    fn test_default_config_serializes() {
        let text = toml::to_string_pretty(&QuickcamConfig::default()).unwrap();
        assert!(text.contains("default_facing = \"back\""));
        assert!(text.contains("jpeg_quality = 80"));
    }
}
