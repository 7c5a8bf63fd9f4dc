use crate::orientation::Facing;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuickcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl QuickcamError {
    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the camera hardware layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("No {facing} camera present")]
    NoSuchCamera { facing: Facing },

    #[error("Failed to open {facing} camera: {details}")]
    DeviceOpen { facing: Facing, details: String },

    #[error("Camera is already in use by another handle")]
    InUse,

    #[error("Camera is not open")]
    NotOpen,

    #[error("Camera parameter update failed: {details}")]
    Parameters { details: String },

    #[error("Camera preview error: {details}")]
    Preview { details: String },

    #[error("Camera release failed: {details}")]
    Release { details: String },
}

/// Errors raised while turning a raw preview frame into an encoded image
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Raw frame decode failed: {details}")]
    Decode { details: String },

    #[error("Crop rectangle {details} does not intersect the frame")]
    EmptyCrop { details: String },

    #[error("JPEG encoding failed: {details}")]
    JpegEncoding { details: String },

    #[error("Capture cancelled: {details}")]
    Cancelled { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, QuickcamError>;
