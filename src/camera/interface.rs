use crate::error::CameraError;
use crate::frame::FrameData;
use crate::geometry::{Rect, Size};
use crate::orientation::Facing;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback invoked with the next preview frame, at most once
pub type FrameCallback = Box<dyn FnOnce(FrameData) + Send + 'static>;

/// Autofocus behaviour of an open camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusMode {
    /// Single sweep triggered by `auto_focus`, honours focus areas
    Auto,
    /// Continuous autofocus tuned for stills
    ContinuousPicture,
    /// Continuous autofocus tuned for video
    ContinuousVideo,
    /// Fixed focus lens
    Fixed,
}

/// Static description of one physical camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraInfo {
    pub facing: Facing,
    /// Clockwise mounting angle of the sensor relative to the natural device orientation
    pub sensor_orientation: u32,
}

/// Capability descriptor reported by an open camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraCapabilities {
    pub preview_sizes: Vec<Size>,
    pub max_focus_areas: u32,
    pub max_metering_areas: u32,
    pub focus_modes: Vec<FocusMode>,
}

impl CameraCapabilities {
    /// True when a tap can steer either focus or metering
    pub fn supports_focus_areas(&self) -> bool {
        self.max_focus_areas > 0 || self.max_metering_areas > 0
    }

    pub fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        self.focus_modes.contains(&mode)
    }

    /// Continuous mode to run while no tap is active, picture mode preferred
    pub fn preferred_continuous_mode(&self) -> Option<FocusMode> {
        [FocusMode::ContinuousPicture, FocusMode::ContinuousVideo]
            .into_iter()
            .find(|mode| self.supports_focus_mode(*mode))
    }
}

/// An open camera handle.
///
/// Every method may block on the underlying hardware and must not be called
/// from the presentation thread.
pub trait CameraDevice: Send + Sync {
    fn capabilities(&self) -> CameraCapabilities;

    /// Preview size currently configured on the hardware
    fn preview_size(&self) -> Size;

    fn set_preview_size(&self, size: Size) -> Result<(), CameraError>;

    fn set_display_rotation(&self, degrees: u32) -> Result<(), CameraError>;

    /// Rotation tagged onto captured stills
    fn set_output_rotation(&self, degrees: u32) -> Result<(), CameraError>;

    fn set_focus_mode(&self, mode: FocusMode) -> Result<(), CameraError>;

    /// Replace the focus and metering areas, `None` leaves that kind unset
    fn set_focus_areas(
        &self,
        focus: Option<Rect>,
        metering: Option<Rect>,
    ) -> Result<(), CameraError>;

    fn auto_focus(&self) -> Result<(), CameraError>;

    fn cancel_auto_focus(&self);

    fn start_preview(&self) -> Result<(), CameraError>;

    fn stop_preview(&self) -> Result<(), CameraError>;

    /// Deliver the next preview frame to `callback`.
    ///
    /// A pending callback is dropped without being called when the handle is released.
    fn set_one_shot_preview_callback(&self, callback: FrameCallback) -> Result<(), CameraError>;

    /// Release the hardware. The handle is unusable afterwards even when this fails.
    fn release(&self) -> Result<(), CameraError>;
}

/// Entry point to the platform camera service
pub trait CameraBackend: Send + Sync {
    /// Number of physical cameras
    fn camera_count(&self) -> usize;

    fn camera_info(&self, facing: Facing) -> Option<CameraInfo>;

    /// Acquire exclusive access to the camera with the given facing
    fn open(&self, facing: Facing) -> Result<Arc<dyn CameraDevice>, CameraError>;
}
