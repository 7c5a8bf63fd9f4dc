//! Sensor/display rotation math.
//!
//! The display rotation is applied to the live preview so it appears upright
//! for the current device rotation. The output rotation is applied to the
//! captured still and is derived from the finer-grained orientation angle
//! when one is available.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which physical camera sensor is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    /// The opposite sensor
    pub fn toggled(self) -> Self {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Back => write!(f, "back"),
        }
    }
}

/// Coarse four-way rotation of the display relative to its natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceRotation {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl DeviceRotation {
    /// Get rotation angle in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            DeviceRotation::Rotate0 => 0,
            DeviceRotation::Rotate90 => 90,
            DeviceRotation::Rotate180 => 180,
            DeviceRotation::Rotate270 => 270,
        }
    }

    /// Parse a right angle, `None` for anything else
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(DeviceRotation::Rotate0),
            90 => Some(DeviceRotation::Rotate90),
            180 => Some(DeviceRotation::Rotate180),
            270 => Some(DeviceRotation::Rotate270),
            _ => None,
        }
    }
}

/// Rotation to apply to the preview for a given sensor mounting and device rotation.
///
/// Front sensors are mirrored, so their rotation is compensated in the opposite
/// direction.
pub fn display_rotation(sensor_orientation: u32, facing: Facing, device_degrees: u32) -> u32 {
    let sensor = sensor_orientation % 360;
    let device = device_degrees % 360;

    match facing {
        Facing::Front => (360 - (sensor + device) % 360) % 360,
        Facing::Back => (sensor + 360 - device) % 360,
    }
}

/// Round a raw orientation angle to the nearest right angle, in `[0, 360)`
pub fn round_orientation(angle: u32) -> u32 {
    ((angle + 45) / 90 * 90) % 360
}

/// Rotation to tag or apply to a captured still for a raw orientation angle
pub fn output_rotation(sensor_orientation: u32, facing: Facing, orientation_angle: u32) -> u32 {
    display_rotation(
        sensor_orientation,
        facing,
        round_orientation(orientation_angle % 360),
    )
}

/// Orientation of the currently open camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationState {
    pub sensor_orientation: u32,
    pub device_rotation: DeviceRotation,
    pub facing: Facing,
    pub display_rotation: u32,
    pub output_rotation: u32,
}

impl OrientationState {
    /// Compute both rotations from scratch.
    ///
    /// Without a raw orientation angle the coarse device rotation stands in for it.
    pub fn resolve(
        sensor_orientation: u32,
        facing: Facing,
        device_rotation: DeviceRotation,
        orientation_angle: Option<u32>,
    ) -> Self {
        let angle = orientation_angle.unwrap_or_else(|| device_rotation.degrees());

        Self {
            sensor_orientation,
            device_rotation,
            facing,
            display_rotation: display_rotation(sensor_orientation, facing, device_rotation.degrees()),
            output_rotation: output_rotation(sensor_orientation, facing, angle),
        }
    }
}
