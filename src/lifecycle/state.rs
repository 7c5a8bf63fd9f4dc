use crate::camera::{CameraCapabilities, CameraDevice, CameraInfo};
use crate::orientation::Facing;
use std::sync::Arc;

/// Lifecycle states of the camera handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// The open camera, held in the manager's handle slot
#[derive(Clone)]
pub(crate) struct OpenCamera {
    pub device: Arc<dyn CameraDevice>,
    pub info: CameraInfo,
    pub capabilities: CameraCapabilities,
    /// Incremented on every successful open; stale tasks compare against it
    pub session: u64,
}

impl OpenCamera {
    pub fn facing(&self) -> Facing {
        self.info.facing
    }
}

/// Requests issued from the presentation side, guarded by one lock so a
/// facing swap can submit its close and open back to back
#[derive(Debug)]
pub(crate) struct LifecycleRequests {
    pub started: bool,
    pub facing: Facing,
    /// Sequence number of the most recent open request
    pub open_seq: u64,
}

/// Operations executed in order by the lifecycle worker
pub(crate) enum LifecycleCommand {
    Open { facing: Facing, request: u64 },
    Close,
    ConfigurePreview { session: u64 },
    DeviceRotation(crate::orientation::DeviceRotation),
    OrientationAngle(u32),
    Focus,
    Barrier(tokio::sync::oneshot::Sender<()>),
}

impl LifecycleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleCommand::Open { .. } => "open",
            LifecycleCommand::Close => "close",
            LifecycleCommand::ConfigurePreview { .. } => "configure_preview",
            LifecycleCommand::DeviceRotation(_) => "device_rotation",
            LifecycleCommand::OrientationAngle(_) => "orientation_angle",
            LifecycleCommand::Focus => "focus",
            LifecycleCommand::Barrier(_) => "barrier",
        }
    }
}
