pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod focus;
pub mod frame;
pub mod geometry;
pub mod lifecycle;
pub mod listener;
pub mod orientation;
pub mod preview;
pub mod quick_camera;

pub use camera::{
    CameraBackend, CameraCapabilities, CameraDevice, CameraInfo, FocusMode, MockCameraBackend,
    MockCameraSpec,
};
pub use capture::{get_cropped_rect, CapturePipeline, CaptureState, CapturedImage};
pub use config::QuickcamConfig;
pub use error::{CameraError, CaptureError, QuickcamError, Result};
pub use events::{CameraEvent, EventBus, FailureReason};
pub use focus::{FocusCoordinateMapper, FocusRequest};
pub use frame::{FrameData, FrameFormat};
pub use geometry::{Rect, Size};
pub use lifecycle::{HandleState, ResourceLifecycleManager};
pub use listener::CameraListener;
pub use orientation::{DeviceRotation, Facing, OrientationState};
pub use quick_camera::{QuickCamera, QuickCameraBuilder};
