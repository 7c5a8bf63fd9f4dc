mod interface;
mod mock;
#[cfg(test)]
mod tests;

pub use interface::{
    CameraBackend, CameraCapabilities, CameraDevice, CameraInfo, FocusMode, FrameCallback,
};
pub use mock::{synthetic_nv21, MockCameraBackend, MockCameraDevice, MockCameraSpec};
