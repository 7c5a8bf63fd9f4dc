use crate::camera::CameraBackend;
use crate::capture::CapturePipeline;
use crate::config::QuickcamConfig;
use crate::error::{QuickcamError, Result};
use crate::events::{CameraEvent, EventBus};
use crate::geometry::Rect;
use crate::lifecycle::ResourceLifecycleManager;
use crate::listener::{spawn_listener_bridge, CameraListener};
use crate::orientation::{DeviceRotation, Facing};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Camera preview with tap-to-focus and still capture.
///
/// Composes the lifecycle manager, which owns the hardware handle, with the
/// capture pipeline. Every method returns immediately; results arrive through
/// the event bus and the optional [`CameraListener`].
pub struct QuickCamera {
    config: QuickcamConfig,
    event_bus: Arc<EventBus>,
    lifecycle: ResourceLifecycleManager,
    capture: CapturePipeline,
    listener_bridge: Mutex<Option<JoinHandle<()>>>,
}

impl QuickCamera {
    pub fn builder() -> QuickCameraBuilder {
        QuickCameraBuilder::new()
    }

    /// Open the camera with the current facing
    pub fn on_resume(&self) {
        self.lifecycle.resume(self.lifecycle.facing());
    }

    pub fn on_pause(&self) {
        self.lifecycle.pause();
    }

    /// Switch between the front and back cameras
    pub fn swap_camera(&self) {
        self.lifecycle.swap_facing();
    }

    pub fn is_multi_camera(&self) -> bool {
        self.lifecycle.is_multi_camera()
    }

    pub fn is_rear_camera(&self) -> bool {
        self.lifecycle.facing() == Facing::Back
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    /// The preview surface was laid out at `width` x `height`
    pub fn on_viewport_measured(&self, width: u32, height: u32) {
        self.lifecycle.set_viewport(width, height);
    }

    /// Focus and meter around a tap in view coordinates.
    ///
    /// Returns `false` when the open camera has no focus or metering areas.
    pub fn on_tap(&self, x: f32, y: f32) -> bool {
        self.lifecycle.focus_on_tap(x, y)
    }

    /// Capture the part of the next frame shown in `viewport_rect`
    pub fn take_picture(&self, viewport_rect: Rect) -> bool {
        self.capture.take_picture(viewport_rect)
    }

    pub fn on_device_rotation(&self, rotation: DeviceRotation) {
        self.lifecycle.notify_device_rotation(rotation);
    }

    /// Raw orientation sensor angle; negative when unknown
    pub fn on_orientation_changed(&self, angle: i32) {
        self.lifecycle.notify_orientation_angle(angle);
    }

    /// Route captures, failures and readiness to `listener`, replacing any previous one
    pub fn set_listener(&self, listener: Arc<dyn CameraListener>) {
        let bridge = spawn_listener_bridge(&self.event_bus, listener);
        if let Some(previous) = self.listener_bridge.lock().replace(bridge) {
            previous.abort();
        }
        debug!("Camera listener attached");
    }

    pub fn clear_listener(&self) {
        if let Some(bridge) = self.listener_bridge.lock().take() {
            bridge.abort();
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.event_bus.subscribe()
    }

    /// Resolves once every queued lifecycle operation has run
    pub async fn settled(&self) {
        self.lifecycle.settled().await;
    }

    pub fn lifecycle(&self) -> &ResourceLifecycleManager {
        &self.lifecycle
    }

    pub fn capture(&self) -> &CapturePipeline {
        &self.capture
    }

    pub fn config(&self) -> &QuickcamConfig {
        &self.config
    }
}

impl Drop for QuickCamera {
    fn drop(&mut self) {
        self.clear_listener();
    }
}

/// Builder for [`QuickCamera`]; `build` must run inside a tokio runtime
#[derive(Default)]
pub struct QuickCameraBuilder {
    config: Option<QuickcamConfig>,
    backend: Option<Arc<dyn CameraBackend>>,
    event_bus: Option<Arc<EventBus>>,
}

impl QuickCameraBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: QuickcamConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CameraBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<QuickCamera> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let backend = self.backend.ok_or_else(|| {
            QuickcamError::component("quick_camera_builder", "Camera backend must be specified")
        })?;
        let event_bus = self
            .event_bus
            .unwrap_or_else(|| Arc::new(EventBus::new(config.system.event_bus_capacity)));

        let camera_count = backend.camera_count();
        let initial_facing = if config.camera.prefer_front_when_available && camera_count > 1 {
            Facing::Front
        } else {
            config.camera.default_facing
        };
        info!(
            "Camera service reports {} camera(s), starting with {} facing",
            camera_count, initial_facing
        );

        let lifecycle = ResourceLifecycleManager::new(
            backend,
            &config,
            Arc::clone(&event_bus),
            initial_facing,
        );
        let capture =
            CapturePipeline::new(lifecycle.clone(), Arc::clone(&event_bus), &config.capture);

        Ok(QuickCamera {
            config,
            event_bus,
            lifecycle,
            capture,
            listener_bridge: Mutex::new(None),
        })
    }
}
