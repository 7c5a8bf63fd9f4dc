use super::manager::LifecycleShared;
use super::state::{HandleState, LifecycleCommand, OpenCamera};
use crate::camera::{CameraBackend, CameraCapabilities, CameraDevice, FocusMode};
use crate::config::QuickcamConfig;
use crate::error::CameraError;
use crate::events::{CameraEvent, EventBus};
use crate::focus::FocusCoordinateMapper;
use crate::orientation::{DeviceRotation, Facing, OrientationState};
use crate::preview;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Drains the lifecycle queue one operation at a time.
///
/// Each native call runs on the blocking pool and is awaited before the next
/// operation starts, so at most one camera handle is ever open.
pub(crate) struct LifecycleWorker {
    shared: Arc<LifecycleShared>,
    backend: Arc<dyn CameraBackend>,
    event_bus: Arc<EventBus>,
    mapper: FocusCoordinateMapper,
    aspect_tolerance: f64,
    /// Used by post-open tasks; never keeps the worker alive
    commands: mpsc::WeakUnboundedSender<LifecycleCommand>,
    next_session: u64,
    device_rotation: DeviceRotation,
    orientation_angle: Option<u32>,
    /// Session for which `Ready` was already published
    ready_session: Option<u64>,
}

impl LifecycleWorker {
    pub fn new(
        shared: Arc<LifecycleShared>,
        backend: Arc<dyn CameraBackend>,
        event_bus: Arc<EventBus>,
        config: &QuickcamConfig,
        commands: mpsc::WeakUnboundedSender<LifecycleCommand>,
    ) -> Self {
        Self {
            shared,
            backend,
            event_bus,
            mapper: FocusCoordinateMapper::new(&config.focus),
            aspect_tolerance: config.preview.aspect_tolerance,
            commands,
            next_session: 0,
            device_rotation: DeviceRotation::default(),
            orientation_angle: None,
            ready_session: None,
        }
    }

    pub async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<LifecycleCommand>) {
        debug!("Camera lifecycle worker started");

        while let Some(command) = receiver.recv().await {
            trace!("Running lifecycle operation: {}", command.name());
            match command {
                LifecycleCommand::Open { facing, request } => self.open(facing, request).await,
                LifecycleCommand::Close => self.close().await,
                LifecycleCommand::ConfigurePreview { session } => {
                    self.configure_preview(session).await
                }
                LifecycleCommand::DeviceRotation(rotation) => {
                    self.device_rotation = rotation;
                    self.refresh_orientation().await;
                }
                LifecycleCommand::OrientationAngle(angle) => {
                    self.orientation_angle = Some(angle);
                    self.refresh_orientation().await;
                }
                LifecycleCommand::Focus => self.apply_focus().await,
                LifecycleCommand::Barrier(done) => {
                    let _ = done.send(());
                }
            }
        }

        // Every manager handle is gone
        self.close().await;
        debug!("Camera lifecycle worker stopped");
    }

    async fn open(&mut self, facing: Facing, request: u64) {
        if let Some(session) = self.shared.session() {
            debug!(
                "Open of {} camera skipped, session {} still open",
                facing, session
            );
            return;
        }

        self.transition(HandleState::Opening, facing);

        let backend = Arc::clone(&self.backend);
        let opened = run_blocking("open", move || {
            let info = backend
                .camera_info(facing)
                .ok_or(CameraError::NoSuchCamera { facing })?;
            let device = backend.open(facing)?;
            let capabilities = device.capabilities();
            Ok::<_, CameraError>((info, device, capabilities))
        })
        .await
        .unwrap_or_else(|| {
            Err(CameraError::DeviceOpen {
                facing,
                details: "open task did not complete".to_string(),
            })
        });

        let (info, device, capabilities) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.fail_open(facing, request, &e);
                return;
            }
        };

        let orientation = OrientationState::resolve(
            info.sensor_orientation,
            facing,
            self.device_rotation,
            self.orientation_angle,
        );

        let configured = {
            let device = Arc::clone(&device);
            let capabilities = capabilities.clone();
            run_blocking("configure", move || {
                configure_opened(device.as_ref(), &capabilities, &orientation)
            })
            .await
            .unwrap_or(Err(CameraError::Preview {
                details: "configure task did not complete".to_string(),
            }))
        };

        if let Err(e) = configured {
            warn!("Failed to start {} camera preview: {}", facing, e);
            release_device(device, facing).await;
            self.fail_open(facing, request, &e);
            return;
        }

        self.next_session += 1;
        let session = self.next_session;
        *self.shared.handle.lock() = Some(OpenCamera {
            device,
            info,
            capabilities,
            session,
        });
        *self.shared.orientation.write() = Some(orientation);

        info!(
            "Opened {} camera (session {}, display rotation {}, output rotation {})",
            facing, session, orientation.display_rotation, orientation.output_rotation
        );
        self.transition(HandleState::Open, facing);
        self.publish(CameraEvent::OrientationChanged {
            display_rotation: orientation.display_rotation,
            output_rotation: orientation.output_rotation,
        });

        self.spawn_post_initialization(session);
    }

    fn fail_open(&mut self, facing: Facing, request: u64, error: &CameraError) {
        warn!("Tried to open {} camera but failed: {}", facing, error);
        self.shared.clear_started_if_current(request);
        self.transition(HandleState::Closed, facing);
        self.publish(CameraEvent::CameraFailed {
            facing,
            reason: error.into(),
        });
    }

    /// Wait off the queue for the viewport, then schedule preview negotiation
    fn spawn_post_initialization(&self, session: u64) {
        let shared = Arc::clone(&self.shared);
        let commands = self.commands.clone();

        tokio::spawn(async move {
            match shared.wait_until_ready(session).await {
                Ok(viewport) => {
                    debug!("Session {} ready for viewport {}", session, viewport);
                    if let Some(commands) = commands.upgrade() {
                        let _ = commands.send(LifecycleCommand::ConfigurePreview { session });
                    }
                }
                Err(e) => debug!("Post-initialization of session {} skipped: {}", session, e),
            }
        });
    }

    async fn close(&mut self) {
        let Some(camera) = self.shared.handle.lock().take() else {
            debug!("Close skipped, no camera open");
            return;
        };
        let facing = camera.facing();

        self.transition(HandleState::Closing, facing);
        release_device(camera.device, facing).await;

        *self.shared.orientation.write() = None;
        *self.shared.preview.write() = None;
        self.shared.pending_tap.lock().take();
        self.ready_session = None;

        self.transition(HandleState::Closed, facing);
    }

    fn current_camera(&self, session: u64) -> Option<OpenCamera> {
        self.shared
            .handle
            .lock()
            .as_ref()
            .filter(|camera| camera.session == session)
            .cloned()
    }

    async fn configure_preview(&mut self, session: u64) {
        let Some(camera) = self.current_camera(session) else {
            trace!("Preview configuration for stale session {} skipped", session);
            return;
        };

        let viewport = *self.shared.viewport.borrow();
        if viewport.is_empty() {
            debug!("Preview configuration deferred, viewport not measured");
            return;
        }

        let Some(size) = preview::negotiate_with_tolerance(
            &camera.capabilities.preview_sizes,
            viewport.width,
            viewport.height,
            self.aspect_tolerance,
        ) else {
            warn!("{} camera reports no preview sizes", camera.facing());
            return;
        };

        if *self.shared.preview.read() != Some(size) {
            let device = Arc::clone(&camera.device);
            let applied = run_blocking("set_preview_size", move || {
                if device.preview_size() == size {
                    return Ok(());
                }
                if let Err(e) = device.stop_preview() {
                    debug!("stop_preview before resize failed: {}", e);
                }
                let resized = device.set_preview_size(size);
                let restarted = device.start_preview();
                resized.and(restarted)
            })
            .await;

            match applied {
                Some(Ok(())) => {
                    info!("Preview size {} chosen for viewport {}", size, viewport);
                    *self.shared.preview.write() = Some(size);
                }
                Some(Err(e)) => {
                    warn!("Failed to apply preview size {}: {}", size, e);
                    return;
                }
                None => return,
            }
        }

        if self.ready_session != Some(session) {
            self.ready_session = Some(session);
            let display_rotation = self
                .shared
                .orientation
                .read()
                .map(|o| o.display_rotation)
                .unwrap_or_default();
            self.publish(CameraEvent::Ready {
                facing: camera.facing(),
                preview: size,
                display_rotation,
            });
        }
    }

    /// Recompute rotations from the latest device rotation and sensor angle
    async fn refresh_orientation(&mut self) {
        let Some(camera) = self.shared.handle.lock().clone() else {
            trace!("Orientation recorded for the next open");
            return;
        };

        let previous = *self.shared.orientation.read();
        let updated = OrientationState::resolve(
            camera.info.sensor_orientation,
            camera.facing(),
            self.device_rotation,
            self.orientation_angle,
        );
        *self.shared.orientation.write() = Some(updated);

        let display_changed = previous.map_or(true, |p| p.display_rotation != updated.display_rotation);
        let output_changed = previous.map_or(true, |p| p.output_rotation != updated.output_rotation);
        if !display_changed && !output_changed {
            return;
        }

        let device = Arc::clone(&camera.device);
        run_blocking("orientation", move || {
            if display_changed {
                let _ = device.stop_preview();
                if let Err(e) = device.set_display_rotation(updated.display_rotation) {
                    warn!("Failed to set display rotation: {}", e);
                }
                if let Err(e) = device.start_preview() {
                    warn!("Failed to restart preview after rotation: {}", e);
                }
            }
            if output_changed {
                if let Err(e) = device.set_output_rotation(updated.output_rotation) {
                    warn!("Exception updating camera parameters in orientation change: {}", e);
                }
            }
        })
        .await;

        self.publish(CameraEvent::OrientationChanged {
            display_rotation: updated.display_rotation,
            output_rotation: updated.output_rotation,
        });
    }

    async fn apply_focus(&mut self) {
        let Some((x, y)) = self.shared.pending_tap.lock().take() else {
            return;
        };
        let Some(camera) = self.shared.handle.lock().clone() else {
            debug!("Tap dropped, camera closed");
            return;
        };
        let Some(preview) = *self.shared.preview.read() else {
            debug!("Tap dropped, preview not configured yet");
            return;
        };
        let display_rotation = self
            .shared
            .orientation
            .read()
            .map(|o| o.display_rotation)
            .unwrap_or_default();

        let Some(request) =
            self.mapper
                .map(x, y, preview, display_rotation, &camera.capabilities)
        else {
            return;
        };

        let capabilities = camera.capabilities.clone();
        let device = Arc::clone(&camera.device);
        let applied = run_blocking("focus", move || {
            device.cancel_auto_focus();
            let focus = (capabilities.max_focus_areas > 0).then_some(request.focus_rect);
            let metering = (capabilities.max_metering_areas > 0).then_some(request.metering_rect);
            if focus.is_some() && capabilities.supports_focus_mode(FocusMode::Auto) {
                device.set_focus_mode(FocusMode::Auto)?;
            }
            device.set_focus_areas(focus, metering)?;
            device.auto_focus()
        })
        .await;

        match applied {
            Some(Ok(())) => self.publish(CameraEvent::FocusRequested { request }),
            Some(Err(e)) => warn!("Failed to apply focus areas: {}", e),
            None => {}
        }
    }

    fn transition(&self, to: HandleState, facing: Facing) {
        let from = self.shared.state.send_replace(to);
        debug!("{} camera {:?} -> {:?}", facing, from, to);
        self.publish(CameraEvent::StateChanged {
            from,
            to,
            facing,
            timestamp: SystemTime::now(),
        });
    }

    fn publish(&self, event: CameraEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            warn!("Failed to publish camera event: {}", e);
        }
    }
}

/// Continuous focus, display rotation and output rotation, then start preview
fn configure_opened(
    device: &dyn CameraDevice,
    capabilities: &CameraCapabilities,
    orientation: &OrientationState,
) -> Result<(), CameraError> {
    if let Some(mode) = capabilities.preferred_continuous_mode() {
        if let Err(e) = device.set_focus_mode(mode) {
            warn!("Failed to enable {:?} focus: {}", mode, e);
        }
    }

    device.set_display_rotation(orientation.display_rotation)?;
    if let Err(e) = device.set_output_rotation(orientation.output_rotation) {
        warn!("Exception updating camera parameters in orientation change: {}", e);
    }

    device.start_preview()
}

async fn release_device(device: Arc<dyn CameraDevice>, facing: Facing) {
    run_blocking("release", move || {
        if let Err(e) = device.stop_preview() {
            debug!("stop_preview before release failed: {}", e);
        }
        match device.release() {
            Ok(()) => info!("Released {} camera", facing),
            Err(e) => warn!("Releasing {} camera failed: {}", facing, e),
        }
    })
    .await;
}

/// Run a native camera call on the blocking pool, `None` if it panicked
async fn run_blocking<T, F>(operation: &'static str, f: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Camera {} task failed: {}", operation, e);
            None
        }
    }
}
