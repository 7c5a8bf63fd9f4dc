use super::state::{HandleState, LifecycleCommand, LifecycleRequests, OpenCamera};
use super::worker::LifecycleWorker;
use crate::camera::{CameraBackend, FrameCallback};
use crate::config::QuickcamConfig;
use crate::error::{CameraError, CaptureError};
use crate::events::EventBus;
use crate::frame::FrameData;
use crate::geometry::Size;
use crate::orientation::{DeviceRotation, Facing, OrientationState};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, trace, warn};

/// State shared between the manager handles, the lifecycle worker and
/// background tasks. Only the worker writes the handle slot, orientation and
/// preview geometry.
pub(crate) struct LifecycleShared {
    pub handle: Mutex<Option<OpenCamera>>,
    pub state: watch::Sender<HandleState>,
    pub viewport: watch::Sender<Size>,
    pub orientation: RwLock<Option<OrientationState>>,
    pub preview: RwLock<Option<Size>>,
    pub requests: Mutex<LifecycleRequests>,
    /// Latest unhandled tap; a newer tap replaces it
    pub pending_tap: Mutex<Option<(f32, f32)>>,
}

impl LifecycleShared {
    fn new(initial_facing: Facing) -> Self {
        let (state, _) = watch::channel(HandleState::Closed);
        let (viewport, _) = watch::channel(Size::ZERO);

        Self {
            handle: Mutex::new(None),
            state,
            viewport,
            orientation: RwLock::new(None),
            preview: RwLock::new(None),
            requests: Mutex::new(LifecycleRequests {
                started: false,
                facing: initial_facing,
                open_seq: 0,
            }),
            pending_tap: Mutex::new(None),
        }
    }

    /// Session of the open camera, if any
    pub fn session(&self) -> Option<u64> {
        self.handle.lock().as_ref().map(|camera| camera.session)
    }

    /// Forget the started flag after a failed open, unless a newer resume superseded it
    pub fn clear_started_if_current(&self, request: u64) {
        let mut requests = self.requests.lock();
        if requests.started && requests.open_seq == request {
            requests.started = false;
        }
    }

    /// Wait until `session` is open and the viewport has been measured.
    ///
    /// Resolves with the viewport size, or fails with `Cancelled` once the
    /// session is closed, which callers treat as a skipped task.
    pub async fn wait_until_ready(&self, session: u64) -> Result<Size, CaptureError> {
        let mut state_rx = self.state.subscribe();
        let mut viewport_rx = self.viewport.subscribe();

        loop {
            let state = *state_rx.borrow_and_update();
            let viewport = *viewport_rx.borrow_and_update();

            if state != HandleState::Open || self.session() != Some(session) {
                return Err(CaptureError::Cancelled {
                    details: format!("camera session {} is no longer open", session),
                });
            }
            if !viewport.is_empty() {
                return Ok(viewport);
            }

            trace!("Waiting for viewport measurement (session {})", session);
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return Err(CaptureError::Cancelled {
                            details: "lifecycle state channel closed".to_string(),
                        });
                    }
                }
                changed = viewport_rx.changed() => {
                    if changed.is_err() {
                        return Err(CaptureError::Cancelled {
                            details: "viewport channel closed".to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// Owns the single camera handle and serializes every open, configure and
/// close on one worker task.
///
/// All operations return immediately; the native calls run on the worker.
/// Cloning yields another handle to the same worker. The worker releases the
/// camera and exits once every clone is dropped.
#[derive(Clone)]
pub struct ResourceLifecycleManager {
    shared: Arc<LifecycleShared>,
    commands: mpsc::UnboundedSender<LifecycleCommand>,
    backend: Arc<dyn CameraBackend>,
}

impl ResourceLifecycleManager {
    /// Create the manager and spawn its worker on the current tokio runtime
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        config: &QuickcamConfig,
        event_bus: Arc<EventBus>,
        initial_facing: Facing,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(LifecycleShared::new(initial_facing));

        let worker = LifecycleWorker::new(
            Arc::clone(&shared),
            Arc::clone(&backend),
            event_bus,
            config,
            commands.downgrade(),
        );
        tokio::spawn(worker.run(receiver));

        Self {
            shared,
            commands,
            backend,
        }
    }

    fn submit(&self, command: LifecycleCommand) {
        let name = command.name();
        if self.commands.send(command).is_err() {
            error!("Lifecycle worker has stopped, dropping {} operation", name);
        }
    }

    /// Open the camera with the given facing. No-op if already started.
    pub fn resume(&self, facing: Facing) {
        let mut requests = self.shared.requests.lock();
        if requests.started {
            debug!("resume() ignored, camera already started");
            return;
        }

        requests.started = true;
        requests.facing = facing;
        requests.open_seq += 1;
        info!("resume() queued for {} camera", facing);
        self.submit(LifecycleCommand::Open {
            facing,
            request: requests.open_seq,
        });
    }

    /// Release the camera. No-op if not started.
    pub fn pause(&self) {
        let mut requests = self.shared.requests.lock();
        if !requests.started {
            debug!("pause() ignored, camera not started");
            return;
        }

        requests.started = false;
        info!("pause() queued");
        self.submit(LifecycleCommand::Close);
    }

    /// Switch to the other camera by closing and reopening.
    ///
    /// Both operations are submitted under the request lock so nothing can be
    /// queued between them.
    pub fn swap_facing(&self) {
        if self.backend.camera_count() < 2 {
            warn!("swap_facing() ignored, device has a single camera");
            return;
        }

        let mut requests = self.shared.requests.lock();
        let next = requests.facing.toggled();

        if requests.started {
            self.submit(LifecycleCommand::Close);
        }
        requests.started = true;
        requests.facing = next;
        requests.open_seq += 1;
        info!("swap_facing() queued, switching to {} camera", next);
        self.submit(LifecycleCommand::Open {
            facing: next,
            request: requests.open_seq,
        });
    }

    /// Record the measured viewport and renegotiate the preview for it
    pub fn set_viewport(&self, width: u32, height: u32) {
        let viewport = Size::new(width, height);
        let previous = self.shared.viewport.send_replace(viewport);
        if previous == viewport {
            return;
        }

        debug!("Viewport measured at {}", viewport);
        if let Some(session) = self.shared.session() {
            self.submit(LifecycleCommand::ConfigurePreview { session });
        }
    }

    /// Coarse display rotation changed; may be called from any thread
    pub fn notify_device_rotation(&self, rotation: DeviceRotation) {
        self.submit(LifecycleCommand::DeviceRotation(rotation));
    }

    /// Fine-grained orientation sensor reading in degrees; negative means unknown
    pub fn notify_orientation_angle(&self, angle: i32) {
        if angle < 0 {
            trace!("Ignoring unknown orientation reading");
            return;
        }
        self.submit(LifecycleCommand::OrientationAngle(angle.rem_euclid(360) as u32));
    }

    /// Request focus at a view-space point.
    ///
    /// Returns whether the open camera supports focus or metering areas.
    /// Only the most recent tap is applied when several arrive before the
    /// worker gets to them.
    pub fn focus_on_tap(&self, x: f32, y: f32) -> bool {
        let supported = self
            .shared
            .handle
            .lock()
            .as_ref()
            .is_some_and(|camera| camera.capabilities.supports_focus_areas());
        if !supported {
            return false;
        }

        let mut pending = self.shared.pending_tap.lock();
        if pending.replace((x, y)).is_none() {
            self.submit(LifecycleCommand::Focus);
        }
        true
    }

    /// Resolves once every operation submitted before this call has run
    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        self.submit(LifecycleCommand::Barrier(tx));
        let _ = rx.await;
    }

    pub fn state(&self) -> HandleState {
        *self.shared.state.borrow()
    }

    /// Watch lifecycle state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<HandleState> {
        self.shared.state.subscribe()
    }

    /// Facing of the most recent resume or swap
    pub fn facing(&self) -> Facing {
        self.shared.requests.lock().facing
    }

    pub fn is_started(&self) -> bool {
        self.shared.requests.lock().started
    }

    pub fn is_multi_camera(&self) -> bool {
        self.backend.camera_count() > 1
    }

    /// Negotiated preview size of the open camera
    pub fn preview_size(&self) -> Option<Size> {
        *self.shared.preview.read()
    }

    pub fn orientation(&self) -> Option<OrientationState> {
        *self.shared.orientation.read()
    }

    pub fn viewport(&self) -> Size {
        *self.shared.viewport.borrow()
    }

    pub(crate) fn session(&self) -> Option<u64> {
        self.shared.session()
    }

    pub(crate) async fn wait_until_ready(&self, session: u64) -> Result<Size, CaptureError> {
        self.shared.wait_until_ready(session).await
    }

    /// Register a one-shot frame callback on the open camera of `session`.
    ///
    /// `on_frame` runs on the delivering thread with the orientation in effect
    /// when the frame arrived. It is dropped without being called if the
    /// session closed in the meantime.
    pub(crate) fn request_preview_frame<F>(&self, session: u64, on_frame: F) -> Result<(), CameraError>
    where
        F: FnOnce(FrameData, OrientationState) + Send + 'static,
    {
        let device = self
            .shared
            .handle
            .lock()
            .as_ref()
            .filter(|camera| camera.session == session)
            .map(|camera| Arc::clone(&camera.device))
            .ok_or(CameraError::NotOpen)?;

        // Weak, the callback is stored on a device the shared slot owns
        let shared = Arc::downgrade(&self.shared);
        let callback: FrameCallback = Box::new(move |frame| {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if shared.session() != Some(session) {
                trace!("Frame {} arrived after session {} closed", frame.id, session);
                return;
            }
            let Some(orientation) = *shared.orientation.read() else {
                trace!("Frame {} arrived without a resolved orientation", frame.id);
                return;
            };
            on_frame(frame, orientation);
        });

        device.set_one_shot_preview_callback(callback)
    }
}
