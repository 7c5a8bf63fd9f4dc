use super::crop::get_cropped_rect;
use super::encode::create_from_nv21;
use crate::config::CaptureConfig;
use crate::events::{CameraEvent, EventBus};
use crate::geometry::{Rect, Size};
use crate::lifecycle::{HandleState, ResourceLifecycleManager};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Progress of the outstanding capture job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    FrameRequested,
    FrameReceived,
    Processing,
}

/// A cropped, rotated and JPEG-encoded still
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub job_id: u64,
    pub bytes: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation applied to the raw frame
    pub rotation: u32,
    pub captured_at: DateTime<Utc>,
}

/// Geometry frozen the moment the frame arrives
#[derive(Debug, Clone, Copy)]
struct CaptureSnapshot {
    preview: Size,
    rotation: u32,
    crop: Rect,
}

/// Captures one preview frame at a time and turns it into a JPEG
#[derive(Clone)]
pub struct CapturePipeline {
    lifecycle: ResourceLifecycleManager,
    event_bus: Arc<EventBus>,
    state: Arc<Mutex<CaptureState>>,
    next_job: Arc<AtomicU64>,
    jpeg_quality: u8,
    runtime: Handle,
}

impl CapturePipeline {
    /// Must be called from within a tokio runtime
    pub fn new(
        lifecycle: ResourceLifecycleManager,
        event_bus: Arc<EventBus>,
        config: &CaptureConfig,
    ) -> Self {
        Self {
            lifecycle,
            event_bus,
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            next_job: Arc::new(AtomicU64::new(0)),
            jpeg_quality: config.jpeg_quality,
            runtime: Handle::current(),
        }
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    pub fn is_capturing(&self) -> bool {
        self.state() != CaptureState::Idle
    }

    /// Capture the region of the next preview frame matching `viewport_rect`.
    ///
    /// Returns `false` without side effects when the camera is not open or a
    /// capture is already outstanding. The result is published as
    /// `ImageCaptured`; failures are logged and publish nothing.
    pub fn take_picture(&self, viewport_rect: Rect) -> bool {
        if self.lifecycle.state() != HandleState::Open {
            warn!("take_picture() ignored, camera not in capture-ready state");
            return false;
        }
        let Some(session) = self.lifecycle.session() else {
            warn!("take_picture() ignored, camera not in capture-ready state");
            return false;
        };

        {
            let mut state = self.state.lock();
            if *state != CaptureState::Idle {
                warn!("take_picture() called while previous capture pending");
                return false;
            }
            *state = CaptureState::FrameRequested;
        }

        let job_id = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Capture {} requested for {}", job_id, viewport_rect);

        let pipeline = self.clone();
        self.runtime.spawn(async move {
            let captured = pipeline.run_job(job_id, session, viewport_rect).await;
            pipeline.set_state(CaptureState::Idle);

            if let Some(image) = captured {
                if let Err(e) = pipeline
                    .event_bus
                    .publish(CameraEvent::ImageCaptured { image })
                {
                    warn!("Failed to publish captured image: {}", e);
                }
            }
        });

        true
    }

    fn set_state(&self, state: CaptureState) {
        *self.state.lock() = state;
    }

    async fn run_job(&self, job_id: u64, session: u64, viewport_rect: Rect) -> Option<CapturedImage> {
        if let Err(e) = self.lifecycle.wait_until_ready(session).await {
            debug!("Capture {} skipped: {}", job_id, e);
            return None;
        }

        let (tx, rx) = oneshot::channel();
        let state = Arc::clone(&self.state);
        let requested = self
            .lifecycle
            .request_preview_frame(session, move |frame, orientation| {
                let preview = frame.size();
                let rotation = orientation.output_rotation;
                let snapshot = CaptureSnapshot {
                    preview,
                    rotation,
                    crop: get_cropped_rect(preview, viewport_rect, rotation),
                };
                *state.lock() = CaptureState::FrameReceived;
                let _ = tx.send((frame, snapshot));
            });
        if let Err(e) = requested {
            warn!("Capture {} could not request a preview frame: {}", job_id, e);
            return None;
        }

        // The sender is dropped unused when the session closes first
        let Ok((frame, snapshot)) = rx.await else {
            debug!("Capture {} dropped, camera released before a frame arrived", job_id);
            return None;
        };
        debug!(
            "Capture {}: preview {}, rotation {}, crop {}",
            job_id, snapshot.preview, snapshot.rotation, snapshot.crop
        );

        self.set_state(CaptureState::Processing);
        let quality = self.jpeg_quality;
        let processed = tokio::task::spawn_blocking(move || {
            create_from_nv21(&frame, snapshot.rotation, snapshot.crop, quality)
        })
        .await;

        match processed {
            Ok(Ok((bytes, size))) => {
                info!(
                    "Capture {} encoded {} ({} bytes)",
                    job_id,
                    size,
                    bytes.len()
                );
                Some(CapturedImage {
                    job_id,
                    bytes: Arc::new(bytes),
                    width: size.width,
                    height: size.height,
                    rotation: snapshot.rotation,
                    captured_at: Utc::now(),
                })
            }
            Ok(Err(e)) => {
                warn!("Capture {} failed: {}", job_id, e);
                None
            }
            Err(e) => {
                error!("Capture {} processing task failed: {}", job_id, e);
                None
            }
        }
    }
}
