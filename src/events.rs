use crate::capture::CapturedImage;
use crate::error::{CameraError, EventBusError};
use crate::focus::FocusRequest;
use crate::geometry::Size;
use crate::lifecycle::HandleState;
use crate::orientation::Facing;
use parking_lot::Mutex;
use std::fmt;
use std::time::SystemTime;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Why the camera could not be opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The requested facing does not exist on this device
    NoCamera,
    /// The hardware refused or failed to open
    Unavailable { details: String },
}

impl From<&CameraError> for FailureReason {
    fn from(error: &CameraError) -> Self {
        match error {
            CameraError::NoSuchCamera { .. } => FailureReason::NoCamera,
            other => FailureReason::Unavailable {
                details: other.to_string(),
            },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoCamera => write!(f, "no camera"),
            FailureReason::Unavailable { details } => write!(f, "camera unavailable: {}", details),
        }
    }
}

/// Events published by the camera core
#[derive(Debug, Clone)]
pub enum CameraEvent {
    /// The camera handle moved between lifecycle states
    StateChanged {
        from: HandleState,
        to: HandleState,
        facing: Facing,
        timestamp: SystemTime,
    },
    /// Preview is configured for the current viewport
    Ready {
        facing: Facing,
        preview: Size,
        display_rotation: u32,
    },
    /// The camera could not be opened
    CameraFailed {
        facing: Facing,
        reason: FailureReason,
    },
    /// Display or output rotation changed on the open camera
    OrientationChanged {
        display_rotation: u32,
        output_rotation: u32,
    },
    /// A tap was mapped and applied to the hardware
    FocusRequested { request: FocusRequest },
    /// A still was captured, cropped and encoded
    ImageCaptured { image: CapturedImage },
}

impl CameraEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CameraEvent::StateChanged {
                from, to, facing, ..
            } => format!("{} camera {:?} -> {:?}", facing, from, to),
            CameraEvent::Ready {
                facing, preview, ..
            } => format!("{} camera ready with preview {}", facing, preview),
            CameraEvent::CameraFailed { facing, reason } => {
                format!("{} camera failed: {}", facing, reason)
            }
            CameraEvent::OrientationChanged {
                display_rotation,
                output_rotation,
            } => format!(
                "Orientation changed: display {} output {}",
                display_rotation, output_rotation
            ),
            CameraEvent::FocusRequested { request } => {
                format!("Focus requested at {}", request.focus_rect)
            }
            CameraEvent::ImageCaptured { image } => format!(
                "Image {} captured ({}x{}, {} bytes)",
                image.job_id,
                image.width,
                image.height,
                image.bytes.len()
            ),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            CameraEvent::StateChanged { .. } => "state_changed",
            CameraEvent::Ready { .. } => "ready",
            CameraEvent::CameraFailed { .. } => "camera_failed",
            CameraEvent::OrientationChanged { .. } => "orientation_changed",
            CameraEvent::FocusRequested { .. } => "focus_requested",
            CameraEvent::ImageCaptured { .. } => "image_captured",
        }
    }

    /// Events that map to a listener callback and must never be dropped
    pub fn is_listener_event(&self) -> bool {
        matches!(
            self,
            CameraEvent::Ready { .. } | CameraEvent::CameraFailed { .. } | CameraEvent::ImageCaptured { .. }
        )
    }
}

/// Event bus for delivering camera events using a broadcast channel.
///
/// Broadcast subscribers may lag and skip events. Listener feeds are
/// unbounded and receive every listener event in publish order.
pub struct EventBus {
    sender: broadcast::Sender<CameraEvent>,
    listener_feeds: Mutex<Vec<mpsc::UnboundedSender<CameraEvent>>>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            listener_feeds: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.sender.subscribe()
    }

    /// Lossless feed of listener events; dropped receivers are pruned on the next publish
    pub fn subscribe_listener(&self) -> mpsc::UnboundedReceiver<CameraEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listener_feeds.lock().push(tx);
        rx
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: CameraEvent) -> Result<usize, EventBusError> {
        match &event {
            CameraEvent::CameraFailed { facing, reason } => {
                warn!("{} camera failed: {}", facing, reason);
            }
            CameraEvent::Ready { .. } | CameraEvent::ImageCaptured { .. } => {
                info!("{}", event.description());
            }
            _ => debug!("Event {}: {}", event.event_type(), event.description()),
        }

        if event.is_listener_event() {
            self.listener_feeds
                .lock()
                .retain(|feed| feed.send(event.clone()).is_ok());
        }

        if self.subscriber_count() == 0 {
            return Ok(0);
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
