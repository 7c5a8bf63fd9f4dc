use crate::events::{CameraEvent, EventBus, FailureReason};
use crate::geometry::Size;
use crate::orientation::Facing;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Callbacks for the presentation layer.
///
/// Invoked from the bridge task, one event at a time and in publish order.
pub trait CameraListener: Send + Sync {
    /// A still was captured; `image_bytes` is a JPEG
    fn on_image_capture(&self, image_bytes: &[u8]);

    fn on_camera_fail(&self, reason: &FailureReason);

    /// Preview is running at `preview` for the current viewport
    fn on_camera_ready(&self, _facing: Facing, _preview: Size) {}
}

/// Forward listener events to `listener` until the bus is dropped or the task is aborted.
///
/// Reads the bus's lossless listener feed, so a slow listener delays its
/// callbacks but never misses one.
pub fn spawn_listener_bridge(
    event_bus: &EventBus,
    listener: Arc<dyn CameraListener>,
) -> JoinHandle<()> {
    let mut receiver = event_bus.subscribe_listener();

    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            dispatch(listener.as_ref(), event);
        }
        debug!("Camera listener bridge stopped");
    })
}

fn dispatch(listener: &dyn CameraListener, event: CameraEvent) {
    match event {
        CameraEvent::ImageCaptured { image } => listener.on_image_capture(&image.bytes),
        CameraEvent::CameraFailed { reason, .. } => listener.on_camera_fail(&reason),
        CameraEvent::Ready {
            facing, preview, ..
        } => listener.on_camera_ready(facing, preview),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturedImage;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl CameraListener for Recorder {
        fn on_image_capture(&self, image_bytes: &[u8]) {
            self.calls.lock().push(format!("image:{}", image_bytes.len()));
        }

        fn on_camera_fail(&self, reason: &FailureReason) {
            self.calls.lock().push(format!("fail:{}", reason));
        }
    }

    #[tokio::test]
    async fn test_bridge_forwards_listener_events() {
        let bus = EventBus::new(16);
        let recorder = Arc::new(Recorder::default());
        let bridge = spawn_listener_bridge(&bus, recorder.clone());

        bus.publish(CameraEvent::CameraFailed {
            facing: Facing::Front,
            reason: FailureReason::NoCamera,
        })
        .unwrap();
        bus.publish(CameraEvent::OrientationChanged {
            display_rotation: 0,
            output_rotation: 0,
        })
        .unwrap();
        bus.publish(CameraEvent::Ready {
            facing: Facing::Front,
            preview: Size::new(640, 480),
            display_rotation: 90,
        })
        .unwrap();
        bus.publish(CameraEvent::ImageCaptured {
            image: CapturedImage {
                job_id: 1,
                bytes: Arc::new(vec![0xff, 0xd8, 0xff]),
                width: 1,
                height: 1,
                rotation: 0,
                captured_at: Utc::now(),
            },
        })
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while recorder.calls.lock().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(
            *recorder.calls.lock(),
            vec!["fail:no camera".to_string(), "image:3".to_string()]
        );
        bridge.abort();
    }

    #[tokio::test]
    async fn test_bridge_survives_event_flood() {
        let bus = EventBus::new(16);
        let _observer = bus.subscribe();
        let recorder = Arc::new(Recorder::default());
        let bridge = spawn_listener_bridge(&bus, recorder.clone());

        // Published before the bridge task first runs, far beyond the bus capacity
        bus.publish(CameraEvent::CameraFailed {
            facing: Facing::Back,
            reason: FailureReason::NoCamera,
        })
        .unwrap();
        for i in 0..200u32 {
            bus.publish(CameraEvent::OrientationChanged {
                display_rotation: (i % 4) * 90,
                output_rotation: 0,
            })
            .unwrap();
        }
        bus.publish(CameraEvent::ImageCaptured {
            image: CapturedImage {
                job_id: 7,
                bytes: Arc::new(vec![0xff; 5]),
                width: 1,
                height: 1,
                rotation: 0,
                captured_at: Utc::now(),
            },
        })
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while recorder.calls.lock().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(
            *recorder.calls.lock(),
            vec!["fail:no camera".to_string(), "image:5".to_string()]
        );
        bridge.abort();
    }
}
