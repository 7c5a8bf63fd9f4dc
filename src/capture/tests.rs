use super::*;
use crate::camera::{CameraBackend, MockCameraBackend, MockCameraSpec};
use crate::config::{CaptureConfig, QuickcamConfig};
use crate::error::CaptureError;
use crate::events::{CameraEvent, EventBus};
use crate::frame::{FrameData, FrameFormat};
use crate::geometry::{Rect, Size};
use crate::lifecycle::ResourceLifecycleManager;
use crate::orientation::Facing;
use image::ImageFormat;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::time::timeout;

fn small_backend() -> MockCameraBackend {
    let mut spec = MockCameraSpec::phone(Facing::Back, 90);
    spec.capabilities.preview_sizes = vec![Size::new(320, 240), Size::new(160, 120)];
    spec.default_preview = Size::new(160, 120);
    MockCameraBackend::new(vec![spec])
}

struct Harness {
    backend: Arc<MockCameraBackend>,
    lifecycle: ResourceLifecycleManager,
    pipeline: CapturePipeline,
    events: broadcast::Receiver<CameraEvent>,
}

fn harness(backend: MockCameraBackend) -> Harness {
    let backend = Arc::new(backend);
    let bus = Arc::new(EventBus::new(256));
    let events = bus.subscribe();
    let lifecycle = ResourceLifecycleManager::new(
        Arc::clone(&backend) as Arc<dyn CameraBackend>,
        &QuickcamConfig::default(),
        Arc::clone(&bus),
        Facing::Back,
    );
    let pipeline = CapturePipeline::new(lifecycle.clone(), bus, &CaptureConfig::default());

    Harness {
        backend,
        lifecycle,
        pipeline,
        events,
    }
}

async fn wait_idle(pipeline: &CapturePipeline) {
    timeout(Duration::from_secs(5), async {
        while pipeline.is_capturing() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("capture did not finish");
}

async fn next_image(events: &mut broadcast::Receiver<CameraEvent>) -> CapturedImage {
    timeout(Duration::from_secs(5), async {
        loop {
            if let CameraEvent::ImageCaptured { image } = events.recv().await.unwrap() {
                return image;
            }
        }
    })
    .await
    .expect("no image captured")
}

async fn wait_ready(events: &mut broadcast::Receiver<CameraEvent>) {
    timeout(Duration::from_secs(5), async {
        while !matches!(events.recv().await.unwrap(), CameraEvent::Ready { .. }) {}
    })
    .await
    .expect("camera never became ready")
}

fn count_images(events: &mut broadcast::Receiver<CameraEvent>) -> usize {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CameraEvent::ImageCaptured { .. }) {
            count += 1;
        }
    }
    count
}

#[test]
fn test_cropped_rect_matching_aspect() {
    let rect = get_cropped_rect(Size::new(1920, 1080), Rect::from_size(1280, 720), 0);
    assert_eq!(rect, Rect::new(0, 0, 1920, 1080));
}

#[test]
fn test_cropped_rect_square_viewport() {
    let rect = get_cropped_rect(Size::new(1920, 1080), Rect::from_size(1000, 1000), 0);
    assert_eq!(rect, Rect::new(420, 0, 1500, 1080));
}

#[test]
fn test_cropped_rect_quarter_turn() {
    // Portrait viewport over a landscape sensor rotated 90 degrees
    let rect = get_cropped_rect(Size::new(1920, 1080), Rect::from_size(1080, 1920), 90);
    assert_eq!(rect, Rect::new(0, 0, 1080, 1920));
}

#[test]
fn test_cropped_rect_truncates_toward_zero() {
    let rect = get_cropped_rect(Size::new(641, 481), Rect::from_size(100, 100), 0);
    assert_eq!(rect, Rect::new(79, 0, 560, 480));
}

#[test]
fn test_cropped_rect_fits_and_keeps_aspect() {
    let previews = [
        Size::new(1920, 1080),
        Size::new(1280, 720),
        Size::new(640, 480),
        Size::new(641, 481),
    ];
    let viewports = [
        Rect::from_size(1080, 1920),
        Rect::from_size(720, 1280),
        Rect::from_size(400, 300),
        Rect::from_size(500, 500),
        Rect::new(10, 20, 310, 820),
    ];

    for preview in previews {
        for visible in viewports {
            for rotation in [0, 90, 180, 270] {
                let rect = get_cropped_rect(preview, visible, rotation);
                let (on_sensor, oriented) = if rotation % 180 != 0 {
                    (rect.transposed(), visible.transposed())
                } else {
                    (rect, visible)
                };

                let bounds = Rect::from_size(preview.width as i32, preview.height as i32);
                assert!(
                    bounds.contains_rect(&on_sensor),
                    "{} escapes {} for {} at {}",
                    on_sensor,
                    bounds,
                    visible,
                    rotation
                );

                let expected = oriented.width() as f32 / oriented.height() as f32;
                let actual = on_sensor.width() as f32 / on_sensor.height() as f32;
                assert!(
                    (expected - actual).abs() < 0.02,
                    "aspect {} vs {} for {} at {}",
                    actual,
                    expected,
                    visible,
                    rotation
                );
            }
        }
    }
}

#[test]
fn test_nv21_neutral_chroma_is_gray() {
    let mut data = vec![100u8; 4 * 2];
    data.extend_from_slice(&[128u8; 4]);

    let rgb = nv21_to_rgb(&data, 4, 2).unwrap();
    assert_eq!(rgb.dimensions(), (4, 2));
    assert!(rgb.pixels().all(|p| p.0 == [100, 100, 100]));
}

#[test]
fn test_nv21_truncated_buffer_rejected() {
    let result = nv21_to_rgb(&[0u8; 10], 4, 4);
    assert!(matches!(result, Err(CaptureError::Decode { .. })));
}

#[test]
fn test_create_from_nv21_rotates_then_crops() {
    let size = Size::new(64, 48);
    let frame = FrameData::new(
        1,
        SystemTime::now(),
        crate::camera::synthetic_nv21(size, 0),
        size.width,
        size.height,
        FrameFormat::Nv21,
    );

    let (bytes, out) = create_from_nv21(&frame, 90, Rect::new(0, 8, 48, 56), 80).unwrap();
    assert_eq!(out, Size::new(48, 48));

    let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (48, 48));
}

#[test]
fn test_create_from_nv21_clamps_crop() {
    let size = Size::new(32, 16);
    let frame = FrameData::new(
        2,
        SystemTime::now(),
        crate::camera::synthetic_nv21(size, 3),
        size.width,
        size.height,
        FrameFormat::Nv21,
    );

    let (_, out) = create_from_nv21(&frame, 0, Rect::new(-4, -4, 100, 8), 80).unwrap();
    assert_eq!(out, Size::new(32, 8));

    let outside = create_from_nv21(&frame, 0, Rect::new(40, 40, 60, 60), 80);
    assert!(matches!(outside, Err(CaptureError::EmptyCrop { .. })));
}

#[test]
fn test_create_from_rgb_frame() {
    let frame = FrameData::new(
        3,
        SystemTime::now(),
        vec![200u8; 8 * 4 * 3],
        8,
        4,
        FrameFormat::Rgb24,
    );

    let (bytes, out) = create_from_nv21(&frame, 270, Rect::from_size(4, 8), 90).unwrap();
    assert_eq!(out, Size::new(4, 8));

    let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (4, 8));

    let short = FrameData::new(4, SystemTime::now(), vec![0u8; 10], 8, 4, FrameFormat::Rgb24);
    assert!(matches!(
        create_from_nv21(&short, 0, Rect::from_size(8, 4), 90),
        Err(CaptureError::Decode { .. })
    ));
}

#[tokio::test]
async fn test_take_picture_rejected_when_closed() {
    let mut h = harness(small_backend());

    assert!(!h.pipeline.take_picture(Rect::from_size(240, 320)));
    assert_eq!(h.pipeline.state(), CaptureState::Idle);
    assert_eq!(count_images(&mut h.events), 0);
}

#[tokio::test]
async fn test_single_capture_while_busy() {
    let mut h = harness(small_backend());

    h.lifecycle.set_viewport(240, 320);
    h.lifecycle.resume(Facing::Back);
    wait_ready(&mut h.events).await;

    assert!(h.pipeline.take_picture(Rect::from_size(240, 320)));
    assert!(!h.pipeline.take_picture(Rect::from_size(240, 320)));

    let image = next_image(&mut h.events).await;
    assert_eq!(image.job_id, 1);
    assert_eq!(image.rotation, 90);
    assert_eq!((image.width, image.height), (240, 320));

    let decoded = image::load_from_memory_with_format(&image.bytes, ImageFormat::Jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (240, 320));

    wait_idle(&h.pipeline).await;
    assert_eq!(count_images(&mut h.events), 0);

    // Idle again, a new capture is accepted
    assert!(h.pipeline.take_picture(Rect::from_size(240, 320)));
    let image = next_image(&mut h.events).await;
    assert_eq!(image.job_id, 2);
}

#[tokio::test]
async fn test_capture_waits_for_viewport() {
    let mut h = harness(small_backend());

    h.lifecycle.resume(Facing::Back);
    h.lifecycle.settled().await;

    assert!(h.pipeline.take_picture(Rect::from_size(240, 320)));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(h.pipeline.state(), CaptureState::FrameRequested);

    h.lifecycle.set_viewport(240, 320);
    let image = next_image(&mut h.events).await;
    // The frame may arrive before or after the preview is renegotiated
    assert_eq!(image.width * 4, image.height * 3);
}

#[tokio::test]
async fn test_corrupt_frame_returns_to_idle() {
    let mut h = harness(small_backend());
    h.backend.set_corrupt_frames(true);

    h.lifecycle.set_viewport(240, 320);
    h.lifecycle.resume(Facing::Back);
    h.lifecycle.settled().await;

    assert!(h.pipeline.take_picture(Rect::from_size(240, 320)));
    wait_idle(&h.pipeline).await;

    assert_eq!(h.backend.frames_delivered(), 1);
    assert_eq!(count_images(&mut h.events), 0);
}

#[tokio::test]
async fn test_pause_cancels_pending_capture() {
    let mut h = harness(small_backend());

    h.lifecycle.resume(Facing::Back);
    h.lifecycle.settled().await;

    assert!(h.pipeline.take_picture(Rect::from_size(240, 320)));
    h.lifecycle.pause();
    h.lifecycle.settled().await;

    wait_idle(&h.pipeline).await;
    assert_eq!(h.backend.frames_delivered(), 0);
    assert_eq!(count_images(&mut h.events), 0);
}

#[tokio::test]
async fn test_rejected_while_processing() {
    let mut h = harness(MockCameraBackend::single_back());

    h.lifecycle.set_viewport(480, 640);
    h.lifecycle.resume(Facing::Back);
    wait_ready(&mut h.events).await;
    assert_eq!(h.lifecycle.preview_size(), Some(Size::new(960, 720)));

    assert!(h.pipeline.take_picture(Rect::from_size(480, 640)));
    timeout(Duration::from_secs(5), async {
        while h.pipeline.state() != CaptureState::Processing {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("capture never reached processing");

    assert!(!h.pipeline.take_picture(Rect::from_size(480, 640)));

    let image = next_image(&mut h.events).await;
    assert_eq!(image.job_id, 1);
    wait_idle(&h.pipeline).await;
    assert_eq!(count_images(&mut h.events), 0);
    assert_eq!(h.backend.frames_delivered(), 1);
}

#[tokio::test]
async fn test_rotation_frozen_when_frame_arrives() {
    let mut h = harness(small_backend().with_frame_delay(Duration::from_millis(20)));

    h.lifecycle.set_viewport(240, 320);
    h.lifecycle.resume(Facing::Back);
    wait_ready(&mut h.events).await;
    assert_eq!(h.lifecycle.orientation().map(|o| o.output_rotation), Some(90));

    assert!(h.pipeline.take_picture(Rect::from_size(240, 320)));
    // Leaves FrameRequested only once the frame callback has run
    timeout(Duration::from_secs(5), async {
        while h.pipeline.state() == CaptureState::FrameRequested {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("frame never arrived");

    h.lifecycle.notify_orientation_angle(170);
    h.lifecycle.settled().await;
    assert_eq!(h.lifecycle.orientation().map(|o| o.output_rotation), Some(270));

    let image = next_image(&mut h.events).await;
    assert_eq!(image.rotation, 90);
    assert_eq!((image.width, image.height), (240, 320));
}
