use super::*;
use crate::error::CameraError;
use crate::frame::FrameFormat;
use crate::geometry::{Rect, Size};
use crate::orientation::Facing;
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn test_dual_backend_info() {
    let backend = MockCameraBackend::dual();

    assert_eq!(backend.camera_count(), 2);
    assert_eq!(backend.camera_info(Facing::Back).unwrap().sensor_orientation, 90);
    assert_eq!(backend.camera_info(Facing::Front).unwrap().sensor_orientation, 270);

    let single = MockCameraBackend::single_back();
    assert_eq!(single.camera_count(), 1);
    assert!(single.camera_info(Facing::Front).is_none());
    assert!(matches!(
        single.open(Facing::Front),
        Err(CameraError::NoSuchCamera { facing: Facing::Front })
    ));
}

#[test]
fn test_second_open_is_refused() {
    let backend = MockCameraBackend::dual();

    let first = backend.open(Facing::Back).unwrap();
    assert_eq!(backend.open_count(), 1);
    assert!(matches!(backend.open(Facing::Front), Err(CameraError::InUse)));
    assert_eq!(backend.max_concurrent_open(), 1);

    first.release().unwrap();
    assert_eq!(backend.open_count(), 0);

    let second = backend.open(Facing::Front).unwrap();
    second.release().unwrap();
    assert_eq!(backend.total_opens(), 2);
    assert_eq!(backend.total_releases(), 2);
    assert_eq!(backend.open_history(), vec![Facing::Back, Facing::Front]);
}

#[test]
fn test_injected_open_failures() {
    let backend = MockCameraBackend::dual();
    backend.fail_next_opens(2);

    assert!(matches!(
        backend.open(Facing::Back),
        Err(CameraError::DeviceOpen { .. })
    ));
    assert!(backend.open(Facing::Back).is_err());
    assert!(backend.open(Facing::Back).is_ok());
    assert_eq!(backend.total_opens(), 1);
}

#[test]
fn test_release_failure_still_frees_hardware() {
    let backend = MockCameraBackend::dual();
    backend.set_fail_release(true);

    let device = backend.open(Facing::Back).unwrap();
    assert!(matches!(device.release(), Err(CameraError::Release { .. })));
    assert_eq!(backend.open_count(), 0);

    // Releasing twice is harmless
    assert!(device.release().is_ok());
    assert!(backend.open(Facing::Back).is_ok());
}

#[test]
fn test_parameters_after_release_fail() {
    let backend = MockCameraBackend::dual();
    let device = backend.open(Facing::Back).unwrap();
    device.release().unwrap();

    assert_eq!(device.start_preview(), Err(CameraError::NotOpen));
    assert_eq!(device.set_display_rotation(90), Err(CameraError::NotOpen));
}

#[test]
fn test_preview_size_and_focus_parameters() {
    let backend = MockCameraBackend::dual();
    let device = backend.open(Facing::Back).unwrap();

    assert_eq!(device.preview_size(), Size::new(640, 480));
    device.set_preview_size(Size::new(1920, 1080)).unwrap();
    assert_eq!(device.preview_size(), Size::new(1920, 1080));
    assert!(device.set_preview_size(Size::new(123, 45)).is_err());

    let capabilities = device.capabilities();
    assert!(capabilities.supports_focus_areas());
    assert_eq!(
        capabilities.preferred_continuous_mode(),
        Some(FocusMode::ContinuousPicture)
    );

    device.set_focus_mode(FocusMode::Auto).unwrap();
    device
        .set_focus_areas(Some(Rect::new(-10, -10, 10, 10)), None)
        .unwrap();
    device.auto_focus().unwrap();

    let inspect = backend.last_device().unwrap();
    assert_eq!(inspect.focus_mode(), Some(FocusMode::Auto));
    assert_eq!(inspect.focus_areas(), (Some(Rect::new(-10, -10, 10, 10)), None));
    assert_eq!(inspect.autofocus_runs(), 1);

    backend.set_fail_parameters(true);
    assert!(device.set_output_rotation(90).is_err());
}

#[test]
fn test_continuous_mode_fallback() {
    let capabilities = CameraCapabilities {
        preview_sizes: vec![Size::new(640, 480)],
        max_focus_areas: 0,
        max_metering_areas: 0,
        focus_modes: vec![FocusMode::ContinuousVideo, FocusMode::Fixed],
    };
    assert!(!capabilities.supports_focus_areas());
    assert_eq!(
        capabilities.preferred_continuous_mode(),
        Some(FocusMode::ContinuousVideo)
    );
}

#[test]
fn test_one_shot_frame_delivery() {
    let backend = MockCameraBackend::dual().with_frame_delay(Duration::from_millis(1));
    let device = backend.open(Facing::Back).unwrap();
    device.set_preview_size(Size::new(320, 240)).unwrap();

    let (tx, rx) = mpsc::channel();
    device
        .set_one_shot_preview_callback(Box::new(move |frame| {
            let _ = tx.send(frame);
        }))
        .unwrap();

    // Nothing arrives until the preview runs
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

    device.start_preview().unwrap();
    let frame = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(frame.size(), Size::new(320, 240));
    assert_eq!(frame.format, FrameFormat::Nv21);
    assert_eq!(frame.data.len(), frame.expected_size());
    assert_eq!(backend.frames_delivered(), 1);
}

#[test]
fn test_release_drops_pending_callback() {
    let backend = MockCameraBackend::dual();
    let device = backend.open(Facing::Back).unwrap();

    let (tx, rx) = mpsc::channel::<crate::frame::FrameData>();
    device
        .set_one_shot_preview_callback(Box::new(move |frame| {
            let _ = tx.send(frame);
        }))
        .unwrap();
    device.release().unwrap();

    // The sender was dropped with the callback
    assert!(matches!(
        rx.recv_timeout(Duration::from_secs(1)),
        Err(mpsc::RecvTimeoutError::Disconnected)
    ));
}

#[test]
fn test_synthetic_frame_layout() {
    let data = synthetic_nv21(Size::new(4, 2), 0);
    assert_eq!(data.len(), 12);
    assert_eq!(&data[..8], &[0, 1, 2, 3, 1, 2, 3, 4]);
    assert!(data[8..].iter().all(|&b| b == 128));
}
