use super::interface::{
    CameraBackend, CameraCapabilities, CameraDevice, CameraInfo, FocusMode, FrameCallback,
};
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use crate::geometry::{Rect, Size};
use crate::orientation::Facing;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

/// Description of one simulated camera
#[derive(Debug, Clone)]
pub struct MockCameraSpec {
    pub info: CameraInfo,
    pub capabilities: CameraCapabilities,
    pub default_preview: Size,
}

impl MockCameraSpec {
    /// Typical phone sensor: landscape sizes, one focus and one metering area
    pub fn phone(facing: Facing, sensor_orientation: u32) -> Self {
        Self {
            info: CameraInfo {
                facing,
                sensor_orientation,
            },
            capabilities: CameraCapabilities {
                preview_sizes: vec![
                    Size::new(1920, 1080),
                    Size::new(1280, 720),
                    Size::new(960, 720),
                    Size::new(640, 480),
                    Size::new(320, 240),
                ],
                max_focus_areas: 1,
                max_metering_areas: 1,
                focus_modes: vec![
                    FocusMode::Auto,
                    FocusMode::ContinuousPicture,
                    FocusMode::ContinuousVideo,
                ],
            },
            default_preview: Size::new(640, 480),
        }
    }
}

/// Counters shared by a backend and every device it opened
#[derive(Debug, Default)]
struct MockStats {
    open_now: AtomicUsize,
    max_open: AtomicUsize,
    opens: AtomicU64,
    releases: AtomicU64,
    frames: AtomicU64,
}

#[derive(Debug, Default)]
struct MockFaults {
    failing_opens: AtomicU32,
    fail_release: AtomicBool,
    fail_parameters: AtomicBool,
    corrupt_frames: AtomicBool,
}

/// In-process camera service used for tests and the demo binary.
///
/// Refuses a second concurrent open the way real hardware does, and records
/// the highest number of simultaneously open handles it ever observed.
pub struct MockCameraBackend {
    cameras: Vec<MockCameraSpec>,
    stats: Arc<MockStats>,
    faults: Arc<MockFaults>,
    open_delay: Duration,
    frame_delay: Duration,
    devices: Mutex<Vec<Arc<MockCameraDevice>>>,
}

impl MockCameraBackend {
    pub fn new(cameras: Vec<MockCameraSpec>) -> Self {
        Self {
            cameras,
            stats: Arc::new(MockStats::default()),
            faults: Arc::new(MockFaults::default()),
            open_delay: Duration::ZERO,
            frame_delay: Duration::from_millis(5),
            devices: Mutex::new(Vec::new()),
        }
    }

    /// Back camera mounted at 90 degrees and front camera at 270 degrees
    pub fn dual() -> Self {
        Self::new(vec![
            MockCameraSpec::phone(Facing::Back, 90),
            MockCameraSpec::phone(Facing::Front, 270),
        ])
    }

    pub fn single_back() -> Self {
        Self::new(vec![MockCameraSpec::phone(Facing::Back, 90)])
    }

    /// Simulated latency of the native open call
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Delay between registering a frame callback and delivering the frame
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    /// Make the next `count` open calls fail
    pub fn fail_next_opens(&self, count: u32) {
        self.faults.failing_opens.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_release(&self, fail: bool) {
        self.faults.fail_release.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_parameters(&self, fail: bool) {
        self.faults.fail_parameters.store(fail, Ordering::SeqCst);
    }

    /// Deliver truncated frames that cannot be decoded
    pub fn set_corrupt_frames(&self, corrupt: bool) {
        self.faults.corrupt_frames.store(corrupt, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.stats.open_now.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_open(&self) -> usize {
        self.stats.max_open.load(Ordering::SeqCst)
    }

    pub fn total_opens(&self) -> u64 {
        self.stats.opens.load(Ordering::SeqCst)
    }

    pub fn total_releases(&self) -> u64 {
        self.stats.releases.load(Ordering::SeqCst)
    }

    pub fn frames_delivered(&self) -> u64 {
        self.stats.frames.load(Ordering::SeqCst)
    }

    /// Most recently opened device, for inspecting applied parameters
    pub fn last_device(&self) -> Option<Arc<MockCameraDevice>> {
        self.devices.lock().last().cloned()
    }

    /// Facings of every successfully opened device, in open order
    pub fn open_history(&self) -> Vec<Facing> {
        self.devices
            .lock()
            .iter()
            .map(|device| device.spec.info.facing)
            .collect()
    }
}

impl CameraBackend for MockCameraBackend {
    fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    fn camera_info(&self, facing: Facing) -> Option<CameraInfo> {
        self.cameras
            .iter()
            .find(|spec| spec.info.facing == facing)
            .map(|spec| spec.info)
    }

    fn open(&self, facing: Facing) -> Result<Arc<dyn CameraDevice>, CameraError> {
        let spec = self
            .cameras
            .iter()
            .find(|spec| spec.info.facing == facing)
            .cloned()
            .ok_or(CameraError::NoSuchCamera { facing })?;

        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }

        let failing = self
            .faults
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(CameraError::DeviceOpen {
                facing,
                details: "simulated hardware failure".to_string(),
            });
        }

        let previously_open = self.stats.open_now.fetch_add(1, Ordering::SeqCst);
        if previously_open > 0 {
            self.stats.open_now.fetch_sub(1, Ordering::SeqCst);
            return Err(CameraError::InUse);
        }
        self.stats.max_open.fetch_max(previously_open + 1, Ordering::SeqCst);
        self.stats.opens.fetch_add(1, Ordering::SeqCst);

        let device = MockCameraDevice::new(
            spec,
            Arc::clone(&self.stats),
            Arc::clone(&self.faults),
            self.frame_delay,
        );
        debug!("Mock {} camera opened", facing);

        self.devices.lock().push(Arc::clone(&device));
        Ok(device)
    }
}

#[derive(Default)]
struct MockDeviceState {
    preview_size: Size,
    display_rotation: u32,
    output_rotation: u32,
    focus_mode: Option<FocusMode>,
    focus_area: Option<Rect>,
    metering_area: Option<Rect>,
    autofocus_runs: u32,
    previewing: bool,
    released: bool,
    pending_callback: Option<FrameCallback>,
}

/// Open handle produced by [`MockCameraBackend`]
pub struct MockCameraDevice {
    spec: MockCameraSpec,
    stats: Arc<MockStats>,
    faults: Arc<MockFaults>,
    frame_delay: Duration,
    state: Mutex<MockDeviceState>,
    this: Weak<MockCameraDevice>,
}

impl MockCameraDevice {
    fn new(
        spec: MockCameraSpec,
        stats: Arc<MockStats>,
        faults: Arc<MockFaults>,
        frame_delay: Duration,
    ) -> Arc<Self> {
        let state = MockDeviceState {
            preview_size: spec.default_preview,
            ..Default::default()
        };

        Arc::new_cyclic(|this| Self {
            spec,
            stats,
            faults,
            frame_delay,
            state: Mutex::new(state),
            this: this.clone(),
        })
    }

    pub fn facing(&self) -> Facing {
        self.spec.info.facing
    }

    pub fn display_rotation(&self) -> u32 {
        self.state.lock().display_rotation
    }

    pub fn output_rotation(&self) -> u32 {
        self.state.lock().output_rotation
    }

    pub fn focus_mode(&self) -> Option<FocusMode> {
        self.state.lock().focus_mode
    }

    pub fn focus_areas(&self) -> (Option<Rect>, Option<Rect>) {
        let state = self.state.lock();
        (state.focus_area, state.metering_area)
    }

    pub fn autofocus_runs(&self) -> u32 {
        self.state.lock().autofocus_runs
    }

    pub fn is_previewing(&self) -> bool {
        self.state.lock().previewing
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    fn ensure_open(state: &MockDeviceState) -> Result<(), CameraError> {
        if state.released {
            Err(CameraError::NotOpen)
        } else {
            Ok(())
        }
    }

    fn check_parameters(&self) -> Result<(), CameraError> {
        if self.faults.fail_parameters.load(Ordering::SeqCst) {
            Err(CameraError::Parameters {
                details: "simulated parameter rejection".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Hand the pending callback a frame from a separate thread, as the hardware would
    fn schedule_delivery(&self) {
        let Some(device) = self.this.upgrade() else {
            return;
        };

        std::thread::spawn(move || {
            if !device.frame_delay.is_zero() {
                std::thread::sleep(device.frame_delay);
            }

            let (callback, size) = {
                let mut state = device.state.lock();
                if state.released || !state.previewing {
                    return;
                }
                match state.pending_callback.take() {
                    Some(callback) => (callback, state.preview_size),
                    None => return,
                }
            };

            let id = device.stats.frames.fetch_add(1, Ordering::SeqCst);
            let mut data = synthetic_nv21(size, id as u8);
            if device.faults.corrupt_frames.load(Ordering::SeqCst) {
                data.truncate(data.len() / 3);
            }

            trace!("Mock camera delivering frame {} ({})", id, size);
            callback(FrameData::new(
                id,
                SystemTime::now(),
                data,
                size.width,
                size.height,
                FrameFormat::Nv21,
            ));
        });
    }
}

impl CameraDevice for MockCameraDevice {
    fn capabilities(&self) -> CameraCapabilities {
        self.spec.capabilities.clone()
    }

    fn preview_size(&self) -> Size {
        self.state.lock().preview_size
    }

    fn set_preview_size(&self, size: Size) -> Result<(), CameraError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        if !self.spec.capabilities.preview_sizes.contains(&size) {
            return Err(CameraError::Parameters {
                details: format!("unsupported preview size {}", size),
            });
        }
        state.preview_size = size;
        Ok(())
    }

    fn set_display_rotation(&self, degrees: u32) -> Result<(), CameraError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.display_rotation = degrees;
        Ok(())
    }

    fn set_output_rotation(&self, degrees: u32) -> Result<(), CameraError> {
        self.check_parameters()?;
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.output_rotation = degrees;
        Ok(())
    }

    fn set_focus_mode(&self, mode: FocusMode) -> Result<(), CameraError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        if !self.spec.capabilities.supports_focus_mode(mode) {
            return Err(CameraError::Parameters {
                details: format!("unsupported focus mode {:?}", mode),
            });
        }
        state.focus_mode = Some(mode);
        Ok(())
    }

    fn set_focus_areas(
        &self,
        focus: Option<Rect>,
        metering: Option<Rect>,
    ) -> Result<(), CameraError> {
        self.check_parameters()?;
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.focus_area = focus;
        state.metering_area = metering;
        Ok(())
    }

    fn auto_focus(&self) -> Result<(), CameraError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.autofocus_runs += 1;
        Ok(())
    }

    fn cancel_auto_focus(&self) {}

    fn start_preview(&self) -> Result<(), CameraError> {
        let pending = {
            let mut state = self.state.lock();
            Self::ensure_open(&state)?;
            state.previewing = true;
            state.pending_callback.is_some()
        };
        if pending {
            self.schedule_delivery();
        }
        Ok(())
    }

    fn stop_preview(&self) -> Result<(), CameraError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.previewing = false;
        Ok(())
    }

    fn set_one_shot_preview_callback(&self, callback: FrameCallback) -> Result<(), CameraError> {
        let previewing = {
            let mut state = self.state.lock();
            Self::ensure_open(&state)?;
            state.pending_callback = Some(callback);
            state.previewing
        };
        if previewing {
            self.schedule_delivery();
        }
        Ok(())
    }

    fn release(&self) -> Result<(), CameraError> {
        {
            let mut state = self.state.lock();
            if state.released {
                return Ok(());
            }
            state.released = true;
            state.previewing = false;
            state.pending_callback = None;
        }

        self.stats.open_now.fetch_sub(1, Ordering::SeqCst);
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
        debug!("Mock {} camera released", self.spec.info.facing);

        if self.faults.fail_release.load(Ordering::SeqCst) {
            return Err(CameraError::Release {
                details: "simulated release failure".to_string(),
            });
        }
        Ok(())
    }
}

/// NV21 test pattern: diagonal luma gradient with neutral chroma
pub fn synthetic_nv21(size: Size, seed: u8) -> Vec<u8> {
    let (width, height) = (size.width as usize, size.height as usize);
    let mut data = Vec::with_capacity(FrameFormat::Nv21.frame_len(size.width, size.height));

    for y in 0..height {
        for x in 0..width {
            data.push(((x + y) as u8).wrapping_add(seed));
        }
    }
    data.resize(FrameFormat::Nv21.frame_len(size.width, size.height), 128);

    data
}
