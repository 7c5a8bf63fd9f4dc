use crate::camera::CameraCapabilities;
use crate::config::FocusConfig;
use crate::geometry::{Rect, Size};
use tracing::trace;

/// Bounds of the hardware focus coordinate space on both axes
pub const FOCUS_SPACE_MIN: i32 = -1000;
pub const FOCUS_SPACE_MAX: i32 = 1000;

/// Focus and metering targets for one tap, in `[-1000, 1000]` on both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusRequest {
    pub focus_rect: Rect,
    pub metering_rect: Rect,
}

/// Maps view-space taps into the hardware focus coordinate space
#[derive(Debug, Clone)]
pub struct FocusCoordinateMapper {
    area_divisor: u32,
    metering_scale: f32,
}

impl FocusCoordinateMapper {
    pub fn new(config: &FocusConfig) -> Self {
        Self {
            area_divisor: config.area_divisor.max(1),
            metering_scale: config.metering_scale,
        }
    }

    /// Side of the focus square for a preview size.
    ///
    /// Manufacturers recommend an eighth of the longer preview edge.
    pub fn recommended_area_size(&self, preview: Size) -> i32 {
        (preview.width.max(preview.height) / self.area_divisor) as i32
    }

    /// Map a tap into focus and metering rectangles.
    ///
    /// Returns `None` when the camera supports neither focus nor metering areas
    /// or no preview size is known yet.
    pub fn map(
        &self,
        tap_x: f32,
        tap_y: f32,
        preview: Size,
        display_rotation: u32,
        capabilities: &CameraCapabilities,
    ) -> Option<FocusRequest> {
        if !capabilities.supports_focus_areas() {
            trace!("Camera declares no focus or metering areas, ignoring tap");
            return None;
        }
        if preview.is_empty() {
            return None;
        }

        // Taps arrive in view space; a quarter-turn preview swaps the sensor axes
        let basis = if display_rotation % 180 != 0 {
            preview.transposed()
        } else {
            preview
        };

        let x = tap_x / basis.width as f32 * 2000.0 - 1000.0;
        let y = tap_y / basis.height as f32 * 2000.0 - 1000.0;
        let area_size = self.recommended_area_size(preview);

        let request = FocusRequest {
            focus_rect: calculate_tap_area(x, y, area_size, 1.0),
            metering_rect: calculate_tap_area(x, y, area_size, self.metering_scale),
        };

        trace!(
            "Tap ({:.1}, {:.1}) -> focus {} metering {}",
            tap_x,
            tap_y,
            request.focus_rect,
            request.metering_rect
        );

        Some(request)
    }
}

impl Default for FocusCoordinateMapper {
    fn default() -> Self {
        Self::new(&FocusConfig::default())
    }
}

/// Square of `area_size * coefficient` centered on `(x, y)`, kept inside the focus space
fn calculate_tap_area(x: f32, y: f32, area_size: i32, coefficient: f32) -> Rect {
    let side = ((coefficient * area_size as f32) as i32).min(FOCUS_SPACE_MAX - FOCUS_SPACE_MIN);
    let left = clamp(x as i32 - side / 2, FOCUS_SPACE_MIN, FOCUS_SPACE_MAX - side);
    let top = clamp(y as i32 - side / 2, FOCUS_SPACE_MIN, FOCUS_SPACE_MAX - side);

    Rect::new(left, top, left + side, top + side)
}

fn clamp(value: i32, min: i32, max: i32) -> i32 {
    value.max(min).min(max)
}
