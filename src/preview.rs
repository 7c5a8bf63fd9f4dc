use crate::geometry::Size;
use tracing::trace;

/// Maximum deviation between a candidate's aspect ratio and the viewport's
pub const DEFAULT_ASPECT_TOLERANCE: f64 = 0.1;

/// Choose the supported preview size that best fits the viewport.
///
/// The viewport ratio is `height / width` and a candidate ratio is
/// `width / height`, so a portrait viewport matches landscape sensor sizes.
pub fn negotiate(supported: &[Size], viewport_width: u32, viewport_height: u32) -> Option<Size> {
    negotiate_with_tolerance(
        supported,
        viewport_width,
        viewport_height,
        DEFAULT_ASPECT_TOLERANCE,
    )
}

pub fn negotiate_with_tolerance(
    supported: &[Size],
    viewport_width: u32,
    viewport_height: u32,
    tolerance: f64,
) -> Option<Size> {
    if viewport_width == 0 || viewport_height == 0 {
        return None;
    }

    let target_ratio = viewport_height as f64 / viewport_width as f64;

    let by_ratio = closest_height(
        supported.iter().filter(|size| {
            if size.height == 0 {
                return false;
            }
            let ratio = size.width as f64 / size.height as f64;
            (ratio - target_ratio).abs() <= tolerance
        }),
        viewport_height,
    );

    let chosen = by_ratio.or_else(|| {
        trace!(
            "No preview size within {:.2} of ratio {:.3}, ignoring aspect ratio",
            tolerance,
            target_ratio
        );
        closest_height(supported.iter(), viewport_height)
    });

    trace!(
        "Negotiated preview size {:?} for viewport {}x{}",
        chosen,
        viewport_width,
        viewport_height
    );

    chosen
}

/// First size with the smallest height difference
fn closest_height<'a>(sizes: impl Iterator<Item = &'a Size>, target_height: u32) -> Option<Size> {
    let mut best: Option<(Size, u32)> = None;

    for size in sizes {
        let diff = size.height.abs_diff(target_height);
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((*size, diff)),
        }
    }

    best.map(|(size, _)| size)
}
