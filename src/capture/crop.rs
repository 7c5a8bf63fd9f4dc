use crate::geometry::{Rect, Size};

/// Region of the preview frame that matches what the viewport showed.
///
/// `visible` is the viewport rectangle in view space. The result is the largest
/// rectangle with the viewport's aspect ratio that fits the preview, centered
/// on it. For quarter-turn rotations the result is expressed on the rotated
/// axes, ready to crop the frame after it has been rotated.
pub fn get_cropped_rect(preview: Size, visible: Rect, rotation: u32) -> Rect {
    let quarter_turn = rotation % 180 != 0;
    let visible = if quarter_turn {
        visible.transposed()
    } else {
        visible
    };

    if visible.is_empty() || preview.is_empty() {
        let full = Rect::from_size(preview.width as i32, preview.height as i32);
        return if quarter_turn { full.transposed() } else { full };
    }

    let preview_width = preview.width as f32;
    let preview_height = preview.height as f32;

    let mut scale = preview_width / visible.width() as f32;
    if visible.height() as f32 * scale > preview_height {
        scale = preview_height / visible.height() as f32;
    }

    let new_width = visible.width() as f32 * scale;
    let new_height = visible.height() as f32 * scale;
    let center_x = (preview.width / 2) as f32;
    let center_y = (preview.height / 2) as f32;

    let rect = Rect::new(
        (center_x - new_width / 2.0) as i32,
        (center_y - new_height / 2.0) as i32,
        (center_x + new_width / 2.0) as i32,
        (center_y + new_height / 2.0) as i32,
    );

    if quarter_turn {
        rect.transposed()
    } else {
        rect
    }
}
