mod crop;
mod encode;
mod pipeline;
#[cfg(test)]
mod tests;

pub use crop::get_cropped_rect;
pub use encode::{create_from_nv21, nv21_to_rgb};
pub use pipeline::{CapturePipeline, CaptureState, CapturedImage};
