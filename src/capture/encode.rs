use crate::error::CaptureError;
use crate::frame::{FrameData, FrameFormat};
use crate::geometry::{Rect, Size};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, RgbImage};
use tracing::debug;

/// Decode an NV21 buffer into RGB using BT.601 full-range coefficients
pub fn nv21_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage, CaptureError> {
    let expected = FrameFormat::Nv21.frame_len(width, height);
    if width == 0 || height == 0 || data.len() < expected {
        return Err(CaptureError::Decode {
            details: format!(
                "NV21 frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            ),
        });
    }

    let (w, h) = (width as usize, height as usize);
    let chroma_stride = 2 * ((w + 1) / 2);
    let (luma, chroma) = data.split_at(w * h);
    let mut rgb = RgbImage::new(width, height);

    for y in 0..h {
        let chroma_row = &chroma[(y / 2) * chroma_stride..];
        for x in 0..w {
            let luma_value = luma[y * w + x] as f32;
            // Interleaved V then U
            let v = chroma_row[(x / 2) * 2] as f32 - 128.0;
            let u = chroma_row[(x / 2) * 2 + 1] as f32 - 128.0;

            let r = luma_value + 1.402 * v;
            let g = luma_value - 0.344_136 * u - 0.714_136 * v;
            let b = luma_value + 1.772 * u;

            rgb.put_pixel(
                x as u32,
                y as u32,
                image::Rgb([clamp_channel(r), clamp_channel(g), clamp_channel(b)]),
            );
        }
    }

    Ok(rgb)
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn decode_frame(frame: &FrameData) -> Result<RgbImage, CaptureError> {
    match frame.format {
        FrameFormat::Nv21 => nv21_to_rgb(&frame.data, frame.width, frame.height),
        FrameFormat::Rgb24 => {
            let expected = frame.expected_size();
            let data = frame.data.get(..expected).ok_or_else(|| CaptureError::Decode {
                details: format!("RGB frame needs {} bytes, got {}", expected, frame.data.len()),
            })?;
            RgbImage::from_raw(frame.width, frame.height, data.to_vec()).ok_or_else(|| {
                CaptureError::Decode {
                    details: "RGB buffer does not match frame size".to_string(),
                }
            })
        }
    }
}

/// Rotate a raw preview frame clockwise by `rotation`, crop it to `crop` and
/// encode the result as JPEG.
///
/// `crop` is given on the rotated frame's axes and is clamped to its bounds.
pub fn create_from_nv21(
    frame: &FrameData,
    rotation: u32,
    crop: Rect,
    quality: u8,
) -> Result<(Vec<u8>, Size), CaptureError> {
    let decoded = decode_frame(frame)?;

    let rotated = match rotation % 360 {
        90 => imageops::rotate90(&decoded),
        180 => imageops::rotate180(&decoded),
        270 => imageops::rotate270(&decoded),
        _ => decoded,
    };

    let bounds = Rect::from_size(rotated.width() as i32, rotated.height() as i32);
    let region = crop.intersect(&bounds).ok_or_else(|| CaptureError::EmptyCrop {
        details: format!("{} within {}", crop, bounds),
    })?;

    let cropped = imageops::crop_imm(
        &rotated,
        region.left as u32,
        region.top as u32,
        region.width() as u32,
        region.height() as u32,
    )
    .to_image();
    let size = Size::new(cropped.width(), cropped.height());

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(&DynamicImage::ImageRgb8(cropped))
        .map_err(|e| CaptureError::JpegEncoding {
            details: e.to_string(),
        })?;

    debug!(
        "Encoded frame {} rotated {} cropped to {} ({} bytes)",
        frame.id,
        rotation,
        region,
        buf.len()
    );
    Ok((buf, size))
}
