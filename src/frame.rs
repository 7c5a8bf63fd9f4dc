use crate::geometry::Size;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a raw preview buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// YUV 4:2:0 semi-planar, full Y plane then interleaved V/U at quarter resolution
    Nv21,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Number of bytes a frame of this format occupies
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        let (width, height) = (width as usize, height as usize);
        match self {
            FrameFormat::Nv21 => width * height + 2 * width.div_ceil(2) * height.div_ceil(2),
            FrameFormat::Rgb24 => width * height * 3,
        }
    }
}

/// Raw frame delivered by the camera preview stream
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Get the expected frame size in bytes
    pub fn expected_size(&self) -> usize {
        self.format.frame_len(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len() {
        assert_eq!(FrameFormat::Nv21.frame_len(640, 480), 640 * 480 * 3 / 2);
        assert_eq!(FrameFormat::Rgb24.frame_len(640, 480), 640 * 480 * 3);
        // Odd dimensions round the chroma plane up
        assert_eq!(FrameFormat::Nv21.frame_len(3, 3), 9 + 2 * 2 * 2);
    }

    #[test]
    fn test_frame_size_validation() {
        let valid = FrameData::new(
            1,
            SystemTime::now(),
            vec![0u8; 640 * 480 * 3 / 2],
            640,
            480,
            FrameFormat::Nv21,
        );
        assert_eq!(valid.expected_size(), valid.data.len());
        assert_eq!(valid.size(), Size::new(640, 480));

        let truncated = FrameData::new(2, SystemTime::now(), vec![0u8; 100], 640, 480, FrameFormat::Nv21);
        assert!(truncated.data.len() < truncated.expected_size());
    }
}
