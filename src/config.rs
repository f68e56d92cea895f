//! Pipeline configuration
//!
//! Defaults suit live camera frames. [`PipelineConfig::from_env`] lets the
//! `QR_FRAME_*` environment variables override them without a rebuild.

fn parse_env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_env_u8(name: &str, default: u8) -> u8 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .unwrap_or(default)
}

fn parse_env_bool_u8(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(|v| v != 0)
        .unwrap_or(default)
}

/// Default JPEG quality for the YUV fallback re-encode
pub const DEFAULT_JPEG_QUALITY: u8 = 100;
/// Default frame size ceiling (4096 x 4096)
pub const DEFAULT_MAX_PIXELS: u64 = 4096 * 4096;

/// Tuning knobs for [`Pipeline`](crate::Pipeline) and the bundled decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Route YUV/NV21 frames through the JPEG fallback even when the decoder accepts them natively
    pub force_bitmap: bool,
    /// Quality (1-100) for the fallback JPEG re-encode
    pub jpeg_quality: u8,
    /// Frames or decoded bitmaps above this pixel count are rejected
    pub max_pixels: u64,
    /// Worker threads for the bundled decoder; 0 lets rayon pick
    pub decode_threads: usize,
}

impl PipelineConfig {
    /// Configuration with default values
    pub fn new() -> Self {
        Self {
            force_bitmap: false,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_pixels: DEFAULT_MAX_PIXELS,
            decode_threads: 0,
        }
    }

    /// Defaults overridden by `QR_FRAME_FORCE_BITMAP`, `QR_FRAME_JPEG_QUALITY`,
    /// `QR_FRAME_MAX_PIXELS` and `QR_FRAME_DECODE_THREADS`
    pub fn from_env() -> Self {
        let defaults = Self::new();
        Self {
            force_bitmap: parse_env_bool_u8("QR_FRAME_FORCE_BITMAP", defaults.force_bitmap),
            jpeg_quality: parse_env_u8("QR_FRAME_JPEG_QUALITY", defaults.jpeg_quality)
                .clamp(1, 100),
            max_pixels: parse_env_u64("QR_FRAME_MAX_PIXELS", defaults.max_pixels).max(1),
            decode_threads: parse_env_usize("QR_FRAME_DECODE_THREADS", defaults.decode_threads),
        }
    }

    /// Set `force_bitmap`
    pub fn with_force_bitmap(mut self, force: bool) -> Self {
        self.force_bitmap = force;
        self
    }

    /// Set the fallback JPEG quality (clamped to 1-100)
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Set the pixel ceiling
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels.max(1);
        self
    }

    /// Set the decoder worker count
    pub fn with_decode_threads(mut self, threads: usize) -> Self {
        self.decode_threads = threads;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}
