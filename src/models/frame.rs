use bytes::Bytes;
use std::fmt;

/// Capture-layer code for planar YUV 4:2:0 (Android `ImageFormat.YUV_420_888`)
pub const FORMAT_CODE_YUV420: i64 = 0x23;
/// Capture-layer code for semi-planar NV21 (Android `ImageFormat.NV21`)
pub const FORMAT_CODE_NV21: i64 = 0x11;
/// Capture-layer code for JPEG-compressed frames (Android `ImageFormat.JPEG`)
pub const FORMAT_CODE_JPEG: i64 = 0x100;

/// In-memory encoding of a frame's pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar 4:2:0: full Y plane, then quarter-size U and V planes
    Yuv420,
    /// Semi-planar 4:2:0: full Y plane, then interleaved V/U pairs
    Nv21,
    /// JPEG-compressed bytes
    Jpeg,
    /// Any other capture code; handled through the bitmap fallback
    Other(i64),
}

impl PixelFormat {
    /// Map a capture-layer format code to a pixel format
    pub fn from_code(code: i64) -> Self {
        match code {
            FORMAT_CODE_YUV420 => PixelFormat::Yuv420,
            FORMAT_CODE_NV21 => PixelFormat::Nv21,
            FORMAT_CODE_JPEG => PixelFormat::Jpeg,
            other => PixelFormat::Other(other),
        }
    }

    /// Capture-layer code for this format
    pub fn code(&self) -> i64 {
        match self {
            PixelFormat::Yuv420 => FORMAT_CODE_YUV420,
            PixelFormat::Nv21 => FORMAT_CODE_NV21,
            PixelFormat::Jpeg => FORMAT_CODE_JPEG,
            PixelFormat::Other(code) => *code,
        }
    }

    /// True for the two luma/chroma layouts decoders can take natively
    pub fn is_yuv(&self) -> bool {
        matches!(self, PixelFormat::Yuv420 | PixelFormat::Nv21)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Yuv420 => f.write_str("YUV420"),
            PixelFormat::Nv21 => f.write_str("NV21"),
            PixelFormat::Jpeg => f.write_str("JPEG"),
            PixelFormat::Other(code) => write!(f, "format {:#x}", code),
        }
    }
}

/// Device orientation reported alongside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// Upright portrait
    Portrait,
    /// Rotated so the top of the device points left
    LandscapeLeft,
    /// Rotated so the top of the device points right
    LandscapeRight,
    /// Portrait, upside down
    PortraitUpsideDown,
    /// Missing or unrecognized orientation
    #[default]
    Unknown,
}

impl Orientation {
    /// Parse the capture layer's orientation name. Unrecognized names map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "portrait" => Orientation::Portrait,
            "landscapeLeft" => Orientation::LandscapeLeft,
            "landscapeRight" => Orientation::LandscapeRight,
            "portraitUpsideDown" => Orientation::PortraitUpsideDown,
            _ => Orientation::Unknown,
        }
    }

    /// Capture-layer name, `"unknown"` for `Unknown`
    pub fn name(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::LandscapeLeft => "landscapeLeft",
            Orientation::LandscapeRight => "landscapeRight",
            Orientation::PortraitUpsideDown => "portraitUpsideDown",
            Orientation::Unknown => "unknown",
        }
    }
}

/// Clockwise rotation the decoder applies before reading a code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// No rotation
    #[default]
    Deg0,
    /// Quarter turn
    Deg90,
    /// Half turn
    Deg180,
    /// Three-quarter turn
    Deg270,
}

impl Rotation {
    /// Rotation in degrees (0, 90, 180 or 270)
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when width and height trade places after rotation
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// One camera frame: pixel bytes plus the metadata needed to interpret them
///
/// Bytes are held in a reference-counted [`Bytes`] so the native YUV path can
/// hand the same buffer to the decoder without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDescriptor {
    /// Frame width in pixels (> 0)
    pub width: u32,
    /// Frame height in pixels (> 0)
    pub height: u32,
    /// Pixel encoding of `bytes`
    pub format: PixelFormat,
    /// Device orientation when the frame was captured
    pub orientation: Orientation,
    /// Raw pixel payload
    pub bytes: Bytes,
}

impl FrameDescriptor {
    /// Create a frame descriptor
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        orientation: Orientation,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            width,
            height,
            format,
            orientation,
            bytes: bytes.into(),
        }
    }

    /// Total pixel count (width * height)
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}
