use serde::Serialize;

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct PixelRect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl PixelRect {
    /// Create a rectangle from its top-left corner and size
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle containing every point. `None` for an empty iterator.
    pub fn hull<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let mut points = points.into_iter();
        let (x0, y0) = points.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
        for (x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// True when the rectangle covers no pixels
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection with `(0, 0, width, height)`; `None` when nothing remains
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Self> {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);
        let left = self.x.clamp(0, max_x);
        let top = self.y.clamp(0, max_y);
        let right = self.right().clamp(0, max_x);
        let bottom = self.bottom().clamp(0, max_y);
        let clipped = Self::new(left, top, right - left, bottom - top);
        if clipped.is_empty() { None } else { Some(clipped) }
    }
}

/// One code as reported by a decoder, before projection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawDetection {
    /// Unparsed payload text
    pub raw_value: Option<String>,
    /// Display-rendered payload, used when `raw_value` is missing
    pub display_value: Option<String>,
    /// Location in the pixel space of the image handed to the decoder
    pub bounding_box: Option<PixelRect>,
}

impl RawDetection {
    /// Detection with neither payload nor geometry
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw payload
    pub fn with_raw_value(mut self, value: impl Into<String>) -> Self {
        self.raw_value = Some(value.into());
        self
    }

    /// Set the display payload
    pub fn with_display_value(mut self, value: impl Into<String>) -> Self {
        self.display_value = Some(value.into());
        self
    }

    /// Set the bounding box
    pub fn with_bounding_box(mut self, rect: PixelRect) -> Self {
        self.bounding_box = Some(rect);
        self
    }
}

/// Geometry of a detected code relative to the original frame
///
/// All fields are `None` when the decoder could not localize the code; this
/// serializes as an empty object rather than a missing key.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Bounds {
    /// Pixel rectangle, flattened into `x`, `y`, `width`, `height`
    #[serde(flatten)]
    pub rect: Option<PixelRect>,
    /// `[x / frame_width, y / frame_height]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<[f64; 2]>,
    /// `[width / frame_width, height / frame_height]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<[f64; 2]>,
}

impl Bounds {
    /// True when no geometry is attached
    pub fn is_empty(&self) -> bool {
        self.rect.is_none()
    }
}

/// Detection result handed back to the caller
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DetectionResult {
    /// Decoded payload; `None` when a code was located but not readable
    pub value: Option<String>,
    /// Location of the code (possibly empty)
    pub bounds: Bounds,
}
