//! Format normalization
//!
//! Turns a [`FrameDescriptor`] into the [`NormalizedImage`] a decoder consumes:
//! - YUV420 / NV21 the decoder accepts natively: the frame's own bytes, tagged
//! - JPEG: decoded bitmap
//! - YUV420 / NV21 otherwise: RGB, re-encoded as JPEG, decoded back to a bitmap
//! - anything else: generic bitmap decode, or `ConversionError`

/// YUV to JPEG re-encode and bitmap decode
pub mod fallback;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::{FrameDescriptor, PixelFormat, PixelRect, Rotation};
use crate::utils::orientation::rotation_for;
use crate::utils::yuv::{YuvLayout, luma_plane, yuv_to_rgb, yuv420_len};
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::borrow::Cow;

/// YUV layouts a decoder may accept without conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFormat {
    /// Planar 4:2:0
    Yuv420,
    /// Semi-planar 4:2:0, V before U
    Nv21,
}

impl NativeFormat {
    /// Native tag for a frame format, if it has one
    pub fn for_pixel_format(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::Yuv420 => Some(NativeFormat::Yuv420),
            PixelFormat::Nv21 => Some(NativeFormat::Nv21),
            _ => None,
        }
    }

    /// Chroma arrangement of this format
    pub fn layout(&self) -> YuvLayout {
        match self {
            NativeFormat::Yuv420 => YuvLayout::I420,
            NativeFormat::Nv21 => YuvLayout::Nv21,
        }
    }
}

/// Pixel data handed to a decoder
#[derive(Debug, Clone)]
pub enum ImageData {
    /// The frame's original bytes, shared rather than copied
    Native {
        /// Frame bytes
        bytes: Bytes,
        /// Layout of `bytes`
        format: NativeFormat,
    },
    /// A decoded bitmap
    Bitmap {
        /// Decoded pixels
        image: DynamicImage,
        /// Intermediate JPEG, present when the bitmap came from the YUV fallback
        jpeg: Option<Bytes>,
    },
}

/// Decoder-ready image tagged with the rotation to apply
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Pixel data
    pub data: ImageData,
    /// Width of `data` in pixels
    pub width: u32,
    /// Height of `data` in pixels
    pub height: u32,
    /// Rotation the decoder should apply
    pub rotation: Rotation,
}

impl NormalizedImage {
    /// True when the image still points at the frame's own buffer
    pub fn is_native(&self) -> bool {
        matches!(self.data, ImageData::Native { .. })
    }

    /// One byte of luma per pixel, row-major. Borrowed for native YUV.
    pub fn luma(&self) -> Option<Cow<'_, [u8]>> {
        match &self.data {
            ImageData::Native { bytes, .. } => {
                luma_plane(bytes, self.width as usize, self.height as usize).map(Cow::Borrowed)
            }
            ImageData::Bitmap { image, .. } => Some(Cow::Owned(image.to_luma8().into_raw())),
        }
    }
}

/// Converts frames into decoder-ready images
#[derive(Debug, Clone, Default)]
pub struct FormatNormalizer {
    config: PipelineConfig,
}

impl FormatNormalizer {
    /// Create a normalizer with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Normalize `frame`. `accepts_native` reports whether the decoder takes a YUV layout as is.
    pub fn normalize<F>(
        &self,
        frame: &FrameDescriptor,
        accepts_native: F,
    ) -> Result<NormalizedImage, PipelineError>
    where
        F: Fn(NativeFormat) -> bool,
    {
        if frame.width == 0 || frame.height == 0 {
            return Err(PipelineError::InvalidData(format!(
                "frame dimensions {}x{} are empty",
                frame.width, frame.height
            )));
        }
        if frame.pixel_count() > self.config.max_pixels {
            return Err(PipelineError::InvalidData(format!(
                "frame too large: {}x{} (limit {} pixels)",
                frame.width, frame.height, self.config.max_pixels
            )));
        }

        let rotation = rotation_for(frame.orientation);

        match NativeFormat::for_pixel_format(frame.format) {
            Some(native) => {
                let required = yuv420_len(frame.width as usize, frame.height as usize);
                if frame.bytes.len() < required {
                    return Err(PipelineError::InvalidData(format!(
                        "{} frame {}x{} needs {} bytes, got {}",
                        frame.format,
                        frame.width,
                        frame.height,
                        required,
                        frame.bytes.len()
                    )));
                }

                if !self.config.force_bitmap && accepts_native(native) {
                    log::debug!("passing {} frame to decoder without conversion", frame.format);
                    return Ok(NormalizedImage {
                        data: ImageData::Native {
                            bytes: frame.bytes.clone(),
                            format: native,
                        },
                        width: frame.width,
                        height: frame.height,
                        rotation,
                    });
                }

                self.yuv_fallback(frame, native, rotation)
            }
            None => {
                let codec = match frame.format {
                    PixelFormat::Jpeg => Some(ImageFormat::Jpeg),
                    _ => None,
                };
                let image = fallback::decode_bitmap(&frame.bytes, codec, self.config.max_pixels)
                    .inspect_err(|e| {
                        log::warn!("cannot decode {} frame as bitmap: {}", frame.format, e)
                    })?;
                Ok(Self::bitmap(image, None, rotation))
            }
        }
    }

    fn yuv_fallback(
        &self,
        frame: &FrameDescriptor,
        native: NativeFormat,
        rotation: Rotation,
    ) -> Result<NormalizedImage, PipelineError> {
        let region = PixelRect::new(
            0,
            0,
            i32::try_from(frame.width).unwrap_or(i32::MAX),
            i32::try_from(frame.height).unwrap_or(i32::MAX),
        );

        let limit = fallback::JPEG_MAX_DIMENSION;
        if frame.width > limit || frame.height > limit {
            log::debug!(
                "{} frame {}x{} exceeds JPEG limits, handing over RGB directly",
                frame.format,
                frame.width,
                frame.height
            );
            let rgb = yuv_to_rgb(
                &frame.bytes,
                native.layout(),
                frame.width as usize,
                frame.height as usize,
                region,
            )
            .ok_or_else(|| {
                PipelineError::ConversionError(format!(
                    "cannot convert {}x{} {} frame",
                    frame.width, frame.height, frame.format
                ))
            })?;
            return Ok(Self::bitmap(DynamicImage::ImageRgb8(rgb), None, rotation));
        }

        let jpeg = fallback::yuv_to_jpeg(
            &frame.bytes,
            native.layout(),
            frame.width,
            frame.height,
            region,
            self.config.jpeg_quality,
        )?;
        log::debug!(
            "re-encoded {} frame {}x{} as {} byte JPEG",
            frame.format,
            frame.width,
            frame.height,
            jpeg.len()
        );

        let image =
            fallback::decode_bitmap(&jpeg, Some(ImageFormat::Jpeg), self.config.max_pixels)?;
        Ok(Self::bitmap(image, Some(Bytes::from(jpeg)), rotation))
    }

    fn bitmap(image: DynamicImage, jpeg: Option<Bytes>, rotation: Rotation) -> NormalizedImage {
        let (width, height) = image.dimensions();
        NormalizedImage {
            data: ImageData::Bitmap { image, jpeg },
            width,
            height,
            rotation,
        }
    }
}
