//! Bitmap fallback: re-encode a YUV frame as JPEG, then decode it with the
//! image codec. Used when the decoder cannot take the YUV layout directly.

use crate::error::PipelineError;
use crate::models::PixelRect;
use crate::utils::yuv::{YuvLayout, yuv_to_rgb};
use image::codecs::jpeg::JpegEncoder;
use image::io::Reader as ImageReader;
use image::{ColorType, DynamicImage, ImageFormat};
use std::io::Cursor;

/// Largest width or height the JPEG encoder accepts
pub const JPEG_MAX_DIMENSION: u32 = u16::MAX as u32;

/// Encode `region` of a 4:2:0 frame as JPEG at `quality` (1-100)
pub fn yuv_to_jpeg(
    data: &[u8],
    layout: YuvLayout,
    width: u32,
    height: u32,
    region: PixelRect,
    quality: u8,
) -> Result<Vec<u8>, PipelineError> {
    let rgb = yuv_to_rgb(data, layout, width as usize, height as usize, region).ok_or_else(
        || {
            PipelineError::ConversionError(format!(
                "cannot convert {}x{} {:?} buffer of {} bytes",
                width,
                height,
                layout,
                data.len()
            ))
        },
    )?;

    let (out_w, out_h) = rgb.dimensions();
    let mut jpeg = Vec::with_capacity(rgb.as_raw().len() / 4);
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        out_w,
        out_h,
        ColorType::Rgb8,
    )?;
    Ok(jpeg)
}

/// Decode an encoded image, rejecting anything above `max_pixels` before the full decode
///
/// `format` pins the codec; `None` sniffs it from the leading bytes.
pub fn decode_bitmap(
    bytes: &[u8],
    format: Option<ImageFormat>,
    max_pixels: u64,
) -> Result<DynamicImage, PipelineError> {
    let reader = match format {
        Some(format) => ImageReader::with_format(Cursor::new(bytes), format),
        None => ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::ConversionError(e.to_string()))?,
    };
    if reader.format().is_none() {
        return Err(PipelineError::ConversionError(
            "unrecognized image encoding".to_string(),
        ));
    }

    let (width, height) = reader.into_dimensions()?;
    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(PipelineError::ConversionError(format!(
            "decoded image too large: {}x{} (limit {} pixels)",
            width, height, max_pixels
        )));
    }

    let image = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(image)
}
