//! Helpers for the `qrtool` binary and benchmarks: loading frames from disk,
//! synthesizing YUV frames from ordinary images and walking image datasets.

use crate::models::{FrameDescriptor, Orientation, PixelFormat};
use crate::utils::yuv::{YuvLayout, yuv420_len};
use image::io::Reader as ImageReader;
use image::{ImageFormat, RgbImage};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Failure while preparing input for the pipeline
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Image decode failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    /// JSON parse failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Arguments do not describe a usable frame
    #[error("{0}")]
    Usage(String),
}

const COEF_R: i32 = 76;
const COEF_G: i32 = 150;
const COEF_B: i32 = 29;

fn max_dim_from_env() -> Option<u32> {
    match env::var("QR_FRAME_MAX_DIM") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(0) => None,
            Ok(v) => Some(v),
            Err(_) => None,
        },
        Err(_) => None,
    }
}

/// Load an image as RGB, downscaled to `QR_FRAME_MAX_DIM` when set
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage, ToolError> {
    let img = image::open(path)?;
    let img = match max_dim_from_env() {
        Some(max_dim) if img.width().max(img.height()) > max_dim => {
            img.resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
        }
        _ => img,
    };
    Ok(img.to_rgb8())
}

/// Encode RGB pixels as a 4:2:0 buffer, averaging chroma over each 2x2 block
pub fn rgb_to_yuv420(rgb: &RgbImage, layout: YuvLayout) -> Vec<u8> {
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let (chroma_w, chroma_h) = (width.div_ceil(2), height.div_ceil(2));
    let mut out = vec![0u8; yuv420_len(width, height)];

    for (i, px) in rgb.pixels().enumerate() {
        let [r, g, b] = px.0.map(i32::from);
        out[i] = ((COEF_R * r + COEF_G * g + COEF_B * b) >> 8).clamp(0, 255) as u8;
    }

    let luma = width * height;
    for cy in 0..chroma_h {
        for cx in 0..chroma_w {
            let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
            for y in (cy * 2)..(cy * 2 + 2).min(height) {
                for x in (cx * 2)..(cx * 2 + 2).min(width) {
                    let [pr, pg, pb] = rgb.get_pixel(x as u32, y as u32).0.map(i32::from);
                    r += pr;
                    g += pg;
                    b += pb;
                    n += 1;
                }
            }
            let (r, g, b) = (r / n, g / n, b / n);
            let u = (128 + ((-43 * r - 85 * g + 128 * b) >> 8)).clamp(0, 255) as u8;
            let v = (128 + ((128 * r - 107 * g - 21 * b) >> 8)).clamp(0, 255) as u8;

            let idx = cy * chroma_w + cx;
            match layout {
                YuvLayout::I420 => {
                    out[luma + idx] = u;
                    out[luma + chroma_w * chroma_h + idx] = v;
                }
                YuvLayout::Nv21 => {
                    out[luma + idx * 2] = v;
                    out[luma + idx * 2 + 1] = u;
                }
            }
        }
    }

    out
}

/// Build a YUV frame from an ordinary image file
pub fn yuv_frame_from_image<P: AsRef<Path>>(
    path: P,
    layout: YuvLayout,
    orientation: Orientation,
) -> Result<FrameDescriptor, ToolError> {
    let rgb = load_rgb(path)?;
    let format = match layout {
        YuvLayout::I420 => PixelFormat::Yuv420,
        YuvLayout::Nv21 => PixelFormat::Nv21,
    };
    Ok(FrameDescriptor::new(
        rgb.width(),
        rgb.height(),
        format,
        orientation,
        rgb_to_yuv420(&rgb, layout),
    ))
}

/// Wrap an encoded image file as a frame without decoding it
///
/// JPEG files are tagged `Jpeg`; anything else goes through the bitmap fallback.
pub fn encoded_frame_from_file<P: AsRef<Path>>(
    path: P,
    orientation: Orientation,
) -> Result<FrameDescriptor, ToolError> {
    let reader = ImageReader::open(path.as_ref())?.with_guessed_format()?;
    let format = match reader.format() {
        Some(ImageFormat::Jpeg) => PixelFormat::Jpeg,
        _ => PixelFormat::Other(0),
    };
    let (width, height) = reader.into_dimensions()?;
    let bytes = fs::read(path)?;
    Ok(FrameDescriptor::new(width, height, format, orientation, bytes))
}

/// Read a raw pixel dump captured from a camera
pub fn raw_frame_from_file<P: AsRef<Path>>(
    path: P,
    format: PixelFormat,
    width: u32,
    height: u32,
    orientation: Orientation,
) -> Result<FrameDescriptor, ToolError> {
    if width == 0 || height == 0 {
        return Err(ToolError::Usage("raw frames need --width and --height".to_string()));
    }
    let bytes = fs::read(path)?;
    Ok(FrameDescriptor::new(width, height, format, orientation, bytes))
}

/// Read a bridge-shaped JSON frame description
pub fn read_frame_json<P: AsRef<Path>>(path: P) -> Result<Value, ToolError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Default dataset root (`QR_FRAME_DATASET_ROOT`, else `tests/images`)
pub fn dataset_root_from_env() -> PathBuf {
    env::var("QR_FRAME_DATASET_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("tests/images"))
}

/// Sorted image paths under `root`, truncated to `limit`
pub fn dataset_iter<P: AsRef<Path>>(
    root: P,
    limit: Option<usize>,
) -> impl Iterator<Item = PathBuf> {
    let mut images = collect_images(root.as_ref());
    images.sort();
    if let Some(limit) = limit {
        images.truncate(limit);
    }
    images.into_iter()
}

fn collect_images(root: &Path) -> Vec<PathBuf> {
    let mut stack = vec![root.to_path_buf()];
    let mut images = Vec::new();

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if let Some(ext) = path.extension() {
                let ext = ext.to_string_lossy().to_lowercase();
                if ext == "png" || ext == "jpg" || ext == "jpeg" || ext == "bmp" {
                    images.push(path);
                }
            }
        }
    }

    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PixelRect;
    use crate::utils::yuv::yuv_to_rgb;
    use image::Rgb;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEMP_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let mut path = env::temp_dir();
        let sequence = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.push(format!("qr_frame_tools_{}_{}", std::process::id(), sequence));
        fs::create_dir_all(&path).expect("failed to create temp dir");
        path
    }

    #[test]
    fn test_yuv_round_trip_is_close() {
        let mut rgb = RgbImage::new(6, 4);
        for (x, y, px) in rgb.enumerate_pixels_mut() {
            *px = if x < 2 {
                Rgb([200, 40, 40])
            } else if y < 2 {
                Rgb([20, 20, 20])
            } else {
                Rgb([240, 240, 240])
            };
        }

        for layout in [YuvLayout::I420, YuvLayout::Nv21] {
            let yuv = rgb_to_yuv420(&rgb, layout);
            assert_eq!(yuv.len(), yuv420_len(6, 4));
            let back = yuv_to_rgb(&yuv, layout, 6, 4, PixelRect::new(0, 0, 6, 4)).unwrap();
            for (a, b) in rgb.pixels().zip(back.pixels()) {
                for c in 0..3 {
                    let diff = (a.0[c] as i32 - b.0[c] as i32).abs();
                    assert!(diff <= 12, "{:?} vs {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_dataset_iter_finds_images() {
        let root = temp_dir();
        fs::create_dir_all(root.join("nested")).unwrap();
        RgbImage::new(2, 2).save(root.join("b.png")).unwrap();
        RgbImage::new(2, 2).save(root.join("nested").join("a.png")).unwrap();
        fs::write(root.join("notes.txt"), "skip me").unwrap();

        let found: Vec<_> = dataset_iter(&root, None).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(dataset_iter(&root, Some(1)).count(), 1);

        let frame = encoded_frame_from_file(root.join("b.png"), Orientation::Portrait).unwrap();
        assert_eq!(frame.format, PixelFormat::Other(0));
        assert_eq!((frame.width, frame.height), (2, 2));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_raw_frame_needs_dimensions() {
        let err =
            raw_frame_from_file("missing.yuv", PixelFormat::Nv21, 0, 10, Orientation::Unknown)
                .unwrap_err();
        assert!(matches!(err, ToolError::Usage(_)));
    }
}
