//! YUV 4:2:0 to RGB conversion for the bitmap fallback path
//!
//! Full-range BT.601 (JFIF) coefficients in 8.8 fixed point:
//! R = Y + 1.402 V'
//! G = Y - 0.344 U' - 0.714 V'
//! B = Y + 1.772 U'
//! where U' = U - 128 and V' = V - 128.

use crate::models::PixelRect;
use image::RgbImage;
use rayon::prelude::*;

const COEF_RV: i32 = 359;
const COEF_GU: i32 = 88;
const COEF_GV: i32 = 183;
const COEF_BU: i32 = 454;

/// Chroma arrangement of a 4:2:0 buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YuvLayout {
    /// Y plane, U plane, V plane
    I420,
    /// Y plane, interleaved V/U plane
    Nv21,
}

/// Bytes needed for a 4:2:0 frame of the given size (odd sizes round chroma up)
pub fn yuv420_len(width: usize, height: usize) -> usize {
    let chroma = width.div_ceil(2) * height.div_ceil(2);
    width * height + 2 * chroma
}

/// Full-resolution luma plane at the start of a 4:2:0 buffer
pub fn luma_plane(data: &[u8], width: usize, height: usize) -> Option<&[u8]> {
    data.get(..width * height)
}

struct Planes<'a> {
    data: &'a [u8],
    layout: YuvLayout,
    width: usize,
    chroma_width: usize,
    u_offset: usize,
    v_offset: usize,
}

impl<'a> Planes<'a> {
    fn new(data: &'a [u8], layout: YuvLayout, width: usize, height: usize) -> Self {
        let luma = width * height;
        let chroma_width = width.div_ceil(2);
        let chroma_plane = chroma_width * height.div_ceil(2);
        let (u_offset, v_offset) = match layout {
            YuvLayout::I420 => (luma, luma + chroma_plane),
            YuvLayout::Nv21 => (luma + 1, luma),
        };
        Self {
            data,
            layout,
            width,
            chroma_width,
            u_offset,
            v_offset,
        }
    }

    #[inline]
    fn chroma(&self, x: usize, y: usize) -> (i32, i32) {
        let (cx, cy) = (x / 2, y / 2);
        let idx = match self.layout {
            YuvLayout::I420 => cy * self.chroma_width + cx,
            YuvLayout::Nv21 => (cy * self.chroma_width + cx) * 2,
        };
        (
            self.data[self.u_offset + idx] as i32 - 128,
            self.data[self.v_offset + idx] as i32 - 128,
        )
    }

    /// Fill one output row covering columns `x0..x0 + row.len() / 3` of source row `y`
    fn convert_row(&self, y: usize, x0: usize, row: &mut [u8]) {
        for (i, px) in row.chunks_exact_mut(3).enumerate() {
            let x = x0 + i;
            let luma = self.data[y * self.width + x] as i32;
            let (u, v) = self.chroma(x, y);
            px[0] = clamp_u8(luma + ((COEF_RV * v) >> 8));
            px[1] = clamp_u8(luma - ((COEF_GU * u + COEF_GV * v) >> 8));
            px[2] = clamp_u8(luma + ((COEF_BU * u) >> 8));
        }
    }
}

#[inline]
fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Validate inputs and clip `region` to the frame. Returns the usable region.
fn prepare(data: &[u8], width: usize, height: usize, region: PixelRect) -> Option<PixelRect> {
    if width == 0 || height == 0 || data.len() < yuv420_len(width, height) {
        return None;
    }
    region.clip_to(u32::try_from(width).ok()?, u32::try_from(height).ok()?)
}

/// Convert the `region` of a 4:2:0 frame to RGB, processing rows in parallel
///
/// Returns `None` when the buffer is too short for `width` x `height` or the
/// region does not overlap the frame.
pub fn yuv_to_rgb(
    data: &[u8],
    layout: YuvLayout,
    width: usize,
    height: usize,
    region: PixelRect,
) -> Option<RgbImage> {
    let region = prepare(data, width, height, region)?;
    let planes = Planes::new(data, layout, width, height);
    let (x0, y0) = (region.x as usize, region.y as usize);
    let (out_w, out_h) = (region.width as usize, region.height as usize);

    let mut rgb = vec![0u8; out_w * out_h * 3];
    rgb.par_chunks_mut(out_w * 3)
        .enumerate()
        .for_each(|(row_idx, row)| planes.convert_row(y0 + row_idx, x0, row));

    RgbImage::from_raw(out_w as u32, out_h as u32, rgb)
}

/// Single-threaded variant of [`yuv_to_rgb`]
pub fn yuv_to_rgb_serial(
    data: &[u8],
    layout: YuvLayout,
    width: usize,
    height: usize,
    region: PixelRect,
) -> Option<RgbImage> {
    let region = prepare(data, width, height, region)?;
    let planes = Planes::new(data, layout, width, height);
    let (x0, y0) = (region.x as usize, region.y as usize);
    let (out_w, out_h) = (region.width as usize, region.height as usize);

    let mut rgb = vec![0u8; out_w * out_h * 3];
    for (row_idx, row) in rgb.chunks_mut(out_w * 3).enumerate() {
        planes.convert_row(y0 + row_idx, x0, row);
    }

    RgbImage::from_raw(out_w as u32, out_h as u32, rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_i420(width: usize, height: usize, y: u8, u: u8, v: u8) -> Vec<u8> {
        let luma = width * height;
        let chroma = width.div_ceil(2) * height.div_ceil(2);
        let mut data = vec![y; luma];
        data.extend(std::iter::repeat_n(u, chroma));
        data.extend(std::iter::repeat_n(v, chroma));
        data
    }

    fn solid_nv21(width: usize, height: usize, y: u8, u: u8, v: u8) -> Vec<u8> {
        let mut data = vec![y; width * height];
        for _ in 0..width.div_ceil(2) * height.div_ceil(2) {
            data.push(v);
            data.push(u);
        }
        data
    }

    #[test]
    fn test_yuv420_len() {
        assert_eq!(yuv420_len(640, 480), 640 * 480 * 3 / 2);
        assert_eq!(yuv420_len(3, 3), 9 + 2 * 4);
        assert_eq!(yuv420_len(1, 1), 3);
    }

    #[test]
    fn test_neutral_gray() {
        let data = solid_i420(4, 4, 128, 128, 128);
        let rgb = yuv_to_rgb(&data, YuvLayout::I420, 4, 4, PixelRect::new(0, 0, 4, 4)).unwrap();
        assert!(rgb.pixels().all(|p| p.0 == [128, 128, 128]));
    }

    #[test]
    fn test_red() {
        // BT.601 full-range red
        let data = solid_nv21(2, 2, 76, 85, 255);
        let rgb = yuv_to_rgb(&data, YuvLayout::Nv21, 2, 2, PixelRect::new(0, 0, 2, 2)).unwrap();
        let [r, g, b] = rgb.get_pixel(1, 1).0;
        assert!(r >= 250, "r = {}", r);
        assert!(g <= 5, "g = {}", g);
        assert!(b <= 5, "b = {}", b);
    }

    #[test]
    fn test_layouts_agree() {
        let i420 = solid_i420(6, 4, 90, 60, 200);
        let nv21 = solid_nv21(6, 4, 90, 60, 200);
        let full = PixelRect::new(0, 0, 6, 4);
        let a = yuv_to_rgb(&i420, YuvLayout::I420, 6, 4, full).unwrap();
        let b = yuv_to_rgb(&nv21, YuvLayout::Nv21, 6, 4, full).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_serial_matches_parallel() {
        let mut data = solid_i420(7, 5, 0, 100, 150);
        for (i, byte) in data.iter_mut().take(35).enumerate() {
            *byte = (i * 7) as u8;
        }
        let full = PixelRect::new(0, 0, 7, 5);
        let a = yuv_to_rgb(&data, YuvLayout::I420, 7, 5, full).unwrap();
        let b = yuv_to_rgb_serial(&data, YuvLayout::I420, 7, 5, full).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_region_is_clipped() {
        let data = solid_i420(8, 8, 200, 128, 128);
        let rgb = yuv_to_rgb(&data, YuvLayout::I420, 8, 8, PixelRect::new(4, 2, 10, 10)).unwrap();
        assert_eq!(rgb.dimensions(), (4, 6));
    }

    #[test]
    fn test_short_buffer() {
        let data = vec![0u8; 10];
        assert!(yuv_to_rgb(&data, YuvLayout::Nv21, 4, 4, PixelRect::new(0, 0, 4, 4)).is_none());
        assert!(luma_plane(&data, 4, 4).is_none());
    }
}
