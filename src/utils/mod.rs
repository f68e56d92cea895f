//! Utility functions for frame preparation
//!
//! - Orientation to decoder rotation mapping
//! - YUV 4:2:0 to RGB conversion (planar and NV21)

/// Device orientation to decoder rotation
pub mod orientation;
/// YUV 4:2:0 pixel conversion
pub mod yuv;
