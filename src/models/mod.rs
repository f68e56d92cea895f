/// Detection geometry and output records
pub mod detection;
/// Frame description types
pub mod frame;
/// Invocation outcomes
pub mod outcome;

pub use detection::{Bounds, DetectionResult, PixelRect, RawDetection};
pub use frame::{FrameDescriptor, Orientation, PixelFormat, Rotation};
pub use outcome::{ErrorKind, Outcome};
