use crate::models::{Orientation, Rotation};

/// Decoder rotation for a device orientation
///
/// Total: `Unknown` (and any unrecognized name) maps to no rotation.
pub fn rotation_for(orientation: Orientation) -> Rotation {
    match orientation {
        Orientation::Portrait => Rotation::Deg0,
        Orientation::LandscapeLeft => Rotation::Deg90,
        Orientation::LandscapeRight => Rotation::Deg270,
        Orientation::PortraitUpsideDown => Rotation::Deg180,
        Orientation::Unknown => Rotation::Deg0,
    }
}

/// Decoder rotation for a capture-layer orientation name
pub fn rotation_for_name(name: &str) -> Rotation {
    rotation_for(Orientation::from_name(name))
}
