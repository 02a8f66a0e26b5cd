pub mod ecef;

use glam::DMat4;

use ecef::{enu_frame, heading_rotation, y_up_to_z_up};

/// Geodetic placement of one asset: degrees, metres and a compass heading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Placement {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    /// Degrees clockwise from north.
    pub heading: f64,
}

/// Model → ECEF matrix for a placement.
///
/// Applied right to left: optional Y-up → Z-up basis change, heading about
/// local up, then the ENU frame at the location.
pub fn placement_matrix(placement: &Placement, y_up: bool) -> DMat4 {
    let mut m = enu_frame(placement.longitude, placement.latitude, placement.altitude);
    if placement.heading != 0.0 {
        m *= heading_rotation(placement.heading);
    }
    if y_up {
        m *= y_up_to_z_up();
    }
    m
}

/// Column-major form of [`placement_matrix`], as stored on a `PlacedMesh`.
pub fn placement_transform(placement: &Placement, y_up: bool) -> [f64; 16] {
    placement_matrix(placement, y_up).to_cols_array()
}
