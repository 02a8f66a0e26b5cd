use glam::{DMat4, DVec3, DVec4};

/// WGS84 semi-major axis in metres.
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 first eccentricity squared: e² = 2f - f²
const WGS84_E2: f64 = 2.0 * WGS84_F - WGS84_F * WGS84_F;

/// Convert geodetic (longitude, latitude, altitude) to ECEF XYZ.
///
/// Inputs are in **degrees** and metres.  Returns `[X, Y, Z]` in metres.
pub fn geodetic_to_ecef(lon_deg: f64, lat_deg: f64, alt_m: f64) -> [f64; 3] {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();

    // Radius of curvature in the prime vertical
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    [
        (n + alt_m) * cos_lat * lon.cos(),
        (n + alt_m) * cos_lat * lon.sin(),
        (n * (1.0 - WGS84_E2) + alt_m) * sin_lat,
    ]
}

/// East-North-Up frame at a geodetic point, expressed in ECEF.
///
/// Columns are East, North, Up and the ECEF origin, so local ENU
/// coordinates map straight to ECEF.
pub fn enu_frame(lon_deg: f64, lat_deg: f64, alt_m: f64) -> DMat4 {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();

    let (sin_lon, cos_lon) = lon.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();

    let east = DVec3::new(-sin_lon, cos_lon, 0.0);
    let north = DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
    let up = DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);
    let origin = DVec3::from(geodetic_to_ecef(lon_deg, lat_deg, alt_m));

    DMat4::from_cols(
        east.extend(0.0),
        north.extend(0.0),
        up.extend(0.0),
        origin.extend(1.0),
    )
}

/// Rotation about local up for a compass heading (degrees clockwise from
/// north).
pub fn heading_rotation(heading_deg: f64) -> DMat4 {
    DMat4::from_rotation_z(-heading_deg.to_radians())
}

/// Basis change taking Y-up model coordinates to Z-up: `(x, y, z) -> (x, -z, y)`.
pub fn y_up_to_z_up() -> DMat4 {
    DMat4::from_cols(DVec4::X, DVec4::Z, DVec4::NEG_Y, DVec4::W)
}

/// Return the 4×4 identity matrix (column-major).
pub fn identity_transform() -> [f64; 16] {
    #[rustfmt::skip]
    let m = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];
    m
}
