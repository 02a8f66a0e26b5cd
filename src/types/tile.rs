/// Geodetic bounding region: west, south, east, north in radians plus
/// minimum and maximum height in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRegion {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub min_height: f64,
    pub max_height: f64,
}

impl BoundingRegion {
    /// Build a region from degree extents.
    pub fn from_degrees(
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        min_height: f64,
        max_height: f64,
    ) -> Self {
        Self {
            west: west.to_radians(),
            south: south.to_radians(),
            east: east.to_radians(),
            north: north.to_radians(),
            min_height,
            max_height,
        }
    }

    /// Smallest region around a set of `[lon_deg, lat_deg, alt_m]` locations,
    /// grown by `margin_deg` horizontally and `height_extent` above the highest
    /// location.
    ///
    /// Returns `None` for an empty location list.
    pub fn around_locations(
        locations: &[[f64; 3]],
        margin_deg: f64,
        height_extent: f64,
    ) -> Option<Self> {
        let first = locations.first()?;
        let mut min = *first;
        let mut max = *first;
        for loc in &locations[1..] {
            for i in 0..3 {
                min[i] = min[i].min(loc[i]);
                max[i] = max[i].max(loc[i]);
            }
        }
        Some(Self::from_degrees(
            min[0] - margin_deg,
            min[1] - margin_deg,
            max[0] + margin_deg,
            max[1] + margin_deg,
            min[2],
            max[2] + height_extent,
        ))
    }

    /// `boundingVolume.region` array order.
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.west,
            self.south,
            self.east,
            self.north,
            self.min_height,
            self.max_height,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn from_degrees_converts_horizontal_only() {
        let r = BoundingRegion::from_degrees(4.45, 51.88, 4.50, 51.93, 0.0, 100.0);
        assert_relative_eq!(r.west, 4.45_f64.to_radians());
        assert_relative_eq!(r.north, 51.93_f64.to_radians());
        assert_eq!(r.min_height, 0.0);
        assert_eq!(r.max_height, 100.0);
    }

    #[test]
    fn around_locations_with_margin() {
        let locs = [[4.4889609, 51.9072021, 0.0], [4.4944118, 51.9068529, 5.0]];
        let r = BoundingRegion::around_locations(&locs, 0.01, 100.0).unwrap();
        assert_relative_eq!(r.west, (4.4889609_f64 - 0.01).to_radians(), epsilon = 1e-12);
        assert_relative_eq!(r.east, (4.4944118_f64 + 0.01).to_radians(), epsilon = 1e-12);
        assert_relative_eq!(r.south, (51.9068529_f64 - 0.01).to_radians(), epsilon = 1e-12);
        assert_relative_eq!(r.north, (51.9072021_f64 + 0.01).to_radians(), epsilon = 1e-12);
        assert_eq!(r.min_height, 0.0);
        assert_eq!(r.max_height, 105.0);
    }

    #[test]
    fn around_no_locations() {
        assert!(BoundingRegion::around_locations(&[], 0.01, 100.0).is_none());
    }

    #[test]
    fn array_order() {
        let r = BoundingRegion {
            west: 1.0,
            south: 2.0,
            east: 3.0,
            north: 4.0,
            min_height: 5.0,
            max_height: 6.0,
        };
        assert_eq!(r.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
