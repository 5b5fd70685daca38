//! Geospatial primitives
//!
//! Reference tables are small (tens of polygons, hundreds of points), so
//! lookups are linear scans. Haversine is the mandated distance metric.

use crate::types::{GeoPoint, MiningSite};

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Ray-casting point-in-polygon test over a single exterior ring.
///
/// The ring may be open or closed (first point repeated at the end);
/// both forms are handled. Points exactly on an edge are implementation-
/// defined, which is acceptable for zone attribution.
pub fn point_in_ring(point: GeoPoint, ring: &[GeoPoint]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let pi = ring[i];
        let pj = ring[j];
        let crosses = (pi.lat > point.lat) != (pj.lat > point.lat)
            && point.lon
                < (pj.lon - pi.lon) * (point.lat - pi.lat) / (pj.lat - pi.lat) + pi.lon;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Nearest mining site to a point, with its haversine distance in km.
pub fn nearest_site<'a>(
    point: GeoPoint,
    sites: &'a [MiningSite],
) -> Option<(&'a MiningSite, f64)> {
    sites
        .iter()
        .map(|site| (site, haversine_km(point, site.location)))
        .min_by(|(_, d1), (_, d2)| d1.total_cmp(d2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Lagos (Ikeja) to Abuja: roughly 520 km.
        let ikeja = GeoPoint::new(3.34, 6.60);
        let abuja = GeoPoint::new(7.49, 9.06);
        let d = haversine_km(ikeja, abuja);
        assert!((d - 525.0).abs() < 30.0, "got {d}");
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = GeoPoint::new(5.93, 12.11);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn test_point_in_ring_square() {
        let ring = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(2.0, 0.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(0.0, 2.0),
        ];
        assert!(point_in_ring(GeoPoint::new(1.0, 1.0), &ring));
        assert!(!point_in_ring(GeoPoint::new(3.0, 1.0), &ring));
        assert!(!point_in_ring(GeoPoint::new(-0.5, 0.5), &ring));
    }

    #[test]
    fn test_point_in_ring_closed_ring() {
        // Same square with the first vertex repeated.
        let ring = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(2.0, 0.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(0.0, 2.0),
            GeoPoint::new(0.0, 0.0),
        ];
        assert!(point_in_ring(GeoPoint::new(1.5, 1.5), &ring));
    }

    #[test]
    fn test_degenerate_ring_is_never_inside() {
        let ring = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)];
        assert!(!point_in_ring(GeoPoint::new(0.5, 0.5), &ring));
    }

    #[test]
    fn test_nearest_site_picks_minimum() {
        let sites = vec![
            MiningSite {
                name: "Far".into(),
                state: "Niger".into(),
                mineral_type: "gold".into(),
                informal_taxation_rate: 0.0,
                activity_level: String::new(),
                security_incidents_last_30_days: 0,
                location: GeoPoint::new(10.0, 10.0),
            },
            MiningSite {
                name: "Near".into(),
                state: "Zamfara".into(),
                mineral_type: "gold".into(),
                informal_taxation_rate: 0.0,
                activity_level: String::new(),
                security_incidents_last_30_days: 0,
                location: GeoPoint::new(6.0, 12.15),
            },
        ];
        let (site, dist) = nearest_site(GeoPoint::new(5.93, 12.11), &sites).unwrap();
        assert_eq!(site.name, "Near");
        assert!(dist < 10.0);
    }

    #[test]
    fn test_nearest_site_empty_is_none() {
        assert!(nearest_site(GeoPoint::new(0.0, 0.0), &[]).is_none());
    }
}
