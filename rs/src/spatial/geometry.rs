use crate::core::types::Coordinate;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers.
///
/// Longitude differences are taken in raw radians, so pairs straddling the
/// antimeridian are not wrapped.
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1_rad = a.lat.to_radians();
    let lon1_rad = a.lon.to_radians();
    let lat2_rad = b.lat.to_radians();
    let lon2_rad = b.lon.to_radians();

    let dlat = lat2_rad - lat1_rad;
    let dlon = lon2_rad - lon1_rad;

    let h =
        (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn external_map_url(origin: Coordinate) -> String {
    format!("https://www.google.com/maps?q={},{}", origin.lat, origin.lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate { lat, lon }
    }

    #[test]
    fn distance_to_self_is_zero() {
        for point in [coord(51.5, -0.1), coord(-33.86, 151.2), coord(0.0, 0.0)] {
            assert_eq!(haversine_distance(point, point), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (coord(51.5, -0.1), coord(48.8566, 2.3522)),
            (coord(-33.86, 151.2), coord(35.68, 139.69)),
            (coord(10.0, 179.9), coord(10.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert_eq!(haversine_distance(a, b), haversine_distance(b, a));
        }
    }

    #[test]
    fn london_to_paris() {
        let d = haversine_distance(coord(51.5074, -0.1278), coord(48.8566, 2.3522));
        assert!((d - 343.5).abs() < 1.0, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_distance(coord(0.0, 0.0), coord(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn map_url_embeds_origin() {
        assert_eq!(
            external_map_url(coord(51.5, -0.1)),
            "https://www.google.com/maps?q=51.5,-0.1"
        );
    }
}
