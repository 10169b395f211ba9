use crate::config::EngineConfig;
use crate::models::GeofenceCheck;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in whole meters between two coordinate pairs.
/// Returns None when any coordinate is non-finite; a garbled position
/// must not pass the range check.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<i32> {
    if !(lat1.is_finite() && lon1.is_finite() && lat2.is_finite() && lon2.is_finite()) {
        return None;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    Some((EARTH_RADIUS_M * c).round() as i32)
}

pub fn check_geofence(
    latitude: f64,
    longitude: f64,
    config: &EngineConfig,
) -> Option<GeofenceCheck> {
    let distance_m = distance_meters(
        latitude,
        longitude,
        config.office_latitude,
        config.office_longitude,
    )?;

    Some(GeofenceCheck {
        distance_m,
        within_range: distance_m <= config.geofence_radius_m,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn config(radius_m: i32) -> EngineConfig {
        EngineConfig {
            office_latitude: 18.662431200582347,
            office_longitude: 73.7929215654713,
            geofence_radius_m: radius_m,
            late_cutoff: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
        }
    }

    #[test]
    fn identical_points_are_zero_and_in_range() {
        let cfg = config(0);
        let check = check_geofence(cfg.office_latitude, cfg.office_longitude, &cfg).unwrap();
        assert_eq!(check.distance_m, 0);
        assert!(check.within_range);
    }

    #[test]
    fn one_hundredth_degree_of_latitude_is_1112_meters() {
        let d = distance_meters(18.66, 73.79, 18.67, 73.79).unwrap();
        assert_eq!(d, 1112);
    }

    #[test]
    fn boundary_distance_counts_as_in_range() {
        let cfg = config(1112);
        let check = check_geofence(cfg.office_latitude + 0.01, cfg.office_longitude, &cfg).unwrap();
        assert_eq!(check.distance_m, 1112);
        assert!(check.within_range);

        let tight = config(1111);
        let check = check_geofence(tight.office_latitude + 0.01, tight.office_longitude, &tight)
            .unwrap();
        assert!(!check.within_range);
    }

    #[test]
    fn five_hundred_meters_out_with_small_radius() {
        let cfg = config(100);
        // 500 m due north of the office.
        let lat = cfg.office_latitude + 0.00449661;
        let check = check_geofence(lat, cfg.office_longitude, &cfg).unwrap();
        assert_eq!(check.distance_m, 500);
        assert!(!check.within_range);
    }

    #[test]
    fn non_finite_coordinates_fail_closed() {
        let cfg = config(100);
        assert!(check_geofence(f64::NAN, 73.79, &cfg).is_none());
        assert!(check_geofence(18.66, f64::INFINITY, &cfg).is_none());
        assert!(distance_meters(18.66, 73.79, f64::NEG_INFINITY, 73.79).is_none());
    }
}
