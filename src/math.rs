//! Shared numeric helpers: Haversine distance and local-plane projection
//! constants (`SPEC_FULL.md` §4.3, §4.5.1).

/// Mean Earth radius, metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Kilometres per degree of longitude at the reference latitude used for the
/// local plane (§4.5.1).
pub const LON_SCALE_KM_PER_DEG: f64 = 88.8;
/// Kilometres per degree of latitude.
pub const LAT_SCALE_KM_PER_DEG: f64 = 111.0;

/// Converts a (m/s)·day quantity into kilometres (§4.5.2).
pub const K_UPS: f64 = 86.4;

/// Great-circle distance between two lon/lat points, in metres.
pub fn haversine_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Local-plane kilometre offset of `(lon, lat)` relative to `(lon0, lat0)`.
pub fn to_local_plane_km(lon: f64, lat: f64, lon0: f64, lat0: f64) -> (f64, f64) {
    (
        (lon - lon0) * LON_SCALE_KM_PER_DEG,
        (lat - lat0) * LAT_SCALE_KM_PER_DEG,
    )
}

/// Inverse of `to_local_plane_km`.
pub fn from_local_plane_km(x_km: f64, y_km: f64, lon0: f64, lat0: f64) -> (f64, f64) {
    (
        lon0 + x_km / LON_SCALE_KM_PER_DEG,
        lat0 + y_km / LAT_SCALE_KM_PER_DEG,
    )
}

/// Day-of-year in `[1, 366]` computed from a (year, month, day) calendar date,
/// used by the winter-season convective-mixing rule (§4.5.4).
pub fn day_of_year(year: i32, month: u32, day: u32) -> u32 {
    use chrono::{Datelike, NaiveDate};
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|d| d.ordinal())
        .unwrap_or(1)
}

/// Northern-hemisphere winter convention: day-of-year < 90 or > 335 (§4.5.4).
pub fn is_winter(day_of_year: u32) -> bool {
    day_of_year < 90 || day_of_year > 335
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_same_point_is_zero() {
        assert!(haversine_m(10.0, 45.0, 10.0, 45.0) < 1e-6);
    }

    #[test]
    fn haversine_symmetric() {
        let a = haversine_m(0.0, 0.0, 1.0, 1.0);
        let b = haversine_m(1.0, 1.0, 0.0, 0.0);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn local_plane_round_trip() {
        let (x, y) = to_local_plane_km(12.5, 43.2, 12.0, 43.0);
        let (lon, lat) = from_local_plane_km(x, y, 12.0, 43.0);
        assert!((lon - 12.5).abs() < 1e-9);
        assert!((lat - 43.2).abs() < 1e-9);
    }

    #[test]
    fn winter_convention() {
        assert!(is_winter(1));
        assert!(is_winter(89));
        assert!(!is_winter(90));
        assert!(!is_winter(335));
        assert!(is_winter(336));
    }
}
