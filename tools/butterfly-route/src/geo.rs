//! Great-circle helpers over (lon, lat) polylines

#[allow(deprecated)]
use geo::HaversineDistance;
use geo::Point;

/// Haversine distance in meters between two (lon, lat) points
#[allow(deprecated)]
pub fn haversine_distance(from: (f64, f64), to: (f64, f64)) -> f64 {
    let p1 = Point::new(from.0, from.1);
    let p2 = Point::new(to.0, to.1);
    p1.haversine_distance(&p2)
}

/// Length in meters of a polyline
pub fn polyline_length(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum()
}

/// Point at `fraction` (0..=1) of the polyline's length
///
/// Interpolation inside a segment is linear in degrees, which is accurate
/// enough at edge scale.
pub fn interpolate(points: &[(f64, f64)], fraction: f64) -> Option<(f64, f64)> {
    let (&first, rest) = points.split_first()?;
    if rest.is_empty() {
        return Some(first);
    }
    let target = polyline_length(points) * fraction.clamp(0.0, 1.0);
    let mut walked = 0.0;
    for pair in points.windows(2) {
        let segment = haversine_distance(pair[0], pair[1]);
        if segment > 0.0 && walked + segment >= target {
            let t = (target - walked) / segment;
            return Some((
                pair[0].0 + (pair[1].0 - pair[0].0) * t,
                pair[0].1 + (pair[1].1 - pair[0].1) * t,
            ));
        }
        walked += segment;
    }
    points.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leuven_to_brussels() {
        let meters = haversine_distance((4.7868, 50.8546), (4.3517, 50.8503));
        assert!((30_000.0..31_500.0).contains(&meters), "{meters}");
    }

    #[test]
    fn polyline_length_sums_segments() {
        let a = (4.780, 50.850);
        let b = (4.781, 50.850);
        let c = (4.781, 50.851);
        let total = polyline_length(&[a, b, c]);
        let parts = haversine_distance(a, b) + haversine_distance(b, c);
        assert!((total - parts).abs() < 1e-9);
        assert_eq!(polyline_length(&[a]), 0.0);
    }

    #[test]
    fn interpolation_hits_the_ends_and_middle() {
        let line = [(4.0, 50.0), (4.0, 50.002)];
        assert_eq!(interpolate(&line, 0.0), Some((4.0, 50.0)));
        let end = interpolate(&line, 1.0).unwrap();
        assert!((end.1 - 50.002).abs() < 1e-9);
        let mid = interpolate(&line, 0.5).unwrap();
        assert!((mid.1 - 50.001).abs() < 1e-6);
        assert_eq!(interpolate(&[], 0.5), None);
    }
}
