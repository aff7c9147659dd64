/// Index of the coordinate value closest to `target`
///
/// Non-finite coordinate values are ignored. Ties resolve to the lower index.
///
/// # Examples
/// ```
/// use station_twin::utils::coordinates::nearest_index;
///
/// assert_eq!(nearest_index(&[50.0, 50.25, 50.5], 50.3), Some(1));
/// assert_eq!(nearest_index(&[], 50.3), None);
/// ```
pub fn nearest_index(values: &[f64], target: f64) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, v)| {
            let distance = (v - target).abs();
            match best {
                Some((_, d)) if d <= distance => best,
                _ => Some((i, distance)),
            }
        })
        .map(|(i, _)| i)
}

/// Express a longitude in the convention used by a grid axis
///
/// Reanalysis grids are often stored on 0..360 while station metadata uses
/// -180..180.
pub fn align_longitude(longitude: f64, grid_lons: &[f64]) -> f64 {
    let uses_positive_range = grid_lons.iter().any(|&lon| lon > 180.0);
    if uses_positive_range && longitude < 0.0 {
        longitude + 360.0
    } else if !uses_positive_range && longitude > 180.0 {
        longitude - 360.0
    } else {
        longitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_index() {
        let lats = [52.0, 51.75, 51.5, 51.25];
        assert_eq!(nearest_index(&lats, 51.6), Some(2));
        assert_eq!(nearest_index(&lats, 60.0), Some(0));
        assert_eq!(nearest_index(&lats, 40.0), Some(3));
    }

    #[test]
    fn test_nearest_index_skips_nan() {
        let lons = [f64::NAN, 8.0, 8.25];
        assert_eq!(nearest_index(&lons, 7.0), Some(1));
        assert_eq!(nearest_index(&[f64::NAN], 7.0), None);
    }

    #[test]
    fn test_nearest_index_tie_prefers_lower() {
        assert_eq!(nearest_index(&[1.0, 2.0], 1.5), Some(0));
    }

    #[test]
    fn test_align_longitude() {
        assert_eq!(align_longitude(-0.5, &[359.0, 359.25, 359.5]), 359.5);
        assert_eq!(align_longitude(8.4, &[8.0, 8.25, 8.5]), 8.4);
        assert_eq!(align_longitude(350.0, &[-11.0, -10.0]), -10.0);
    }
}
