use num_traits::Float;

#[inline]
pub fn lerp<T>(delta: T, start: T, end: T) -> T
where
    T: Float,
{
    start + delta * (end - start)
}

#[inline]
pub fn lerp_progress<T>(value: T, start: T, end: T) -> T
where
    T: Float,
{
    (value - start) / (end - start)
}

#[inline]
pub fn map<T>(value: T, old_start: T, old_end: T, new_start: T, new_end: T) -> T
where
    T: Float,
{
    lerp(lerp_progress(value, old_start, old_end), new_start, new_end)
}

/// Quintic smootherstep `6t^5 - 15t^4 + 10t^3`.
///
/// Zero first and second derivative at t = 0 and t = 1, so interpolated
/// segments join without visible creases even after summing octaves.
#[inline]
pub fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6f64 - 15f64) + 10f64)
}

/// Integer part and fractional remainder of a coordinate, with the integer
/// part rounded toward negative infinity so the fraction is always in [0, 1).
#[inline]
pub fn floor_split(value: f64) -> (i64, f64) {
    let floored = value.floor();
    (floored as i64, value - floored)
}

#[inline]
pub const fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints() {
        assert_eq!(lerp(0.0, 3.0, 9.0), 3.0);
        assert_eq!(lerp(1.0, 3.0, 9.0), 9.0);
        assert_eq!(lerp(0.5, -1.0, 1.0), 0.0);
    }

    #[test]
    fn fade_fixed_points() {
        assert_eq!(fade(0.0), 0.0);
        assert_eq!(fade(1.0), 1.0);
        assert_eq!(fade(0.5), 0.5);
    }

    #[test]
    fn fade_flat_at_boundaries() {
        // Finite-difference slope at both ends must be ~0 for seam-free
        // octave summation.
        let eps = 1e-6;
        assert!((fade(eps) / eps) < 1e-4);
        assert!(((fade(1.0) - fade(1.0 - eps)) / eps) < 1e-4);
    }

    #[test]
    fn floor_split_negative() {
        let values = [
            (2.75, (2, 0.75)),
            (-0.25, (-1, 0.75)),
            (-3.0, (-3, 0.0)),
            (0.0, (0, 0.0)),
        ];
        for (input, (cell, dist)) in values {
            let (c, d) = floor_split(input);
            assert_eq!(c, cell);
            assert!((d - dist).abs() < 1e-12);
        }
    }

    #[test]
    fn power_of_two_checks() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(64));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(48));
    }
}
