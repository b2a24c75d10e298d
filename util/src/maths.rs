//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Linearly interpolate between `from` and `to`.
///
/// A `ratio` of 0 gives `from`, a `ratio` of 1 gives `to`. The ratio is not
/// clamped, callers which need a bounded result shall clamp it first.
pub fn lerp<T>(from: T, to: T, ratio: T) -> T
where
    T: Float
{
    ratio * to + (T::one() - ratio) * from
}

/// Clamp a value into the closed range `[min, max]`.
///
/// A NaN value is returned as `min` so that it can never leak out as an
/// unbounded result.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    if value.is_nan() {
        return min
    }

    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Returns true if `value` lies within the closed range `[min, max]`.
///
/// NaN is never within range.
pub fn within<T>(value: T, min: T, max: T) -> bool
where
    T: Float
{
    value >= min && value <= max
}
