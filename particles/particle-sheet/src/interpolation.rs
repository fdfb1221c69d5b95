//! Knot interpolation used to build sample tables

/// Bracketing values and blend weight for one sample position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnotBlend {
    /// Value at the knot before the position
    pub value_a: f32,
    /// Value at the knot after the position
    pub value_b: f32,
    /// Weight of `value_b`, 0..=1
    pub blend: f32,
}

/// Find the knots around `position` and how far between them it lies.
///
/// `knots` must be ascending and within `0..range`. With `wrap` the gap
/// between the last knot and the first one (through `range`) is used for
/// positions outside the knot span; without it those positions hold the
/// first or last value with a blend of 1.
///
/// `knots` and `values` must be the same length and non-empty.
pub fn knot_blend(knots: &[f32], values: &[f32], range: f32, position: f32, wrap: bool) -> KnotBlend {
    let count = knots.len().min(values.len());
    if count == 0 {
        return KnotBlend {
            value_a: 0.0,
            value_b: 0.0,
            blend: 1.0,
        };
    }

    let idx = knots[..count]
        .iter()
        .position(|&knot| knot >= position)
        .unwrap_or(count);

    let (knot_a, knot_b, gap, offset) = if idx == 0 || idx == count {
        if !wrap {
            let value = if idx == 0 { values[0] } else { values[count - 1] };
            return KnotBlend {
                value_a: value,
                value_b: value,
                blend: 1.0,
            };
        }
        let last = count - 1;
        let tail = range - knots[last];
        let gap = knots[0] + tail;
        let offset = if idx == 0 {
            position + tail
        } else {
            position - knots[last]
        };
        (last, 0, gap, offset)
    } else {
        (
            idx - 1,
            idx,
            knots[idx] - knots[idx - 1],
            position - knots[idx - 1],
        )
    };

    let blend = if gap > 0.0 { offset / gap } else { 0.0 };
    KnotBlend {
        value_a: values[knot_a],
        value_b: values[knot_b],
        blend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOTS: [f32; 3] = [0.0, 128.0, 384.0];
    const VALUES: [f32; 3] = [0.0, 1.0, 2.0];

    #[test]
    fn test_between_knots() {
        let blend = knot_blend(&KNOTS, &VALUES, 512.0, 256.0, false);
        assert_eq!(blend.value_a, 1.0);
        assert_eq!(blend.value_b, 2.0);
        assert!((blend.blend - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_past_last_knot_clamps() {
        let blend = knot_blend(&KNOTS, &VALUES, 512.0, 450.0, false);
        assert_eq!(blend.value_a, 2.0);
        assert_eq!(blend.value_b, 2.0);
        assert_eq!(blend.blend, 1.0);
    }

    #[test]
    fn test_past_last_knot_wraps_to_first() {
        // gap from 384 through 512 back to 0 is 128 long
        let blend = knot_blend(&KNOTS, &VALUES, 512.0, 448.0, true);
        assert_eq!(blend.value_a, 2.0);
        assert_eq!(blend.value_b, 0.0);
        assert!((blend.blend - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_first_position_on_first_knot() {
        let clamped = knot_blend(&KNOTS, &VALUES, 512.0, 0.0, false);
        assert_eq!((clamped.value_a, clamped.value_b), (0.0, 0.0));

        let wrapped = knot_blend(&KNOTS, &VALUES, 512.0, 0.0, true);
        assert_eq!(wrapped.value_a, 2.0);
        assert_eq!(wrapped.value_b, 0.0);
        assert!((wrapped.blend - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_gap_does_not_divide() {
        let blend = knot_blend(&[0.0, 10.0, 10.0], &VALUES, 512.0, 10.0, false);
        assert!(blend.blend.is_finite());
    }
}
