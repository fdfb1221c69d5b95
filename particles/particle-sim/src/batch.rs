//! Four-particle batch values
//!
//! The block path processes particles four at a time. [`F32x4`] and
//! [`FourVectors`] hold one lane per particle; the arithmetic is written lane
//! by lane so the compiler can vectorise it without tying operators to a
//! particular instruction set.

use glam::Vec3;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// Lanes per batch
pub const LANES: usize = 4;

/// Four floats, one per particle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct F32x4(pub [f32; LANES]);

/// Four integers, one per particle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FourInts(pub [i32; LANES]);

/// Per-lane condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mask4(pub [bool; LANES]);

impl Mask4 {
    /// Lanes below `live` set, the rest clear
    pub fn first(live: usize) -> Self {
        Self(std::array::from_fn(|lane| lane < live))
    }

    /// Whether any lane is set
    pub fn any(self) -> bool {
        self.0.iter().any(|&lane| lane)
    }

    /// Whether every lane is set
    pub fn all(self) -> bool {
        self.0.iter().all(|&lane| lane)
    }

    /// Lane-wise and
    pub fn and(self, other: Self) -> Self {
        Self(std::array::from_fn(|lane| self.0[lane] && other.0[lane]))
    }
}

impl F32x4 {
    /// All lanes zero
    pub const ZERO: Self = Self([0.0; LANES]);
    /// All lanes one
    pub const ONE: Self = Self([1.0; LANES]);

    /// Same value in every lane
    #[inline]
    pub fn splat(value: f32) -> Self {
        Self([value; LANES])
    }

    /// Lane value
    #[inline]
    pub fn lane(self, lane: usize) -> f32 {
        self.0[lane]
    }

    /// Apply `f` to every lane
    #[inline]
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self(self.0.map(f))
    }

    /// Combine two batches lane by lane
    #[inline]
    pub fn zip(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Self(std::array::from_fn(|lane| f(self.0[lane], other.0[lane])))
    }

    /// Lane-wise minimum
    #[inline]
    pub fn min(self, other: Self) -> Self {
        self.zip(other, f32::min)
    }

    /// Lane-wise maximum
    #[inline]
    pub fn max(self, other: Self) -> Self {
        self.zip(other, f32::max)
    }

    /// Lane-wise square root
    #[inline]
    pub fn sqrt(self) -> Self {
        self.map(f32::sqrt)
    }

    /// Lane-wise power
    #[inline]
    pub fn powf(self, exponent: f32) -> Self {
        self.map(|value| value.powf(exponent))
    }

    /// Lanes where `self < other`
    #[inline]
    pub fn lt(self, other: Self) -> Mask4 {
        Mask4(std::array::from_fn(|lane| self.0[lane] < other.0[lane]))
    }

    /// Lanes where `self > other`
    #[inline]
    pub fn gt(self, other: Self) -> Mask4 {
        Mask4(std::array::from_fn(|lane| self.0[lane] > other.0[lane]))
    }

    /// Lanes where `self >= other`
    #[inline]
    pub fn ge(self, other: Self) -> Mask4 {
        Mask4(std::array::from_fn(|lane| self.0[lane] >= other.0[lane]))
    }

    /// `if_true` where the mask is set, `self` elsewhere
    #[inline]
    pub fn select(self, mask: Mask4, if_true: Self) -> Self {
        Self(std::array::from_fn(|lane| {
            if mask.0[lane] {
                if_true.0[lane]
            } else {
                self.0[lane]
            }
        }))
    }
}

macro_rules! impl_lane_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for F32x4 {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                self.zip(rhs, |a, b| a $op b)
            }
        }

        impl $trait<f32> for F32x4 {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: f32) -> Self {
                self.map(|a| a $op rhs)
            }
        }
    };
}

impl_lane_op!(Add, add, +);
impl_lane_op!(Sub, sub, -);
impl_lane_op!(Mul, mul, *);
impl_lane_op!(Div, div, /);

impl Neg for F32x4 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.map(|value| -value)
    }
}

impl FourInts {
    /// Same value in every lane
    #[inline]
    pub fn splat(value: i32) -> Self {
        Self([value; LANES])
    }

    /// Lane value
    #[inline]
    pub fn lane(self, lane: usize) -> i32 {
        self.0[lane]
    }
}

/// Four 3-vectors stored component-wise
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FourVectors {
    pub x: F32x4,
    pub y: F32x4,
    pub z: F32x4,
}

impl FourVectors {
    /// All lanes zero
    pub const ZERO: Self = Self {
        x: F32x4::ZERO,
        y: F32x4::ZERO,
        z: F32x4::ZERO,
    };

    /// Same vector in every lane
    #[inline]
    pub fn splat(v: Vec3) -> Self {
        Self {
            x: F32x4::splat(v.x),
            y: F32x4::splat(v.y),
            z: F32x4::splat(v.z),
        }
    }

    /// Build from four vectors
    pub fn from_lanes(lanes: [Vec3; LANES]) -> Self {
        Self {
            x: F32x4(lanes.map(|v| v.x)),
            y: F32x4(lanes.map(|v| v.y)),
            z: F32x4(lanes.map(|v| v.z)),
        }
    }

    /// Vector in one lane
    #[inline]
    pub fn lane(&self, lane: usize) -> Vec3 {
        Vec3::new(self.x.0[lane], self.y.0[lane], self.z.0[lane])
    }

    /// Overwrite one lane
    #[inline]
    pub fn set_lane(&mut self, lane: usize, v: Vec3) {
        self.x.0[lane] = v.x;
        self.y.0[lane] = v.y;
        self.z.0[lane] = v.z;
    }

    /// Lane-wise dot product
    #[inline]
    pub fn dot(&self, other: &Self) -> F32x4 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Lane-wise squared length
    #[inline]
    pub fn length_squared(&self) -> F32x4 {
        self.dot(self)
    }

    /// Lane-wise length
    #[inline]
    pub fn length(&self) -> F32x4 {
        self.length_squared().sqrt()
    }

    /// Lane-wise squared distance
    #[inline]
    pub fn distance_squared(&self, other: &Self) -> F32x4 {
        (*self - *other).length_squared()
    }

    /// Normalise every lane, leaving zero-length lanes at zero
    pub fn normalize_or_zero(&self) -> Self {
        let length = self.length();
        let inv = length.map(|l| if l > f32::EPSILON { 1.0 / l } else { 0.0 });
        *self * inv
    }

    /// Rotate by a control-point basis: `x * forward - y * right + z * up`
    pub fn rotate_by(&self, forward: Vec3, right: Vec3, up: Vec3) -> Self {
        let axis = |v: Vec3| Self::splat(v);
        axis(forward) * self.x - axis(right) * self.y + axis(up) * self.z
    }

    /// Lane-wise select
    pub fn select(self, mask: Mask4, if_true: Self) -> Self {
        Self {
            x: self.x.select(mask, if_true.x),
            y: self.y.select(mask, if_true.y),
            z: self.z.select(mask, if_true.z),
        }
    }
}

impl Add for FourVectors {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl Sub for FourVectors {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl Mul<F32x4> for FourVectors {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: F32x4) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
        }
    }
}

impl Mul<f32> for FourVectors {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        self * F32x4::splat(rhs)
    }
}

impl Mul for FourVectors {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self {
            x: self.x * rhs.x,
            y: self.y * rhs.y,
            z: self.z * rhs.z,
        }
    }
}

impl AddAssign for FourVectors {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for FourVectors {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign<F32x4> for FourVectors {
    #[inline]
    fn mul_assign(&mut self, rhs: F32x4) {
        *self = *self * rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_arithmetic() {
        let a = F32x4([1.0, 2.0, 3.0, 4.0]);
        let b = F32x4::splat(2.0);
        assert_eq!(a * b, F32x4([2.0, 4.0, 6.0, 8.0]));
        assert_eq!(a - 1.0, F32x4([0.0, 1.0, 2.0, 3.0]));
        assert_eq!(a.max(F32x4::splat(2.5)), F32x4([2.5, 2.5, 3.0, 4.0]));
    }

    #[test]
    fn test_select_and_masks() {
        let a = F32x4([1.0, 2.0, 3.0, 4.0]);
        let mask = a.gt(F32x4::splat(2.0));
        assert_eq!(mask, Mask4([false, false, true, true]));
        assert_eq!(a.select(mask, F32x4::ZERO), F32x4([1.0, 2.0, 0.0, 0.0]));
        assert_eq!(Mask4::first(3), Mask4([true, true, true, false]));
        assert!(Mask4::first(1).any());
        assert!(!Mask4::first(3).all());
    }

    #[test]
    fn test_four_vectors_lanes() {
        let mut v = FourVectors::splat(Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(v.length(), F32x4::splat(5.0));
        v.set_lane(2, Vec3::ZERO);
        let n = v.normalize_or_zero();
        assert_eq!(n.lane(2), Vec3::ZERO);
        assert!((n.lane(0) - Vec3::new(0.6, 0.8, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_rotate_by_basis() {
        let v = FourVectors::splat(Vec3::new(1.0, 1.0, 1.0));
        let rotated = v.rotate_by(Vec3::X, Vec3::NEG_Y, Vec3::Z);
        assert_eq!(rotated.lane(0), Vec3::new(1.0, 1.0, 1.0));
    }
}
