use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg, Sub, SubAssign};

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Index of the longitudinal axis in 3D vectors.
pub const LON: usize = 0;

/// A vector of `DIM` doubles in device coordinates.
///
/// 2D vectors are `(tran, vert)`, 3D vectors are `(lon, tran, vert)`.
/// The vertical axis is always the last component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DVec<const DIM: usize>(pub [f64; DIM]);

pub type Vec2 = DVec<2>;
pub type Vec3 = DVec<3>;

pub fn vec2(tran: f64, vert: f64) -> Vec2 {
    DVec([tran, vert])
}

pub fn vec3(lon: f64, tran: f64, vert: f64) -> Vec3 {
    DVec([lon, tran, vert])
}

impl<const DIM: usize> DVec<DIM> {
    pub const ZERO: Self = DVec([0.0; DIM]);

    /// Index of the vertical axis.
    pub const VERT: usize = DIM - 1;

    /// Index of the transverse axis.
    pub const TRAN: usize = DIM - 2;

    pub fn new(components: [f64; DIM]) -> Self {
        DVec(components)
    }

    /// Vector with the given vertical component and zeros elsewhere.
    pub fn up(vert: f64) -> Self {
        let mut v = Self::ZERO;
        v.0[Self::VERT] = vert;
        v
    }

    pub fn components(&self) -> &[f64; DIM] {
        &self.0
    }

    pub fn vert(&self) -> f64 {
        self.0[Self::VERT]
    }

    pub fn vert_mut(&mut self) -> &mut f64 {
        &mut self.0[Self::VERT]
    }

    pub fn tran(&self) -> f64 {
        self.0[Self::TRAN]
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|c| *c == 0.0)
    }

    fn zip_with(self, other: Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let mut out = self.0;
        for (o, b) in out.iter_mut().zip(other.0.iter()) {
            *o = f(*o, *b);
        }
        DVec(out)
    }

    pub fn min(self, other: Self) -> Self {
        self.zip_with(other, f64::min)
    }

    pub fn max(self, other: Self) -> Self {
        self.zip_with(other, f64::max)
    }
}

impl Vec3 {
    pub fn lon(&self) -> f64 {
        self.0[LON]
    }
}

impl<const DIM: usize> Default for DVec<DIM> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<const DIM: usize> Index<usize> for DVec<DIM> {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl<const DIM: usize> IndexMut<usize> for DVec<DIM> {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl<const DIM: usize> Add for DVec<DIM> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl<const DIM: usize> AddAssign for DVec<DIM> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const DIM: usize> Sub for DVec<DIM> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl<const DIM: usize> SubAssign for DVec<DIM> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<const DIM: usize> Neg for DVec<DIM> {
    type Output = Self;

    fn neg(self) -> Self {
        DVec(self.0.map(|c| -c))
    }
}

impl<const DIM: usize> Mul<f64> for DVec<DIM> {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        DVec(self.0.map(|c| c * rhs))
    }
}

impl<const DIM: usize> fmt::Display for DVec<DIM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}

// serde only provides array impls for fixed lengths, so vectors go through a tuple.
impl<const DIM: usize> Serialize for DVec<DIM> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(DIM)?;
        for c in &self.0 {
            tuple.serialize_element(c)?;
        }
        tuple.end()
    }
}

impl<'de, const DIM: usize> Deserialize<'de> for DVec<DIM> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DVecVisitor<const N: usize>;

        impl<'de, const N: usize> Visitor<'de> for DVecVisitor<N> {
            type Value = DVec<N>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a sequence of {N} numbers")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<DVec<N>, A::Error> {
                let mut out = [0.0; N];
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                if seq.next_element::<f64>()?.is_some() {
                    return Err(de::Error::invalid_length(N + 1, &self));
                }
                Ok(DVec(out))
            }
        }

        deserializer.deserialize_tuple(DIM, DVecVisitor::<DIM>)
    }
}

/// An axis-aligned box given by its lower and upper corners.
///
/// The box is valid when `lower[i] <= upper[i]` on every axis. Constructors
/// accept corners in any order; call [`BBox::fix`] (or use [`BBox::from_corners`])
/// before relying on validity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox<const DIM: usize> {
    pub lower: DVec<DIM>,
    pub upper: DVec<DIM>,
}

pub type Box2 = BBox<2>;
pub type Box3 = BBox<3>;

impl<const DIM: usize> BBox<DIM> {
    pub const ZERO: Self = BBox {
        lower: DVec::ZERO,
        upper: DVec::ZERO,
    };

    pub fn new(lower: DVec<DIM>, upper: DVec<DIM>) -> Self {
        Self { lower, upper }
    }

    /// Box spanned by two arbitrary corners, normalized.
    pub fn from_corners(a: DVec<DIM>, b: DVec<DIM>) -> Self {
        Self {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    /// Smallest box containing all given points.
    pub fn from_points<I: IntoIterator<Item = DVec<DIM>>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut result = Self::new(first, first);
        for p in iter {
            result.include_point(&p);
        }
        Some(result)
    }

    /// Swap coordinates where needed so that `lower <= upper` on every axis.
    pub fn fix(&mut self) {
        for i in 0..DIM {
            if self.lower[i] > self.upper[i] {
                std::mem::swap(&mut self.lower[i], &mut self.upper[i]);
            }
        }
    }

    pub fn fixed(mut self) -> Self {
        self.fix();
        self
    }

    pub fn is_valid(&self) -> bool {
        (0..DIM).all(|i| self.lower[i] <= self.upper[i])
    }

    pub fn size(&self) -> DVec<DIM> {
        self.upper - self.lower
    }

    /// Extent along the vertical axis.
    pub fn height(&self) -> f64 {
        self.upper.vert() - self.lower.vert()
    }

    pub fn center(&self) -> DVec<DIM> {
        (self.lower + self.upper) * 0.5
    }

    pub fn contains(&self, p: &DVec<DIM>) -> bool {
        (0..DIM).all(|i| self.lower[i] <= p[i] && p[i] <= self.upper[i])
    }

    pub fn contains_box(&self, other: &Self) -> bool {
        self.contains(&other.lower) && self.contains(&other.upper)
    }

    pub fn intersects(&self, other: &Self) -> bool {
        (0..DIM).all(|i| self.lower[i] <= other.upper[i] && other.lower[i] <= self.upper[i])
    }

    /// Common part of two boxes, `None` if they are disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        Some(Self {
            lower: self.lower.max(other.lower),
            upper: self.upper.min(other.upper),
        })
    }

    /// Grow this box to contain `p`.
    pub fn include_point(&mut self, p: &DVec<DIM>) {
        self.lower = self.lower.min(*p);
        self.upper = self.upper.max(*p);
    }

    /// Grow this box to contain `other`.
    pub fn include(&mut self, other: &Self) {
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut result = *self;
        result.include(other);
        result
    }

    pub fn translated(&self, t: DVec<DIM>) -> Self {
        Self {
            lower: self.lower + t,
            upper: self.upper + t,
        }
    }

    pub fn translate(&mut self, t: DVec<DIM>) {
        *self = self.translated(t);
    }

    /// Shift along the vertical axis only.
    pub fn translated_up(&self, dv: f64) -> Self {
        self.translated(DVec::up(dv))
    }

    /// Copy enlarged by `margin` on every side.
    pub fn extended(&self, margin: f64) -> Self {
        let m = DVec([margin; DIM]);
        Self {
            lower: self.lower - m,
            upper: self.upper + m,
        }
    }
}

impl<const DIM: usize> fmt::Display for BBox<DIM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.lower, self.upper)
    }
}
