//! Horizontal placement of children in stacks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::primitives::{BBox, DVec, LON};

/// How a child spanning `[low, high]` on one axis is moved along that axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignStrategy {
    /// Move the child's origin to the given coordinate.
    Fixed(f64),
    /// Put the low edge at zero.
    #[default]
    LowToZero,
    /// Put the high edge at zero.
    HighToZero,
    /// Put the center at zero.
    CenterToZero,
}

impl AlignStrategy {
    /// Translation for a child spanning `[low, high]`.
    pub fn translation(&self, low: f64, high: f64) -> f64 {
        match *self {
            AlignStrategy::Fixed(x) => x,
            AlignStrategy::LowToZero => -low,
            AlignStrategy::HighToZero => -high,
            AlignStrategy::CenterToZero => -0.5 * (low + high),
        }
    }
}

impl FromStr for AlignStrategy {
    type Err = GeometryError;

    /// Accepts edge names (`left`, `right`, `back`, `front`, `center` or
    /// their first letters) and plain numbers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "l" | "left" | "b" | "back" => Ok(AlignStrategy::LowToZero),
            "r" | "right" | "f" | "front" => Ok(AlignStrategy::HighToZero),
            "c" | "center" => Ok(AlignStrategy::CenterToZero),
            other => other
                .parse::<f64>()
                .map(AlignStrategy::Fixed)
                .map_err(|_| GeometryError::bad_input("aligner", format!("unknown alignment \"{other}\""))),
        }
    }
}

impl fmt::Display for AlignStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignStrategy::Fixed(x) => write!(f, "{x}"),
            AlignStrategy::LowToZero => write!(f, "low"),
            AlignStrategy::HighToZero => write!(f, "high"),
            AlignStrategy::CenterToZero => write!(f, "center"),
        }
    }
}

/// Placement of a stack child in the plane perpendicular to the stacking axis.
///
/// `tran` acts on the transverse axis. `lon` is only used in 3D; when it is
/// not given the child keeps its own longitudinal position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aligner {
    pub tran: AlignStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<AlignStrategy>,
}

impl Aligner {
    pub fn new(tran: AlignStrategy) -> Self {
        Self { tran, lon: None }
    }

    pub fn left() -> Self {
        Self::new(AlignStrategy::LowToZero)
    }

    pub fn right() -> Self {
        Self::new(AlignStrategy::HighToZero)
    }

    pub fn center() -> Self {
        Self::new(AlignStrategy::CenterToZero)
    }

    pub fn fixed(tran: f64) -> Self {
        Self::new(AlignStrategy::Fixed(tran))
    }

    /// Aligner for 3D stacks combining a longitudinal and a transverse strategy.
    pub fn compose(lon: AlignStrategy, tran: AlignStrategy) -> Self {
        Self {
            tran,
            lon: Some(lon),
        }
    }

    /// Translation of a child with bounding box `bb`. The vertical component is zero.
    pub fn translation<const DIM: usize>(&self, bb: &BBox<DIM>) -> DVec<DIM> {
        let mut t = DVec::ZERO;
        let tran = DVec::<DIM>::TRAN;
        t[tran] = self.tran.translation(bb.lower[tran], bb.upper[tran]);
        if DIM == 3 {
            if let Some(lon) = self.lon {
                t[LON] = lon.translation(bb.lower[LON], bb.upper[LON]);
            }
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{vec2, vec3, Box2, Box3};

    #[test]
    fn test_strategy_translation() {
        assert!((AlignStrategy::LowToZero.translation(2.0, 5.0) + 2.0).abs() < 1e-10);
        assert!((AlignStrategy::HighToZero.translation(2.0, 5.0) + 5.0).abs() < 1e-10);
        assert!((AlignStrategy::CenterToZero.translation(2.0, 5.0) + 3.5).abs() < 1e-10);
        assert!((AlignStrategy::Fixed(1.5).translation(2.0, 5.0) - 1.5).abs() < 1e-10);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("left".parse::<AlignStrategy>().unwrap(), AlignStrategy::LowToZero);
        assert_eq!("f".parse::<AlignStrategy>().unwrap(), AlignStrategy::HighToZero);
        assert_eq!("center".parse::<AlignStrategy>().unwrap(), AlignStrategy::CenterToZero);
        assert_eq!("-2.5".parse::<AlignStrategy>().unwrap(), AlignStrategy::Fixed(-2.5));
        assert!("middle".parse::<AlignStrategy>().is_err());
    }

    #[test]
    fn test_aligner_2d_and_3d() {
        let bb2 = Box2::new(vec2(1.0, 4.0), vec2(3.0, 6.0));
        assert_eq!(Aligner::center().translation(&bb2), vec2(-2.0, 0.0));

        let bb3 = Box3::new(vec3(1.0, 2.0, 0.0), vec3(3.0, 4.0, 1.0));
        let a = Aligner::compose(AlignStrategy::HighToZero, AlignStrategy::LowToZero);
        assert_eq!(a.translation(&bb3), vec3(-3.0, -2.0, 0.0));
        assert_eq!(Aligner::right().translation(&bb3), vec3(0.0, -4.0, 0.0));
    }
}
