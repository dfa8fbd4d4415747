//! The signing curve: a short-Weierstrass group over the sextic extension.
//!
//! `E: y² = x³ + x + z²` with fixed generator `G = (0, z)`. Points encode
//! as 97 bytes: a tag byte followed by the two 48-byte coordinates.

use num_bigint::BigUint;
use twenty_first::math::b_field_element::BFieldElement;

use crate::fp6::{Fp6, FP6_BYTES};

pub const POINT_BYTES: usize = 97;

const TAG_INFINITY: u8 = 0x00;
const TAG_AFFINE: u8 = 0x04;

/// Curve coefficient `a` = 1.
fn coeff_a() -> Fp6 {
    Fp6::one()
}

/// Curve coefficient `b` = z².
fn coeff_b() -> Fp6 {
    Fp6::gen_z().square()
}

/// An affine curve point, or the identity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Point {
    Infinity,
    Affine { x: Fp6, y: Fp6 },
}

impl Point {
    pub fn generator() -> Point {
        Point::Affine { x: Fp6::zero(), y: Fp6::gen_z() }
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    pub fn is_on_curve(&self) -> bool {
        match self {
            Point::Infinity => true,
            Point::Affine { x, y } => {
                let lhs = y.square();
                let rhs = x.square().mul(x).add(&coeff_a().mul(x)).add(&coeff_b());
                lhs == rhs
            }
        }
    }

    pub fn neg(&self) -> Point {
        match self {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => Point::Affine { x: *x, y: y.neg() },
        }
    }

    pub fn add(&self, other: &Point) -> Point {
        match (self, other) {
            (Point::Infinity, _) => *other,
            (_, Point::Infinity) => *self,
            (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => {
                if x1 == x2 {
                    if y1 == y2 {
                        return self.double();
                    }
                    // y1 = -y2: vertical chord.
                    return Point::Infinity;
                }
                let slope = y2.sub(y1).mul(
                    &x2.sub(x1)
                        .inverse()
                        .expect("x2 - x1 is nonzero on this branch"),
                );
                let x3 = slope.square().sub(x1).sub(x2);
                let y3 = slope.mul(&x1.sub(&x3)).sub(y1);
                Point::Affine { x: x3, y: y3 }
            }
        }
    }

    pub fn double(&self) -> Point {
        match self {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => {
                if y.is_zero() {
                    return Point::Infinity;
                }
                // slope = (3x² + a) / 2y
                let three = Fp6::from_base(BFieldElement::new(3));
                let two = Fp6::from_base(BFieldElement::new(2));
                let numer = three.mul(&x.square()).add(&coeff_a());
                let denom = two.mul(y).inverse().expect("2y is nonzero on this branch");
                let slope = numer.mul(&denom);
                let x3 = slope.square().sub(x).sub(x);
                let y3 = slope.mul(&x.sub(&x3)).sub(y);
                Point::Affine { x: x3, y: y3 }
            }
        }
    }

    /// Double-and-add scalar multiplication by an arbitrary-width
    /// non-negative integer, most significant bit first.
    pub fn scalar_mul(&self, k: &BigUint) -> Point {
        let mut acc = Point::Infinity;
        for byte in k.to_bytes_be() {
            for shift in (0..8).rev() {
                acc = acc.double();
                if (byte >> shift) & 1 == 1 {
                    acc = acc.add(self);
                }
            }
        }
        acc
    }

    pub fn encode(&self) -> [u8; POINT_BYTES] {
        let mut out = [0u8; POINT_BYTES];
        match self {
            Point::Infinity => out[0] = TAG_INFINITY,
            Point::Affine { x, y } => {
                out[0] = TAG_AFFINE;
                out[1..1 + FP6_BYTES].copy_from_slice(&x.to_be_bytes());
                out[1 + FP6_BYTES..].copy_from_slice(&y.to_be_bytes());
            }
        }
        out
    }

    /// Decode and validate a point encoding. Off-curve points, non-canonical
    /// coordinates and bad tags are all rejected.
    pub fn decode(bytes: &[u8]) -> Option<Point> {
        if bytes.len() != POINT_BYTES {
            return None;
        }
        match bytes[0] {
            TAG_INFINITY => {
                if bytes[1..].iter().all(|b| *b == 0) {
                    Some(Point::Infinity)
                } else {
                    None
                }
            }
            TAG_AFFINE => {
                let x = Fp6::from_be_bytes(&bytes[1..1 + FP6_BYTES])?;
                let y = Fp6::from_be_bytes(&bytes[1 + FP6_BYTES..])?;
                let p = Point::Affine { x, y };
                p.is_on_curve().then_some(p)
            }
            _ => None,
        }
    }
}
