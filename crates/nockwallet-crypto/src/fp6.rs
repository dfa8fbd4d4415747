//! Sextic extension of the TIP5 base field.
//!
//! Elements are polynomials of degree < 6 over the 64-bit prime field,
//! reduced modulo `z^6 - 7`. Curve point coordinates live here; each
//! element serialises to 48 big-endian bytes (high coefficient first).

use twenty_first::math::b_field_element::BFieldElement;

/// The base field prime, `2^64 - 2^32 + 1`.
const BELT_P: u64 = 0xffff_ffff_0000_0001;

/// `z^6 = NON_RESIDUE` in the quotient ring.
const NON_RESIDUE: u64 = 7;

pub const FP6_BYTES: usize = 48;

/// An element of `F_p[z] / (z^6 - 7)`, coefficients in ascending order.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Fp6(pub [BFieldElement; 6]);

impl Fp6 {
    pub fn zero() -> Self {
        Self([BFieldElement::new(0); 6])
    }

    pub fn one() -> Self {
        Self::from_base(BFieldElement::new(1))
    }

    /// The polynomial generator `z`.
    pub fn gen_z() -> Self {
        let mut coeffs = [BFieldElement::new(0); 6];
        coeffs[1] = BFieldElement::new(1);
        Self(coeffs)
    }

    pub fn from_base(b: BFieldElement) -> Self {
        let mut coeffs = [BFieldElement::new(0); 6];
        coeffs[0] = b;
        Self(coeffs)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|c| *c == BFieldElement::new(0))
    }

    pub fn add(&self, rhs: &Fp6) -> Fp6 {
        let mut out = [BFieldElement::new(0); 6];
        for i in 0..6 {
            out[i] = self.0[i] + rhs.0[i];
        }
        Fp6(out)
    }

    pub fn sub(&self, rhs: &Fp6) -> Fp6 {
        let mut out = [BFieldElement::new(0); 6];
        for i in 0..6 {
            out[i] = self.0[i] - rhs.0[i];
        }
        Fp6(out)
    }

    pub fn neg(&self) -> Fp6 {
        Fp6::zero().sub(self)
    }

    /// Schoolbook product followed by the `z^6 = 7` fold.
    pub fn mul(&self, rhs: &Fp6) -> Fp6 {
        let mut wide = [BFieldElement::new(0); 11];
        for i in 0..6 {
            for j in 0..6 {
                wide[i + j] = wide[i + j] + self.0[i] * rhs.0[j];
            }
        }
        let residue = BFieldElement::new(NON_RESIDUE);
        let mut out = [BFieldElement::new(0); 6];
        out.copy_from_slice(&wide[..6]);
        for (k, coeff) in wide.iter().enumerate().skip(6) {
            out[k - 6] = out[k - 6] + residue * *coeff;
        }
        Fp6(out)
    }

    pub fn square(&self) -> Fp6 {
        self.mul(self)
    }

    /// Multiplicative inverse via the extended Euclidean algorithm on the
    /// coefficient polynomials. Returns `None` for zero.
    pub fn inverse(&self) -> Option<Fp6> {
        if self.is_zero() {
            return None;
        }
        // modulus = z^6 - 7
        let mut modulus = vec![BFieldElement::new(0); 7];
        modulus[0] = -BFieldElement::new(NON_RESIDUE);
        modulus[6] = BFieldElement::new(1);

        let mut old_r = modulus;
        let mut r = poly_trim(self.0.to_vec());
        let mut old_t: Vec<BFieldElement> = vec![];
        let mut t = vec![BFieldElement::new(1)];

        while !r.is_empty() {
            let (q, rem) = poly_divmod(&old_r, &r);
            let next_t = poly_sub(&old_t, &poly_mul(&q, &t));
            old_r = std::mem::replace(&mut r, rem);
            old_t = std::mem::replace(&mut t, next_t);
        }

        // old_r is the gcd; in a field extension of a prime field it must be
        // a nonzero constant for any nonzero element.
        if old_r.len() != 1 {
            return None;
        }
        let scale = belt_inverse(old_r[0]);
        let inv = poly_mul(&old_t, &[scale]);
        let mut coeffs = [BFieldElement::new(0); 6];
        for (i, c) in inv.iter().enumerate() {
            if i >= 6 {
                return None;
            }
            coeffs[i] = *c;
        }
        Some(Fp6(coeffs))
    }

    /// 48 big-endian bytes, highest coefficient first.
    pub fn to_be_bytes(&self) -> [u8; FP6_BYTES] {
        let mut out = [0u8; FP6_BYTES];
        for i in 0..6 {
            let v = self.0[5 - i].value();
            out[i * 8..(i + 1) * 8].copy_from_slice(&v.to_be_bytes());
        }
        out
    }

    /// Parse 48 big-endian bytes; every limb must be canonical (< p).
    pub fn from_be_bytes(bytes: &[u8]) -> Option<Fp6> {
        if bytes.len() != FP6_BYTES {
            return None;
        }
        let mut coeffs = [BFieldElement::new(0); 6];
        for i in 0..6 {
            let v = u64::from_be_bytes(bytes[i * 8..(i + 1) * 8].try_into().unwrap());
            if v >= BELT_P {
                return None;
            }
            coeffs[5 - i] = BFieldElement::new(v);
        }
        Some(Fp6(coeffs))
    }
}

impl std::fmt::Debug for Fp6 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fp6(0x{})", hex::encode(self.to_be_bytes()))
    }
}

/// Base-field inverse by Fermat exponentiation: `b^(p-2)` with 128-bit
/// intermediate products.
fn belt_inverse(b: BFieldElement) -> BFieldElement {
    debug_assert!(b != BFieldElement::new(0));
    let p = BELT_P as u128;
    let mut base = b.value() as u128;
    let mut exp = p - 2;
    let mut acc: u128 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc * base % p;
        }
        base = base * base % p;
        exp >>= 1;
    }
    BFieldElement::new(acc as u64)
}

// ── Polynomial helpers (coefficients ascending, trailing zeros trimmed) ──────

fn poly_trim(mut p: Vec<BFieldElement>) -> Vec<BFieldElement> {
    while p.last() == Some(&BFieldElement::new(0)) {
        p.pop();
    }
    p
}

fn poly_sub(a: &[BFieldElement], b: &[BFieldElement]) -> Vec<BFieldElement> {
    let mut out = vec![BFieldElement::new(0); a.len().max(b.len())];
    for (i, c) in a.iter().enumerate() {
        out[i] = out[i] + *c;
    }
    for (i, c) in b.iter().enumerate() {
        out[i] = out[i] - *c;
    }
    poly_trim(out)
}

fn poly_mul(a: &[BFieldElement], b: &[BFieldElement]) -> Vec<BFieldElement> {
    if a.is_empty() || b.is_empty() {
        return vec![];
    }
    let mut out = vec![BFieldElement::new(0); a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] = out[i + j] + *x * *y;
        }
    }
    poly_trim(out)
}

/// Division with remainder; `b` must be nonzero.
fn poly_divmod(a: &[BFieldElement], b: &[BFieldElement]) -> (Vec<BFieldElement>, Vec<BFieldElement>) {
    let b = poly_trim(b.to_vec());
    debug_assert!(!b.is_empty());
    let mut rem = poly_trim(a.to_vec());
    if rem.len() < b.len() {
        return (vec![], rem);
    }
    let mut quot = vec![BFieldElement::new(0); rem.len() - b.len() + 1];
    let lead_inv = belt_inverse(*b.last().unwrap());
    while rem.len() >= b.len() {
        let shift = rem.len() - b.len();
        let coeff = *rem.last().unwrap() * lead_inv;
        quot[shift] = quot[shift] + coeff;
        for (i, c) in b.iter().enumerate() {
            rem[shift + i] = rem[shift + i] - coeff * *c;
        }
        rem = poly_trim(rem);
        if rem.is_empty() {
            break;
        }
    }
    (poly_trim(quot), rem)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seed: u64) -> Fp6 {
        let mut coeffs = [BFieldElement::new(0); 6];
        for (i, c) in coeffs.iter_mut().enumerate() {
            *c = BFieldElement::new(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15).wrapping_add(i as u64));
        }
        Fp6(coeffs)
    }

    #[test]
    fn mul_is_commutative_and_distributes() {
        let (a, b, c) = (sample(1), sample(2), sample(3));
        assert_eq!(a.mul(&b), b.mul(&a));
        assert_eq!(a.mul(&b.add(&c)), a.mul(&b).add(&a.mul(&c)));
    }

    #[test]
    fn z_to_the_sixth_is_seven() {
        let z = Fp6::gen_z();
        let z6 = z.square().square().mul(&z.square());
        assert_eq!(z6, Fp6::from_base(BFieldElement::new(7)));
    }

    #[test]
    fn inverse_round_trips() {
        for seed in 1..8u64 {
            let a = sample(seed);
            let inv = a.inverse().expect("nonzero element");
            assert_eq!(a.mul(&inv), Fp6::one(), "a * a^-1 != 1 for seed {seed}");
        }
        assert!(Fp6::zero().inverse().is_none());
    }

    #[test]
    fn byte_encoding_round_trips() {
        let a = sample(42);
        let bytes = a.to_be_bytes();
        assert_eq!(Fp6::from_be_bytes(&bytes).unwrap(), a);
        // Non-canonical limb is rejected.
        let mut bad = bytes;
        bad[..8].copy_from_slice(&u64::MAX.to_be_bytes());
        assert!(Fp6::from_be_bytes(&bad).is_none());
    }
}
