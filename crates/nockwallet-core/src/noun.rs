//! Noun structural codec.
//!
//! A noun is an atom (arbitrary-size unsigned integer, little-endian bytes)
//! or a cell (ordered pair of nouns). `jam` serialises a noun to the
//! canonical bit-level encoding; `cue` parses it back. Transaction bodies,
//! lock structures and public keys all pass through this codec before being
//! hashed or shipped to the node.

use std::collections::HashMap;

use crate::error::WalletError;
use crate::types::{BlockHeight, Digest, Nicks};

// ── Noun ─────────────────────────────────────────────────────────────────────

/// An atom or a cell. Atom bytes are canonical: little-endian with no
/// trailing zero bytes (so the zero atom is the empty byte string).
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Noun {
    Atom(Vec<u8>),
    Cell(Box<Noun>, Box<Noun>),
}

impl Noun {
    /// Atom from a u64.
    pub fn atom_u64(v: u64) -> Noun {
        Noun::Atom(trim_trailing_zeros(v.to_le_bytes().to_vec()))
    }

    /// Atom from raw little-endian bytes (canonicalised).
    pub fn atom_bytes(bytes: &[u8]) -> Noun {
        Noun::Atom(trim_trailing_zeros(bytes.to_vec()))
    }

    pub fn cell(left: Noun, right: Noun) -> Noun {
        Noun::Cell(Box::new(left), Box::new(right))
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Noun::Atom(_))
    }

    pub fn as_atom(&self) -> Option<&[u8]> {
        match self {
            Noun::Atom(b) => Some(b),
            Noun::Cell(_, _) => None,
        }
    }

    /// Atom value as u64, if it is an atom that fits.
    pub fn atom_as_u64(&self) -> Option<u64> {
        let bytes = self.as_atom()?;
        if bytes.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(u64::from_le_bytes(buf))
    }

    /// Noun word count: one per atom, plus one per cell. Transaction fees
    /// are charged per word of the encoded body.
    pub fn words(&self) -> u64 {
        match self {
            Noun::Atom(_) => 1,
            Noun::Cell(l, r) => 1 + l.words() + r.words(),
        }
    }
}

impl std::fmt::Debug for Noun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Noun::Atom(b) if b.len() <= 8 => write!(f, "{}", self.atom_as_u64().unwrap()),
            Noun::Atom(b) => write!(f, "0x{}", hex::encode(b)),
            Noun::Cell(l, r) => write!(f, "[{l:?} {r:?}]"),
        }
    }
}

fn trim_trailing_zeros(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes
}

/// Bit length of a canonical atom.
fn atom_bit_len(bytes: &[u8]) -> u64 {
    match bytes.last() {
        None => 0,
        Some(last) => (bytes.len() as u64 - 1) * 8 + (8 - last.leading_zeros() as u64),
    }
}

fn atom_bit(bytes: &[u8], i: u64) -> bool {
    (bytes[(i / 8) as usize] >> (i % 8)) & 1 == 1
}

// ── Bit-level I/O ────────────────────────────────────────────────────────────

struct BitWriter {
    bytes: Vec<u8>,
    len: u64,
}

impl BitWriter {
    fn new() -> Self {
        Self { bytes: Vec::new(), len: 0 }
    }

    fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            *self.bytes.last_mut().unwrap() |= 1 << (self.len % 8);
        }
        self.len += 1;
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    pos: u64,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read(&mut self) -> Result<bool, WalletError> {
        if self.pos >= self.bytes.len() as u64 * 8 {
            return Err(WalletError::InvalidEncoding("truncated jam".into()));
        }
        let bit = atom_bit(self.bytes, self.pos);
        self.pos += 1;
        Ok(bit)
    }

    fn remaining(&self) -> u64 {
        self.bytes.len() as u64 * 8 - self.pos
    }
}

// ── jam ──────────────────────────────────────────────────────────────────────

/// Serialise a noun to jam bytes. The encoder never emits backreferences;
/// the decoder accepts them.
pub fn jam(noun: &Noun) -> Vec<u8> {
    let mut w = BitWriter::new();
    jam_into(noun, &mut w);
    w.finish()
}

fn jam_into(noun: &Noun, w: &mut BitWriter) {
    match noun {
        Noun::Atom(bytes) => {
            w.push(false);
            mat(bytes, w);
        }
        Noun::Cell(l, r) => {
            w.push(true);
            w.push(false);
            jam_into(l, w);
            jam_into(r, w);
        }
    }
}

/// Length-run encoding of an atom: a unary size-of-size prefix, the bit
/// length minus its leading one, then the atom bits.
fn mat(bytes: &[u8], w: &mut BitWriter) {
    let b = atom_bit_len(bytes);
    if b == 0 {
        w.push(true);
        return;
    }
    let c = 64 - b.leading_zeros() as u64;
    for _ in 0..c {
        w.push(false);
    }
    w.push(true);
    for i in 0..c - 1 {
        w.push((b >> i) & 1 == 1);
    }
    for i in 0..b {
        w.push(atom_bit(bytes, i));
    }
}

// ── cue ──────────────────────────────────────────────────────────────────────

/// Parse jam bytes back into a noun. Backreferences must point at a noun
/// that has already been decoded.
pub fn cue(data: &[u8]) -> Result<Noun, WalletError> {
    let mut r = BitReader::new(data);
    let mut seen: HashMap<u64, Noun> = HashMap::new();
    cue_at(&mut r, &mut seen)
}

fn cue_at(r: &mut BitReader<'_>, seen: &mut HashMap<u64, Noun>) -> Result<Noun, WalletError> {
    let start = r.pos;
    if !r.read()? {
        let noun = Noun::Atom(rub(r)?);
        seen.insert(start, noun.clone());
        return Ok(noun);
    }
    if !r.read()? {
        let left = cue_at(r, seen)?;
        let right = cue_at(r, seen)?;
        let noun = Noun::cell(left, right);
        seen.insert(start, noun.clone());
        return Ok(noun);
    }
    // Backreference: the payload is the bit offset of an earlier noun.
    let offset_bytes = rub(r)?;
    if offset_bytes.len() > 8 {
        return Err(WalletError::InvalidEncoding("oversized backreference".into()));
    }
    let mut buf = [0u8; 8];
    buf[..offset_bytes.len()].copy_from_slice(&offset_bytes);
    let offset = u64::from_le_bytes(buf);
    seen.get(&offset)
        .cloned()
        .ok_or_else(|| WalletError::InvalidEncoding("dangling backreference".into()))
}

fn rub(r: &mut BitReader<'_>) -> Result<Vec<u8>, WalletError> {
    let mut c = 0u64;
    while !r.read()? {
        c += 1;
        if c > 64 {
            return Err(WalletError::InvalidEncoding("atom length run too long".into()));
        }
    }
    if c == 0 {
        return Ok(Vec::new());
    }
    let mut b: u64 = 1 << (c - 1);
    for i in 0..c - 1 {
        if r.read()? {
            b |= 1 << i;
        }
    }
    if b > r.remaining() {
        return Err(WalletError::InvalidEncoding("truncated atom".into()));
    }
    let mut bytes = vec![0u8; b.div_ceil(8) as usize];
    for i in 0..b {
        if r.read()? {
            bytes[(i / 8) as usize] |= 1 << (i % 8);
        }
    }
    Ok(trim_trailing_zeros(bytes))
}

// ── NounEncode ───────────────────────────────────────────────────────────────

/// Canonical structural encoding of a wallet type. This is the encoding the
/// transaction id and all first-name commitments hash over, so impls must
/// stay stable.
pub trait NounEncode {
    fn to_noun(&self) -> Noun;
}

impl NounEncode for Noun {
    fn to_noun(&self) -> Noun {
        self.clone()
    }
}

impl NounEncode for u64 {
    fn to_noun(&self) -> Noun {
        Noun::atom_u64(*self)
    }
}

impl NounEncode for u32 {
    fn to_noun(&self) -> Noun {
        Noun::atom_u64(*self as u64)
    }
}

impl NounEncode for bool {
    fn to_noun(&self) -> Noun {
        Noun::atom_u64(*self as u64)
    }
}

impl NounEncode for str {
    fn to_noun(&self) -> Noun {
        Noun::atom_bytes(self.as_bytes())
    }
}

impl NounEncode for Digest {
    fn to_noun(&self) -> Noun {
        Noun::atom_bytes(&self.0)
    }
}

impl NounEncode for Nicks {
    fn to_noun(&self) -> Noun {
        Noun::atom_u64(self.0)
    }
}

impl NounEncode for BlockHeight {
    fn to_noun(&self) -> Noun {
        Noun::atom_u64(self.0)
    }
}

/// Unit-style option: absent is the zero atom, present is `[0 payload]`.
impl<T: NounEncode> NounEncode for Option<T> {
    fn to_noun(&self) -> Noun {
        match self {
            None => Noun::atom_u64(0),
            Some(t) => Noun::cell(Noun::atom_u64(0), t.to_noun()),
        }
    }
}

/// Null-terminated list.
impl<T: NounEncode> NounEncode for [T] {
    fn to_noun(&self) -> Noun {
        let mut noun = Noun::atom_u64(0);
        for item in self.iter().rev() {
            noun = Noun::cell(item.to_noun(), noun);
        }
        noun
    }
}

impl<T: NounEncode> NounEncode for Vec<T> {
    fn to_noun(&self) -> Noun {
        self.as_slice().to_noun()
    }
}

impl<T: NounEncode + ?Sized> NounEncode for &T {
    fn to_noun(&self) -> Noun {
        (*self).to_noun()
    }
}

impl<A: NounEncode, B: NounEncode> NounEncode for (A, B) {
    fn to_noun(&self) -> Noun {
        Noun::cell(self.0.to_noun(), self.1.to_noun())
    }
}

impl<A: NounEncode, B: NounEncode, C: NounEncode> NounEncode for (A, B, C) {
    fn to_noun(&self) -> Noun {
        Noun::cell(self.0.to_noun(), (&self.1, &self.2).to_noun())
    }
}

impl<A: NounEncode, B: NounEncode, C: NounEncode, D: NounEncode> NounEncode for (A, B, C, D) {
    fn to_noun(&self) -> Noun {
        Noun::cell(self.0.to_noun(), (&self.1, &self.2, &self.3).to_noun())
    }
}

impl<A: NounEncode, B: NounEncode, C: NounEncode, D: NounEncode, E: NounEncode> NounEncode
    for (A, B, C, D, E)
{
    fn to_noun(&self) -> Noun {
        Noun::cell(self.0.to_noun(), (&self.1, &self.2, &self.3, &self.4).to_noun())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jam_known_atoms() {
        assert_eq!(jam(&Noun::atom_u64(0)), vec![2]);
        assert_eq!(jam(&Noun::atom_u64(1)), vec![12]);
        assert_eq!(jam(&Noun::atom_u64(2)), vec![72]);
    }

    #[test]
    fn cue_inverts_jam() {
        let nouns = vec![
            Noun::atom_u64(0),
            Noun::atom_u64(1),
            Noun::atom_u64(0xdead_beef),
            Noun::atom_bytes(&[0xff; 40]),
            Noun::cell(Noun::atom_u64(0), Noun::atom_u64(0)),
            Noun::cell(
                Noun::cell(Noun::atom_u64(1), Noun::atom_u64(2)),
                Noun::cell(Noun::atom_u64(3), Noun::atom_bytes(b"pkh")),
            ),
            (42u64, Some(Nicks(7)), vec![1u64, 2, 3]).to_noun(),
        ];
        for n in nouns {
            assert_eq!(cue(&jam(&n)).unwrap(), n, "round trip failed for {n:?}");
        }
    }

    #[test]
    fn cue_rejects_garbage() {
        assert!(cue(&[]).is_err());
        // Cell tag followed by nothing.
        assert!(cue(&[0b0000_0001]).is_err());
    }

    #[test]
    fn atom_canonical_form() {
        // Trailing zero bytes never survive construction or decoding.
        let n = Noun::atom_bytes(&[1, 0, 0, 0]);
        assert_eq!(n.as_atom().unwrap(), &[1]);
        assert_eq!(Noun::atom_u64(0).as_atom().unwrap().len(), 0);
    }

    #[test]
    fn word_count() {
        assert_eq!(Noun::atom_u64(9).words(), 1);
        let n = Noun::cell(Noun::atom_u64(1), Noun::cell(Noun::atom_u64(2), Noun::atom_u64(3)));
        assert_eq!(n.words(), 5);
    }

    #[test]
    fn list_encoding_is_null_terminated() {
        let n = vec![1u64, 2].to_noun();
        let expected = Noun::cell(
            Noun::atom_u64(1),
            Noun::cell(Noun::atom_u64(2), Noun::atom_u64(0)),
        );
        assert_eq!(n, expected);
    }
}
