//! Lock primitives and spend conditions.
//!
//! A spend condition is a conjunction of lock primitives; its tree hash is
//! the lock root, and the first-name commitment written into a note's name
//! is derived from that root. Three primitives exist: `pkh` (m-of-n
//! signature set), `tim` (relative/absolute height ranges), and `brn`
//! (permanently unspendable).

use serde::{Deserialize, Serialize};

use crate::constants::COINBASE_MATURITY_BLOCKS;
use crate::hash::{first_name, tree_hash, NounHash};
use crate::noun::{Noun, NounEncode};
use crate::types::{BlockHeight, Digest};

// ── Pkh ──────────────────────────────────────────────────────────────────────

/// m-of-n public-key-hash lock: satisfied by `m` valid signatures whose
/// public keys hash to members of `hashes`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pkh {
    pub m: u64,
    pub hashes: Vec<Digest>,
}

impl Pkh {
    pub fn new(m: u64, hashes: Vec<Digest>) -> Self {
        Self { m, hashes }
    }

    /// 1-of-1 lock over a single key hash.
    pub fn single(hash: Digest) -> Self {
        Self { m: 1, hashes: vec![hash] }
    }
}

impl NounEncode for Pkh {
    fn to_noun(&self) -> Noun {
        (self.m, &self.hashes).to_noun()
    }
}

// ── Timelock ─────────────────────────────────────────────────────────────────

/// Inclusive height range; `None` bounds are open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockRange {
    pub min: Option<BlockHeight>,
    pub max: Option<BlockHeight>,
}

impl TimelockRange {
    pub fn new(min: Option<BlockHeight>, max: Option<BlockHeight>) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self { min: None, max: None }
    }
}

impl NounEncode for TimelockRange {
    fn to_noun(&self) -> Noun {
        (self.min, self.max).to_noun()
    }
}

/// Height constraint on spending: `relative` is measured from the note's
/// origin page, `absolute` against chain height directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timelock {
    pub absolute: TimelockRange,
    pub relative: TimelockRange,
}

impl Timelock {
    pub fn new(absolute: TimelockRange, relative: TimelockRange) -> Self {
        Self { absolute, relative }
    }

    pub fn unbounded() -> Self {
        Self { absolute: TimelockRange::unbounded(), relative: TimelockRange::unbounded() }
    }

    /// The canonical mining-reward form: a 100-block relative minimum.
    pub fn coinbase() -> Self {
        Self {
            absolute: TimelockRange::unbounded(),
            relative: TimelockRange::new(Some(BlockHeight(COINBASE_MATURITY_BLOCKS)), None),
        }
    }

    /// Whether spending is allowed at `height` for a note minted at
    /// `origin_page`.
    pub fn satisfied_at(&self, origin_page: BlockHeight, height: BlockHeight) -> bool {
        let abs_ok = self.absolute.min.is_none_or(|min| height >= min)
            && self.absolute.max.is_none_or(|max| height <= max);
        let rel_ok = self
            .relative
            .min
            .is_none_or(|min| height.0 >= origin_page.0.saturating_add(min.0))
            && self
                .relative
                .max
                .is_none_or(|max| height.0 <= origin_page.0.saturating_add(max.0));
        abs_ok && rel_ok
    }
}

impl NounEncode for Timelock {
    fn to_noun(&self) -> Noun {
        (self.absolute, self.relative).to_noun()
    }
}

// ── LockPrimitive / SpendCondition ───────────────────────────────────────────

/// One conjunct of a spend condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockPrimitive {
    Pkh(Pkh),
    Tim(Timelock),
    Brn,
}

impl NounEncode for LockPrimitive {
    fn to_noun(&self) -> Noun {
        match self {
            LockPrimitive::Pkh(pkh) => ("pkh", pkh).to_noun(),
            LockPrimitive::Tim(tim) => ("tim", tim).to_noun(),
            LockPrimitive::Brn => ("brn", 0u64).to_noun(),
        }
    }
}

/// A conjunction of lock primitives; all must be satisfied to spend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendCondition(pub Vec<LockPrimitive>);

impl SpendCondition {
    pub fn new(primitives: Vec<LockPrimitive>) -> Self {
        Self(primitives)
    }

    /// The standard single-signature condition over one key hash.
    pub fn single_pkh(pkh: Digest) -> Self {
        Self(vec![LockPrimitive::Pkh(Pkh::single(pkh))])
    }

    /// Single signature plus the canonical coinbase maturity lock.
    pub fn coinbase(pkh: Digest) -> Self {
        Self(vec![
            LockPrimitive::Pkh(Pkh::single(pkh)),
            LockPrimitive::Tim(Timelock::coinbase()),
        ])
    }

    /// The lock root: tree hash of the condition structure.
    pub fn hash(&self) -> Digest {
        tree_hash(&self.0)
    }

    /// The first-name commitment a note under this condition carries.
    pub fn first_name(&self) -> Digest {
        first_name(self.hash())
    }

    pub fn pkhs(&self) -> impl Iterator<Item = &Pkh> + '_ {
        self.0.iter().filter_map(|p| match p {
            LockPrimitive::Pkh(pkh) => Some(pkh),
            _ => None,
        })
    }

    pub fn tims(&self) -> impl Iterator<Item = &Timelock> + '_ {
        self.0.iter().filter_map(|p| match p {
            LockPrimitive::Tim(tim) => Some(tim),
            _ => None,
        })
    }

    pub fn is_burn(&self) -> bool {
        self.0.iter().any(|p| matches!(p, LockPrimitive::Brn))
    }

    /// Timelock feasibility. `height == None` skips the check entirely; a
    /// burn condition is never spendable.
    pub fn spendable_at(&self, origin_page: BlockHeight, height: Option<BlockHeight>) -> bool {
        if self.is_burn() {
            return false;
        }
        let Some(height) = height else {
            return true;
        };
        self.tims().all(|tim| tim.satisfied_at(origin_page, height))
    }
}

impl NounEncode for SpendCondition {
    fn to_noun(&self) -> Noun {
        self.0.to_noun()
    }
}

impl NounHash for SpendCondition {
    fn noun_hash(&self) -> Digest {
        self.hash()
    }
}
