//! Transaction construction and validation.
//!
//! A transaction spends an ordered list of notes (each with its recovered
//! spend condition) into seeds: a recipient output and, when the inputs
//! carry surplus beyond amount + fee, a change output back to the refund
//! key. The transaction id is the TIP5 hash of the jammed unsigned body;
//! every input signs that id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use nockwallet_core::hash::{first_name, hash_noun, hash_pair, tree_hash};
use nockwallet_core::lock::SpendCondition;
use nockwallet_core::note::{Name, Note, NoteVersion};
use nockwallet_core::noun::{jam, Noun, NounEncode};
use nockwallet_core::types::{BlockHeight, Digest, Nicks};
use nockwallet_core::WalletError;

use nockwallet_crypto::schnorr::{PrivateKey, PublicKey, Signature};

use crate::fee::fee_for_words;

// ── Seed ─────────────────────────────────────────────────────────────────────

/// A transaction output specification: who may spend the gifted value, and
/// under which note the value originated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    pub lock_root: Digest,
    /// Full lock structure, embedded only when the builder is asked to
    /// include lock data (larger body, higher fee).
    pub lock_data: Option<SpendCondition>,
    pub gift: Nicks,
    pub parent_hash: Digest,
}

impl Seed {
    fn new(lock_root: Digest, lock_data: Option<SpendCondition>, gift: Nicks, parent_hash: Digest) -> Self {
        Self { lock_root, lock_data, gift, parent_hash }
    }

    /// Hash of the note-data the minted output will carry.
    pub fn note_data_hash(&self) -> Digest {
        match &self.lock_data {
            Some(sc) => tree_hash(&("lock", sc)),
            None => tree_hash(&0u64),
        }
    }
}

impl NounEncode for Seed {
    fn to_noun(&self) -> Noun {
        (self.lock_root, &self.lock_data, self.gift, self.parent_hash).to_noun()
    }
}

// ── TxInput / transactions ───────────────────────────────────────────────────

/// A signed input: the spent note, its recovered spend condition, and the
/// signature over the transaction id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxInput {
    pub note: Note,
    pub spend_condition: SpendCondition,
    pub public_key: Vec<u8>,
    pub signature: Signature,
}

impl NounEncode for TxInput {
    fn to_noun(&self) -> Noun {
        (
            &self.note,
            &self.spend_condition,
            Noun::atom_bytes(&self.public_key),
            (
                Noun::atom_bytes(&self.signature.r),
                Noun::atom_bytes(&self.signature.s),
            ),
        )
            .to_noun()
    }
}

/// A fully built, not yet signed transaction.
#[derive(Clone, Debug)]
pub struct UnsignedTx {
    pub id: Digest,
    pub inputs: Vec<(Note, SpendCondition)>,
    pub seeds: Vec<Seed>,
    pub fee: Nicks,
    /// Word count of the unsigned body; the fee was sized from this.
    pub body_words: u64,
}

/// A signed transaction, ready for broadcast.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawTx {
    pub id: Digest,
    pub inputs: Vec<TxInput>,
    pub seeds: Vec<Seed>,
    pub fee: Nicks,
}

fn body_noun(inputs: &[(Note, SpendCondition)], seeds: &[Seed], fee: Nicks) -> Noun {
    let notes: Vec<&Note> = inputs.iter().map(|(note, _)| note).collect();
    (notes, seeds, fee).to_noun()
}

// ── TxBuilder ────────────────────────────────────────────────────────────────

/// Assembles a transaction from recovered inputs.
pub struct TxBuilder {
    inputs: Vec<(Note, SpendCondition)>,
    recipient: Digest,
    amount: Nicks,
    fee_override: Option<Nicks>,
    refund_pkh: Digest,
    include_lock_data: bool,
}

impl TxBuilder {
    pub fn new(recipient: Digest, amount: Nicks, refund_pkh: Digest) -> Self {
        Self {
            inputs: Vec::new(),
            recipient,
            amount,
            fee_override: None,
            refund_pkh,
            include_lock_data: false,
        }
    }

    /// Add an input. The spend condition must be the one the note's
    /// first-name commits to; `build` re-checks.
    pub fn input(mut self, note: Note, spend_condition: SpendCondition) -> Self {
        self.inputs.push((note, spend_condition));
        self
    }

    pub fn inputs(mut self, pairs: impl IntoIterator<Item = (Note, SpendCondition)>) -> Self {
        self.inputs.extend(pairs);
        self
    }

    pub fn fee_override(mut self, fee: Nicks) -> Self {
        self.fee_override = Some(fee);
        self
    }

    pub fn include_lock_data(mut self, include: bool) -> Self {
        self.include_lock_data = include;
        self
    }

    pub fn build(self) -> Result<UnsignedTx, WalletError> {
        if self.amount == Nicks::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        if self.inputs.is_empty() {
            return Err(WalletError::InvalidParams("transaction has no inputs".into()));
        }
        for (note, sc) in &self.inputs {
            if sc.first_name() != note.name.first {
                return Err(WalletError::SpendConditionMismatch(note.id()));
            }
        }

        let input_total: Nicks = self.inputs.iter().map(|(note, _)| note.assets).sum();
        let parent_hash = self.inputs[0].0.id();

        let recipient_seed = self.seed_for(self.recipient, self.amount, parent_hash);
        let fee = self.projected_fee()?;

        let need = self.amount + fee;
        if input_total < need {
            return Err(WalletError::InsufficientFunds { have: input_total, need });
        }

        let change = input_total - self.amount - fee;
        let mut seeds = vec![recipient_seed];
        if change > Nicks::ZERO {
            seeds.push(self.seed_for(self.refund_pkh, change, parent_hash));
        }

        let body = body_noun(&self.inputs, &seeds, fee);
        let id = hash_noun(&jam(&body))?;

        Ok(UnsignedTx {
            id,
            inputs: self.inputs,
            seeds,
            fee,
            body_words: body.words(),
        })
    }

    /// The fee this builder will charge: the override if one was given,
    /// otherwise sized from the unsigned trial body. The trial carries a
    /// change seed; word count is structural, so the placeholder gift value
    /// does not affect it. No sufficiency check happens here, which makes
    /// this usable from estimation flows.
    pub fn projected_fee(&self) -> Result<Nicks, WalletError> {
        if let Some(fee) = self.fee_override {
            return Ok(fee);
        }
        if self.inputs.is_empty() {
            return Err(WalletError::InvalidParams("transaction has no inputs".into()));
        }
        let input_total: Nicks = self.inputs.iter().map(|(note, _)| note.assets).sum();
        let parent_hash = self.inputs[0].0.id();
        let trial = vec![
            self.seed_for(self.recipient, self.amount, parent_hash),
            self.seed_for(
                self.refund_pkh,
                input_total.saturating_sub(self.amount),
                parent_hash,
            ),
        ];
        Ok(fee_for_words(body_noun(&self.inputs, &trial, Nicks::ZERO).words()))
    }

    fn seed_for(&self, pkh: Digest, gift: Nicks, parent_hash: Digest) -> Seed {
        let condition = SpendCondition::single_pkh(pkh);
        let lock_root = condition.hash();
        let lock_data = self.include_lock_data.then_some(condition);
        Seed::new(lock_root, lock_data, gift, parent_hash)
    }
}

impl UnsignedTx {
    /// Sign every input with `key`. The key must satisfy each input's PKH
    /// lock; signatures are deterministic, so re-signing is byte-identical.
    pub fn sign(&self, key: &PrivateKey) -> Result<RawTx, WalletError> {
        let public = key.public_key();
        let pkh = public.pkh();
        for (note, sc) in &self.inputs {
            let satisfies = sc.pkhs().any(|p| p.hashes.contains(&pkh));
            if !satisfies {
                return Err(WalletError::SigningFailed(format!(
                    "key {pkh:?} does not satisfy the lock on note {:?}",
                    note.id()
                )));
            }
        }
        let signature = key.sign(self.id.as_bytes())?;
        let inputs = self
            .inputs
            .iter()
            .map(|(note, sc)| TxInput {
                note: note.clone(),
                spend_condition: sc.clone(),
                public_key: public.to_bytes().to_vec(),
                signature: signature.clone(),
            })
            .collect();
        Ok(RawTx { id: self.id, inputs, seeds: self.seeds.clone(), fee: self.fee })
    }
}

impl RawTx {
    /// Full signed encoding, as shipped to the node.
    pub fn to_jam(&self) -> Vec<u8> {
        let noun = (self.id, &self.inputs, &self.seeds, self.fee).to_noun();
        jam(&noun)
    }

    /// Re-check everything a relaying node would: the id, sum conservation,
    /// first-name commitments, signatures, and timelock feasibility at
    /// `height` (`None` skips the timelock check).
    pub fn validate(&self, height: Option<BlockHeight>) -> Result<(), WalletError> {
        let unsigned: Vec<(Note, SpendCondition)> = self
            .inputs
            .iter()
            .map(|i| (i.note.clone(), i.spend_condition.clone()))
            .collect();
        let expected_id = hash_noun(&jam(&body_noun(&unsigned, &self.seeds, self.fee)))?;
        if expected_id != self.id {
            return Err(WalletError::InvalidParams("transaction id mismatch".into()));
        }

        let input_total: Nicks = self.inputs.iter().map(|i| i.note.assets).sum();
        let output_total: Nicks = self.seeds.iter().map(|s| s.gift).sum();
        if input_total != output_total + self.fee {
            return Err(WalletError::InvalidParams(format!(
                "sum conservation violated: inputs {input_total}, outputs {output_total} + fee {}",
                self.fee
            )));
        }

        for input in &self.inputs {
            if input.spend_condition.first_name() != input.note.name.first {
                return Err(WalletError::SpendConditionMismatch(input.note.id()));
            }

            let public = PublicKey::from_bytes(&input.public_key)?;
            if !public.verify(self.id.as_bytes(), &input.signature) {
                return Err(WalletError::SigningFailed(format!(
                    "bad signature on note {:?}",
                    input.note.id()
                )));
            }
            let pkh = public.pkh();
            let key_in_lock = input.spend_condition.pkhs().any(|p| p.hashes.contains(&pkh));
            if !key_in_lock {
                return Err(WalletError::SigningFailed(format!(
                    "signing key not named by the lock on note {:?}",
                    input.note.id()
                )));
            }

            let origin = BlockHeight(input.note.origin_page as u64);
            if !input.spend_condition.spendable_at(origin, height) {
                return Err(WalletError::InvalidParams(format!(
                    "timelock on note {:?} not satisfied",
                    input.note.id()
                )));
            }
        }

        Ok(())
    }

    /// The notes this transaction mints: one output per distinct lock root,
    /// gifts combined, named by the lock's first-name and a source
    /// commitment over the contributing seeds.
    pub fn output_notes(&self) -> Vec<Note> {
        let mut by_root: BTreeMap<Digest, Vec<&Seed>> = BTreeMap::new();
        for seed in &self.seeds {
            by_root.entry(seed.lock_root).or_default().push(seed);
        }
        by_root
            .into_iter()
            .map(|(lock_root, seeds)| {
                let total: Nicks = seeds.iter().map(|s| s.gift).sum();
                let first = first_name(lock_root);
                let source = tree_hash(&seeds.iter().map(|s| s.to_noun()).collect::<Vec<_>>());
                let last = hash_pair(first, source);
                let note_data_hash =
                    seeds.last().expect("group is nonempty").note_data_hash();
                Note {
                    version: NoteVersion::V1,
                    origin_page: 0,
                    name: Name::new(first, last),
                    note_data_hash,
                    assets: total,
                }
            })
            .collect()
    }
}
