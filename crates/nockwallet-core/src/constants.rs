//! ─── Nockchain wallet protocol constants ────────────────────────────────────
//!
//! Display currency: NOCK. Base unit: nick (1 NOCK = 65,536 nicks).
//! All engine-boundary amounts and fees are denominated in nicks.

// ── Currency ─────────────────────────────────────────────────────────────────

/// 1 NOCK expressed in nicks. Exact; display code divides by this.
pub const NICKS_PER_NOCK: u64 = 65_536;

/// Fee charged per noun word of transaction body (0.5 NOCK).
pub const FEE_PER_WORD: u64 = 32_768;

/// Floor applied to any computed transaction fee.
pub const MIN_FEE_NICKS: u64 = 256;

// ── Digests / keys ───────────────────────────────────────────────────────────

/// A digest is five 64-bit field elements.
pub const DIGEST_BYTES: usize = 40;

/// Encoded public key: tag byte plus two 48-byte extension-field coordinates.
pub const PUBLIC_KEY_BYTES: usize = 97;

/// Raw private scalar bytes.
pub const PRIVATE_KEY_BYTES: usize = 32;

/// BIP-39 seed length after PBKDF2.
pub const SEED_BYTES: usize = 64;

/// Mnemonics are always 24 words (256 bits of entropy).
pub const MNEMONIC_WORD_COUNT: usize = 24;

// ── Chain rules ──────────────────────────────────────────────────────────────

/// Mining rewards carry a relative timelock of this many blocks.
pub const COINBASE_MATURITY_BLOCKS: u64 = 100;

// ── Engine timing ────────────────────────────────────────────────────────────

/// Approval requests older than this are replay-rejected.
pub const REQUEST_EXPIRATION_MS: i64 = 5 * 60 * 1000;

/// Pending wallet transactions older than this are expired by the sync loop.
pub const TX_EXPIRY_MS: i64 = 30 * 60 * 1000;

/// Node health checks run on this cadence.
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 10;

/// Input-selection retries when a racing send steals a note mid-pipeline.
pub const SEND_LOCK_RETRIES: u32 = 3;
