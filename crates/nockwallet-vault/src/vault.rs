//! The vault state machine and at-rest encryption.
//!
//! A vault is Absent (no encrypted blob), Locked (blob on disk, nothing in
//! memory) or Unlocked (mnemonic and master key in memory). The mnemonic is
//! encrypted with ChaCha20-Poly1305 under an Argon2id-stretched password
//! key; KDF parameters and salt are persisted next to the ciphertext so
//! they can be tuned without invalidating existing vaults.

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::{Zeroize, Zeroizing};

use nockwallet_core::WalletError;
use nockwallet_crypto::keys::ExtendedKey;
use nockwallet_crypto::mnemonic::{generate_mnemonic, mnemonic_to_seed, parse_mnemonic};
use nockwallet_storage::{keys as storage_keys, WalletStorage};

use crate::accounts::Account;

// Argon2id cost parameters for fresh vaults (existing vaults use whatever
// their persisted records carry).
const ARGON2_M_COST_KIB: u32 = 16 * 1024;
const ARGON2_T_COST: u32 = 32;
const ARGON2_P_COST: u32 = 1;

const VAULT_KEY_LEN: usize = 32;
const VAULT_NONCE_LEN: usize = 12;
const VAULT_SALT_LEN: usize = 16;

const CIPHER_ID: &str = "chacha20poly1305";

// ── Persisted records ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedVault {
    pub iv: [u8; VAULT_NONCE_LEN],
    pub ct: Vec<u8>,
    pub salt: [u8; VAULT_SALT_LEN],
    pub kdf: KdfParams,
    pub cipher: String,
}

// ── State ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultStatus {
    Absent,
    Locked,
    Unlocked,
}

struct UnlockedState {
    mnemonic: Zeroizing<String>,
    master: ExtendedKey,
}

/// The vault. Process-wide singleton by convention: construct one and pass
/// the handle to every caller; nothing in here is global.
pub struct Vault {
    storage: Arc<WalletStorage>,
    unlocked: Option<UnlockedState>,
    accounts: Vec<Account>,
    current_account_index: u32,
    auto_lock_minutes: u32,
    /// Set by an explicit lock(); suppresses implicit re-unlock pathways
    /// until the next successful unlock.
    manually_locked: bool,
    /// Unix milliseconds of the last user-initiated operation.
    last_activity_ms: i64,
}

impl Vault {
    /// Load vault state from storage. Never decrypts anything.
    pub fn load(storage: Arc<WalletStorage>) -> Result<Self, WalletError> {
        let accounts: Vec<Account> = storage.get(storage_keys::ACCOUNTS)?.unwrap_or_default();
        let current_account_index: u32 = storage
            .get(storage_keys::CURRENT_ACCOUNT_INDEX)?
            .unwrap_or(0);
        let auto_lock_minutes: u32 =
            storage.get(storage_keys::AUTO_LOCK_MINUTES)?.unwrap_or(0);
        Ok(Self {
            storage,
            unlocked: None,
            accounts,
            current_account_index,
            auto_lock_minutes,
            manually_locked: false,
            last_activity_ms: 0,
        })
    }

    pub fn status(&self) -> VaultStatus {
        if self.unlocked.is_some() {
            return VaultStatus::Unlocked;
        }
        match self.storage.contains(storage_keys::ENCRYPTED_VAULT) {
            Ok(true) => VaultStatus::Locked,
            _ => VaultStatus::Absent,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.unlocked.is_none()
    }

    pub fn is_manually_locked(&self) -> bool {
        self.manually_locked
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Create the vault: encrypt the mnemonic (generating one if absent),
    /// derive account 0, persist, and transition straight to Unlocked.
    pub fn setup(
        &mut self,
        password: &str,
        mnemonic: Option<&str>,
        now_ms: i64,
    ) -> Result<Account, WalletError> {
        if self.status() != VaultStatus::Absent {
            return Err(WalletError::VaultExists);
        }

        let phrase: Zeroizing<String> = match mnemonic {
            Some(given) => Zeroizing::new(parse_mnemonic(given)?.to_string()),
            None => Zeroizing::new(generate_mnemonic()?.to_string()),
        };

        let blob = encrypt_mnemonic(password, &phrase)?;
        self.storage.put(storage_keys::ENCRYPTED_VAULT, &blob)?;

        let master = master_from_phrase(&phrase)?;
        let first = master.derive_child(0)?;
        let account = Account::new(0, Account::default_name(0), first.pkh());

        self.accounts = vec![account.clone()];
        self.current_account_index = 0;
        self.persist_accounts()?;
        self.storage.flush()?;

        self.unlocked = Some(UnlockedState { mnemonic: phrase, master });
        self.manually_locked = false;
        self.last_activity_ms = now_ms;
        info!(pkh = %account.pkh, "vault created");
        Ok(account)
    }

    /// Unlock with the password; verification is the AEAD tag.
    pub fn unlock(&mut self, password: &str, now_ms: i64) -> Result<(), WalletError> {
        let blob: EncryptedVault = self
            .storage
            .get(storage_keys::ENCRYPTED_VAULT)?
            .ok_or(WalletError::NoVault)?;
        let phrase = decrypt_mnemonic(password, &blob)?;
        let master = master_from_phrase(&phrase)?;
        self.unlocked = Some(UnlockedState { mnemonic: phrase, master });
        self.manually_locked = false;
        self.last_activity_ms = now_ms;
        Ok(())
    }

    /// Explicit lock: wipes in-memory secrets and sets the sticky flag.
    /// Idempotent.
    pub fn lock(&mut self) {
        self.unlocked = None;
        self.manually_locked = true;
    }

    /// Lock driven by the idle timer. Does not set the sticky flag.
    pub fn auto_lock(&mut self) {
        self.unlocked = None;
    }

    /// Destroy all persisted state, UTXO books and cached balances
    /// included, returning the vault to Absent.
    pub fn reset(&mut self) -> Result<(), WalletError> {
        self.unlocked = None;
        self.accounts.clear();
        self.current_account_index = 0;
        self.auto_lock_minutes = 0;
        self.manually_locked = false;
        self.storage.clear()?;
        info!("vault reset");
        Ok(())
    }

    /// Reveal the mnemonic. Requires Unlocked and re-verifies the password
    /// against the stored blob: a stale unlocked session alone is not
    /// enough.
    pub fn get_mnemonic(&self, password: &str) -> Result<String, WalletError> {
        let state = self.unlocked.as_ref().ok_or(WalletError::Locked)?;
        let blob: EncryptedVault = self
            .storage
            .get(storage_keys::ENCRYPTED_VAULT)?
            .ok_or(WalletError::NoVault)?;
        decrypt_mnemonic(password, &blob)?;
        Ok(state.mnemonic.to_string())
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn visible_accounts(&self) -> Vec<Account> {
        self.accounts.iter().filter(|a| !a.hidden).cloned().collect()
    }

    pub fn current_account_index(&self) -> u32 {
        self.current_account_index
    }

    pub fn current_account(&self) -> Result<&Account, WalletError> {
        self.accounts
            .iter()
            .find(|a| a.index == self.current_account_index)
            .ok_or(WalletError::InvalidAccountIndex(self.current_account_index))
    }

    pub fn create_account(&mut self, name: Option<String>) -> Result<Account, WalletError> {
        let state = self.unlocked.as_ref().ok_or(WalletError::Locked)?;
        let index = self.accounts.iter().map(|a| a.index + 1).max().unwrap_or(0);
        let child = state.master.derive_child(index)?;
        let account = Account::new(
            index,
            name.unwrap_or_else(|| Account::default_name(index)),
            child.pkh(),
        );
        self.accounts.push(account.clone());
        self.persist_accounts()?;
        Ok(account)
    }

    pub fn switch_account(&mut self, index: u32) -> Result<(), WalletError> {
        self.require_unlocked()?;
        let target = self
            .accounts
            .iter()
            .find(|a| a.index == index && !a.hidden)
            .ok_or(WalletError::InvalidAccountIndex(index))?;
        self.current_account_index = target.index;
        self.storage
            .put(storage_keys::CURRENT_ACCOUNT_INDEX, &self.current_account_index)?;
        Ok(())
    }

    pub fn rename_account(&mut self, index: u32, name: String) -> Result<(), WalletError> {
        self.require_unlocked()?;
        self.with_account(index, |a| a.name = name)
    }

    pub fn hide_account(&mut self, index: u32) -> Result<(), WalletError> {
        self.require_unlocked()?;
        self.with_account(index, |a| a.hidden = true)
    }

    pub fn update_account_styling(
        &mut self,
        index: u32,
        display: String,
    ) -> Result<(), WalletError> {
        self.require_unlocked()?;
        self.with_account(index, |a| a.display = Some(display))
    }

    /// Signing key for an account by derivation index. Requires Unlocked.
    pub fn account_key(&self, index: u32) -> Result<ExtendedKey, WalletError> {
        let state = self.unlocked.as_ref().ok_or(WalletError::Locked)?;
        if !self.accounts.iter().any(|a| a.index == index) {
            return Err(WalletError::InvalidAccountIndex(index));
        }
        state.master.derive_child(index)
    }

    // ── Auto-lock policy ─────────────────────────────────────────────────────

    pub fn auto_lock_minutes(&self) -> u32 {
        self.auto_lock_minutes
    }

    pub fn set_auto_lock(&mut self, minutes: u32) -> Result<(), WalletError> {
        self.auto_lock_minutes = minutes;
        self.storage.put(storage_keys::AUTO_LOCK_MINUTES, &minutes)?;
        Ok(())
    }

    /// Record a user-initiated operation. Passive reads never call this.
    pub fn touch_activity(&mut self, now_ms: i64) {
        self.last_activity_ms = now_ms;
    }

    /// Whether the idle window has elapsed. Zero minutes disables auto-lock.
    pub fn should_auto_lock(&self, now_ms: i64) -> bool {
        if self.unlocked.is_none() || self.auto_lock_minutes == 0 {
            return false;
        }
        now_ms - self.last_activity_ms >= (self.auto_lock_minutes as i64) * 60_000
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn require_unlocked(&self) -> Result<(), WalletError> {
        if self.unlocked.is_none() {
            return Err(WalletError::Locked);
        }
        Ok(())
    }

    fn with_account(
        &mut self,
        index: u32,
        f: impl FnOnce(&mut Account),
    ) -> Result<(), WalletError> {
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.index == index)
            .ok_or(WalletError::InvalidAccountIndex(index))?;
        f(account);
        self.persist_accounts()
    }

    fn persist_accounts(&self) -> Result<(), WalletError> {
        self.storage.put(storage_keys::ACCOUNTS, &self.accounts)?;
        self.storage
            .put(storage_keys::CURRENT_ACCOUNT_INDEX, &self.current_account_index)
    }
}

// ── Crypto helpers ───────────────────────────────────────────────────────────

fn stretch_password(
    password: &str,
    salt: &[u8],
    kdf: &KdfParams,
) -> Result<Zeroizing<[u8; VAULT_KEY_LEN]>, WalletError> {
    let params = Params::new(kdf.m_cost_kib, kdf.t_cost, kdf.p_cost, Some(VAULT_KEY_LEN))
        .map_err(|e| WalletError::Storage(format!("kdf params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = Zeroizing::new([0u8; VAULT_KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut *key)
        .map_err(|e| WalletError::Storage(format!("kdf: {e}")))?;
    Ok(key)
}

fn encrypt_mnemonic(password: &str, phrase: &str) -> Result<EncryptedVault, WalletError> {
    let kdf = KdfParams {
        m_cost_kib: ARGON2_M_COST_KIB,
        t_cost: ARGON2_T_COST,
        p_cost: ARGON2_P_COST,
    };
    let mut salt = [0u8; VAULT_SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut iv = [0u8; VAULT_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let key = stretch_password(password, &salt, &kdf)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&*key)
        .map_err(|e| WalletError::Storage(format!("cipher: {e}")))?;
    let ct = cipher
        .encrypt(Nonce::from_slice(&iv), phrase.as_bytes())
        .map_err(|e| WalletError::Storage(format!("encrypt: {e}")))?;

    Ok(EncryptedVault { iv, ct, salt, kdf, cipher: CIPHER_ID.to_string() })
}

fn decrypt_mnemonic(
    password: &str,
    blob: &EncryptedVault,
) -> Result<Zeroizing<String>, WalletError> {
    let key = stretch_password(password, &blob.salt, &blob.kdf)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&*key)
        .map_err(|e| WalletError::Storage(format!("cipher: {e}")))?;
    let mut plain = cipher
        .decrypt(Nonce::from_slice(&blob.iv), blob.ct.as_slice())
        .map_err(|_| WalletError::BadPassword)?;
    let phrase = String::from_utf8(plain.clone()).map_err(|_| WalletError::BadPassword)?;
    plain.zeroize();
    Ok(Zeroizing::new(phrase))
}

fn master_from_phrase(phrase: &str) -> Result<ExtendedKey, WalletError> {
    let mnemonic = parse_mnemonic(phrase)?;
    let mut seed = mnemonic_to_seed(&mnemonic, None);
    let master = ExtendedKey::from_seed(&seed);
    seed.zeroize();
    master
}
