//! The dirty/readonly overlay.
//!
//! `readonly` holds the committed baseline; `dirty` records pending
//! changes, with `None` marking a deletion. Lookups are dirty-first and a
//! marker shadows the readonly entry. The readonly side is never modified
//! in place: every mutation clones the target into dirty first, and
//! `commit` folds dirty down in one pass.
//!
//! The engine is single-threaded; the consensus layer serializes calls.

use crate::arith::{safe_add, safe_sub, ArithError};
use crate::index::MetaIndex;
use crate::{
    Account, Address, ChainConfig, DatabaseId, ProviderProfile, SqlChainProfile, SqlChainUser,
    TokenType, UserPermission, UserStatus,
};
use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;
use tide_crypto::LocalKeys;

/// Everything the applier and its callers can fail with. The consensus
/// layer matches on the kind to decide whether to drop the transaction or
/// the whole block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("account not found")]
    AccountNotFound,
    #[error("account already exists")]
    AccountExists,
    #[error("database not found")]
    DatabaseNotFound,
    #[error("database already exists")]
    DatabaseExists,
    #[error("database user already exists")]
    DatabaseUserExists,
    #[error("invalid sender")]
    InvalidSender,
    #[error("invalid account nonce (expected {expected}, got {got})")]
    InvalidAccountNonce { expected: u64, got: u64 },
    #[error("invalid permission")]
    InvalidPermission,
    #[error("invalid gas price")]
    InvalidGasPrice,
    #[error("insufficient advance payment (minimum {min}, got {got})")]
    InsufficientAdvancePayment { min: u64, got: u64 },
    #[error("no such miner")]
    NoSuchMiner,
    #[error("miner is not willing to serve this user")]
    MinerUserNotMatch,
    #[error("gas price mismatch")]
    GasPriceMismatch,
    #[error("account permission denied")]
    AccountPermissionDeny,
    #[error("wrong token type")]
    WrongTokenType,
    #[error("unknown transaction type {0}")]
    UnknownTransactionType(u32),
    #[error(transparent)]
    Arith(#[from] ArithError),
}

/// Dirty-first lookup honoring deletion markers.
fn overlay_get<'a, K: Eq + Hash, V>(
    dirty: &'a HashMap<K, Option<V>>,
    readonly: &'a HashMap<K, Option<V>>,
    k: &K,
) -> Option<&'a V> {
    match dirty.get(k) {
        Some(slot) => slot.as_ref(),
        None => readonly.get(k).and_then(Option::as_ref),
    }
}

/// Return the existing object and `true`, or install `v` into dirty and
/// return it with `false`. A marker in dirty does not hide a readonly
/// entry here: load-or-store only materializes genuinely absent objects.
fn overlay_load_or_store<'a, K: Eq + Hash + Copy, V>(
    dirty: &'a mut HashMap<K, Option<V>>,
    readonly: &'a HashMap<K, Option<V>>,
    k: K,
    v: V,
) -> (&'a V, bool) {
    let loaded = matches!(dirty.get(&k), Some(Some(_)))
        || matches!(readonly.get(&k), Some(Some(_)));
    if !loaded {
        dirty.insert(k, Some(v));
    }
    let obj = dirty
        .get(&k)
        .and_then(Option::as_ref)
        .or_else(|| readonly.get(&k).and_then(Option::as_ref))
        .expect("object present after load-or-store");
    (obj, loaded)
}

/// Fold dirty entries into readonly: non-marker replaces, marker deletes.
fn overlay_fold<K: Eq + Hash, V>(
    dirty: &mut HashMap<K, Option<V>>,
    readonly: &mut HashMap<K, Option<V>>,
) {
    for (k, v) in dirty.drain() {
        match v {
            Some(o) => {
                readonly.insert(k, Some(o));
            }
            None => {
                readonly.remove(&k);
            }
        }
    }
}

/// The block producer's world state.
pub struct MetaState {
    dirty: MetaIndex,
    readonly: MetaIndex,
    config: ChainConfig,
    keys: LocalKeys,
}

impl MetaState {
    pub fn new(config: ChainConfig, keys: LocalKeys) -> Self {
        MetaState {
            dirty: MetaIndex::new(),
            readonly: MetaIndex::new(),
            config,
            keys,
        }
    }

    #[inline]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn keys(&self) -> &LocalKeys {
        &self.keys
    }

    // ── accounts ────────────────────────────────────────────────────────

    /// Shared view of an account; callers must not rely on it surviving a
    /// mutation. Mutation goes through the token/nonce helpers, which
    /// copy-on-write into dirty.
    pub fn load_account_object(&self, k: Address) -> Option<&Account> {
        overlay_get(&self.dirty.accounts, &self.readonly.accounts, &k)
    }

    pub fn load_or_store_account_object(&mut self, k: Address, v: Account) -> (&Account, bool) {
        overlay_load_or_store(&mut self.dirty.accounts, &self.readonly.accounts, k, v)
    }

    pub fn load_account_stable_balance(&self, addr: Address) -> Option<u64> {
        let b = self
            .load_account_object(addr)
            .map(|o| o.balance(TokenType::Particle));
        log::debug!(
            "queried stable balance: account={} balance={:?}",
            hex_tail(addr),
            b
        );
        b
    }

    pub fn load_account_covenant_balance(&self, addr: Address) -> Option<u64> {
        let b = self
            .load_account_object(addr)
            .map(|o| o.balance(TokenType::Wave));
        log::debug!(
            "queried covenant balance: account={} balance={:?}",
            hex_tail(addr),
            b
        );
        b
    }

    /// Mark the account deleted; the marker shadows readonly until commit.
    pub fn delete_account_object(&mut self, k: Address) {
        self.dirty.accounts.insert(k, None);
    }

    /// Copy-on-write access. A deletion marker counts as absent.
    pub(crate) fn account_mut(&mut self, k: Address) -> Result<&mut Account, StateError> {
        match self.dirty.accounts.get(&k) {
            Some(Some(_)) => {}
            Some(None) => return Err(StateError::AccountNotFound),
            None => {
                let src = self
                    .readonly
                    .accounts
                    .get(&k)
                    .and_then(Option::as_ref)
                    .ok_or(StateError::AccountNotFound)?;
                let cpy = src.clone();
                self.dirty.accounts.insert(k, Some(cpy));
            }
        }
        match self.dirty.accounts.get_mut(&k) {
            Some(Some(o)) => Ok(o),
            _ => Err(StateError::AccountNotFound),
        }
    }

    pub fn increase_account_token(
        &mut self,
        k: Address,
        amount: u64,
        token: TokenType,
    ) -> Result<(), StateError> {
        let acc = self.account_mut(k)?;
        safe_add(acc.balance_mut(token), amount)?;
        Ok(())
    }

    pub fn decrease_account_token(
        &mut self,
        k: Address,
        amount: u64,
        token: TokenType,
    ) -> Result<(), StateError> {
        let acc = self.account_mut(k)?;
        safe_sub(acc.balance_mut(token), amount)?;
        Ok(())
    }

    pub fn increase_account_stable_balance(
        &mut self,
        k: Address,
        amount: u64,
    ) -> Result<(), StateError> {
        self.increase_account_token(k, amount, TokenType::Particle)
    }

    pub fn decrease_account_stable_balance(
        &mut self,
        k: Address,
        amount: u64,
    ) -> Result<(), StateError> {
        self.decrease_account_token(k, amount, TokenType::Particle)
    }

    pub fn increase_account_covenant_balance(
        &mut self,
        k: Address,
        amount: u64,
    ) -> Result<(), StateError> {
        self.increase_account_token(k, amount, TokenType::Wave)
    }

    pub fn decrease_account_covenant_balance(
        &mut self,
        k: Address,
        amount: u64,
    ) -> Result<(), StateError> {
        self.decrease_account_token(k, amount, TokenType::Wave)
    }

    /// Move `amount` of `token` between two accounts.
    ///
    /// Two phases: run both safe operations on local copies first, then
    /// copy-on-write and store the new balances. An arithmetic failure
    /// therefore leaves neither endpoint half-updated.
    pub(crate) fn transfer_account_token(
        &mut self,
        sender: Address,
        receiver: Address,
        amount: u64,
        token: TokenType,
    ) -> Result<(), StateError> {
        if sender == receiver || amount == 0 {
            return Ok(());
        }

        // A first inbound transfer materializes an empty receiver account.
        self.load_or_store_account_object(receiver, Account::new(receiver));

        let mut sb = self
            .load_account_object(sender)
            .ok_or(StateError::AccountNotFound)?
            .balance(token);
        let mut rb = self
            .load_account_object(receiver)
            .ok_or(StateError::AccountNotFound)?
            .balance(token);
        safe_sub(&mut sb, amount)?;
        safe_add(&mut rb, amount)?;

        *self.account_mut(sender)?.balance_mut(token) = sb;
        *self.account_mut(receiver)?.balance_mut(token) = rb;
        Ok(())
    }

    pub fn next_nonce(&self, addr: Address) -> Result<u64, StateError> {
        match self.load_account_object(addr) {
            Some(o) => Ok(o.next_nonce),
            None => {
                log::debug!("next nonce queried for unknown account {}", hex_tail(addr));
                Err(StateError::AccountNotFound)
            }
        }
    }

    pub fn increase_nonce(&mut self, addr: Address) -> Result<(), StateError> {
        self.account_mut(addr)?.next_nonce += 1;
        Ok(())
    }

    // ── databases ───────────────────────────────────────────────────────

    /// Deep copy of the chain profile, free to mutate. Write changes back
    /// with [`store_sqlchain_object`](Self::store_sqlchain_object); nothing
    /// is committed implicitly.
    pub fn load_sqlchain_object(&self, k: DatabaseId) -> Option<SqlChainProfile> {
        overlay_get(&self.dirty.databases, &self.readonly.databases, &k).cloned()
    }

    pub fn load_or_store_sqlchain_object(
        &mut self,
        k: DatabaseId,
        v: SqlChainProfile,
    ) -> (&SqlChainProfile, bool) {
        overlay_load_or_store(&mut self.dirty.databases, &self.readonly.databases, k, v)
    }

    /// Write a (typically mutated) profile copy into dirty unconditionally.
    pub fn store_sqlchain_object(&mut self, v: SqlChainProfile) {
        self.dirty.databases.insert(v.id, Some(v));
    }

    pub fn delete_sqlchain_object(&mut self, k: DatabaseId) {
        self.dirty.databases.insert(k, None);
    }

    /// Copy-on-write access to a chain profile.
    fn sqlchain_mut(&mut self, k: DatabaseId) -> Result<&mut SqlChainProfile, StateError> {
        match self.dirty.databases.get(&k) {
            Some(Some(_)) => {}
            Some(None) => return Err(StateError::DatabaseNotFound),
            None => {
                let src = self
                    .readonly
                    .databases
                    .get(&k)
                    .and_then(Option::as_ref)
                    .ok_or(StateError::DatabaseNotFound)?;
                let cpy = src.clone();
                self.dirty.databases.insert(k, Some(cpy));
            }
        }
        match self.dirty.databases.get_mut(&k) {
            Some(Some(o)) => Ok(o),
            _ => Err(StateError::DatabaseNotFound),
        }
    }

    /// Bootstrap helper: install an empty chain owned by `addr`, with the
    /// owner as its only (Admin) user.
    pub fn create_sqlchain(&mut self, addr: Address, id: DatabaseId) -> Result<(), StateError> {
        if self.load_account_object(addr).is_none() {
            return Err(StateError::AccountNotFound);
        }
        if self.dirty.databases.contains_key(&id) || self.readonly.databases.contains_key(&id) {
            return Err(StateError::DatabaseExists);
        }
        self.dirty.databases.insert(
            id,
            Some(SqlChainProfile {
                id,
                address: id.account_address(),
                period: 0,
                gas_price: 0,
                token_type: TokenType::Particle,
                owner: addr,
                users: vec![SqlChainUser {
                    address: addr,
                    permission: UserPermission::Admin,
                    status: UserStatus::Normal,
                    deposit: 0,
                    advance_payment: 0,
                }],
                miners: Vec::new(),
                encoded_genesis: Vec::new(),
            }),
        );
        Ok(())
    }

    pub fn add_sqlchain_user(
        &mut self,
        k: DatabaseId,
        addr: Address,
        permission: UserPermission,
    ) -> Result<(), StateError> {
        let chain = self.sqlchain_mut(k)?;
        if chain.find_user(addr).is_some() {
            return Err(StateError::DatabaseUserExists);
        }
        chain.users.push(SqlChainUser {
            address: addr,
            permission,
            status: UserStatus::Normal,
            deposit: 0,
            advance_payment: 0,
        });
        Ok(())
    }

    pub fn delete_sqlchain_user(&mut self, k: DatabaseId, addr: Address) -> Result<(), StateError> {
        let chain = self.sqlchain_mut(k)?;
        chain.users.retain(|u| u.address != addr);
        Ok(())
    }

    pub fn alter_sqlchain_user(
        &mut self,
        k: DatabaseId,
        addr: Address,
        permission: UserPermission,
    ) -> Result<(), StateError> {
        let chain = self.sqlchain_mut(k)?;
        for u in chain.users.iter_mut() {
            if u.address == addr {
                u.permission = permission;
            }
        }
        Ok(())
    }

    /// Committed chains in which `addr` serves as a miner, as deep copies.
    pub fn load_ro_sqlchains(&self, addr: Address) -> Vec<SqlChainProfile> {
        self.readonly
            .databases
            .values()
            .filter_map(Option::as_ref)
            .filter(|db| db.is_miner(addr))
            .cloned()
            .collect()
    }

    // ── providers ───────────────────────────────────────────────────────

    /// Deep copy of a provider offer.
    pub fn load_provider_object(&self, k: Address) -> Option<ProviderProfile> {
        overlay_get(&self.dirty.providers, &self.readonly.providers, &k).cloned()
    }

    pub fn load_or_store_provider_object(
        &mut self,
        k: Address,
        v: ProviderProfile,
    ) -> (&ProviderProfile, bool) {
        overlay_load_or_store(&mut self.dirty.providers, &self.readonly.providers, k, v)
    }

    pub fn delete_provider_object(&mut self, k: Address) {
        self.dirty.providers.insert(k, None);
    }

    // ── overlay lifecycle ───────────────────────────────────────────────

    /// Fold dirty into readonly and reset dirty. The fold is a pure map
    /// operation per entry, so it cannot partially fail.
    pub fn commit(&mut self) {
        overlay_fold(&mut self.dirty.accounts, &mut self.readonly.accounts);
        overlay_fold(&mut self.dirty.databases, &mut self.readonly.databases);
        overlay_fold(&mut self.dirty.providers, &mut self.readonly.providers);
    }

    /// Discard all pending changes.
    pub fn clean(&mut self) {
        self.dirty = MetaIndex::new();
    }

    /// Independent overlay over a deep copy of the committed baseline,
    /// with an empty dirty layer. Used to evaluate a proposed block
    /// speculatively.
    pub fn make_copy(&self) -> MetaState {
        MetaState {
            dirty: MetaIndex::new(),
            readonly: self.readonly.deep_copy(),
            config: self.config,
            keys: self.keys.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn dirty_is_empty(&self) -> bool {
        self.dirty.is_empty()
    }
}

/// Last four address bytes, for log lines.
fn hex_tail(addr: Address) -> String {
    let b = addr.as_bytes();
    format!(
        "..{:02x}{:02x}{:02x}{:02x}",
        b[16], b[17], b[18], b[19]
    )
}
