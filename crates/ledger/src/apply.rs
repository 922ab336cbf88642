//! The transaction applier: one handler per kind, fronted by the nonce
//! gate.
//!
//! Handlers perform their fallible validations (sender binding, lookups,
//! arithmetic) before any state write wherever practical, so most failures
//! leave dirty untouched. Callers that need strict all-or-nothing
//! semantics per transaction drive the applier against a
//! [`make_copy`](MetaState::make_copy) sub-overlay and commit only if the
//! whole block succeeds.

use crate::arith::{safe_add, safe_mul};
use crate::state::{MetaState, StateError};
use crate::tx::{
    check_signee, BaseAccount, Billing, CreateDatabase, IssueKeys, ProvideService, Transaction,
    TransactionType, Transfer, UpdateBilling, UpdatePermission,
};
use crate::{
    Account, Address, DatabaseId, MinerInfo, ProviderProfile, SqlChainUser, TokenType,
    UserPermission, UserStatus,
};
use std::collections::HashMap;

impl MetaState {
    /// Validate and apply one transaction: nonce gate, kind dispatch, nonce
    /// bump. Errors surface with their kind unchanged; the consensus layer
    /// decides whether to drop the transaction or the block.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), StateError> {
        let kind = tx.transaction_type();
        let addr = tx.sender_address();
        let nonce = tx.nonce();
        log::info!("apply tx: kind={:?} sender={:?} nonce={}", kind, addr, nonce);

        let expected = match self.next_nonce(addr) {
            Ok(n) => n,
            // Bootstrap entries may target an account that does not exist
            // yet; their first nonce is 0.
            Err(StateError::AccountNotFound) if kind == TransactionType::BaseAccount => 0,
            Err(e) => return Err(e),
        };
        if expected != nonce {
            log::debug!(
                "nonce mismatch: sender={:?} expected={} got={}",
                addr,
                expected,
                nonce
            );
            return Err(StateError::InvalidAccountNonce {
                expected,
                got: nonce,
            });
        }

        if let Err(e) = self.apply_transaction(tx) {
            log::debug!(
                "apply tx failed: kind={:?} sender={:?} nonce={} error={}",
                kind,
                addr,
                nonce,
                e
            );
            return Err(e);
        }
        self.increase_nonce(addr)
    }

    /// Kind dispatch without the nonce gate. Wrapped transactions recurse.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), StateError> {
        match tx {
            Transaction::Transfer(t) => match self.transfer_sqlchain_token_balance(t) {
                Err(StateError::DatabaseNotFound) => self.transfer_account_token_balance(t),
                r => r,
            },
            Transaction::Billing(t) => self.apply_billing(t),
            Transaction::BaseAccount(t) => self.store_base_account(t),
            Transaction::ProvideService(t) => self.update_provider_list(t),
            Transaction::CreateDatabase(t) => self.match_providers_with_user(t),
            Transaction::UpdatePermission(t) => self.update_permission(t),
            Transaction::IssueKeys(t) => self.update_keys(t),
            Transaction::UpdateBilling(t) => self.update_billing(t),
            Transaction::Wrapper(inner) => self.apply_transaction(inner),
        }
    }

    /// Bootstrap entry. A transfer may have materialized an empty receiver
    /// account at this address already; merge the seeded balances into it,
    /// but refuse once the account has sent anything.
    fn store_base_account(&mut self, tx: &BaseAccount) -> Result<(), StateError> {
        log::debug!("store base account {:?}", tx.address);
        let (_, loaded) = self.load_or_store_account_object(tx.address, tx.account.clone());
        if !loaded {
            return Ok(());
        }

        let existing = self
            .load_account_object(tx.address)
            .ok_or(StateError::AccountNotFound)?;
        if existing.next_nonce != 0 {
            return Err(StateError::AccountExists);
        }
        // Validate both additions on locals, then write through once.
        let mut wave = existing.balance(TokenType::Wave);
        let mut particle = existing.balance(TokenType::Particle);
        safe_add(&mut wave, tx.account.balance(TokenType::Wave))?;
        safe_add(&mut particle, tx.account.balance(TokenType::Particle))?;

        let merged = self.account_mut(tx.address)?;
        *merged.balance_mut(TokenType::Wave) = wave;
        *merged.balance_mut(TokenType::Particle) = particle;
        Ok(())
    }

    /// Plain account-to-account movement.
    fn transfer_account_token_balance(&mut self, tx: &Transfer) -> Result<(), StateError> {
        check_signee(&tx.signee, tx.sender)?;
        self.transfer_account_token(tx.sender, tx.receiver, tx.amount, tx.token_type)
    }

    /// Transfer routed to a chain's billing records: the sender address is
    /// a provisioned chain and the amount tops up the matching user entry.
    /// `DatabaseNotFound` here means "not a chain" and the dispatcher falls
    /// back to the account path.
    fn transfer_sqlchain_token_balance(&mut self, tx: &Transfer) -> Result<(), StateError> {
        check_signee(&tx.signee, tx.sender)?;
        self.top_up_sqlchain_user(tx.sender, tx.amount, tx.token_type)
    }

    fn top_up_sqlchain_user(
        &mut self,
        sender: Address,
        amount: u64,
        token_type: TokenType,
    ) -> Result<(), StateError> {
        let mut chain = self
            .load_sqlchain_object(sender.database_id())
            .ok_or(StateError::DatabaseNotFound)?;

        let Some(idx) = chain.find_user(sender) else {
            // No billing entry for this address; nothing to top up.
            return Ok(());
        };
        if chain.token_type != token_type {
            return Err(StateError::WrongTokenType);
        }

        let min_dep = self
            .config()
            .min_deposit(chain.gas_price, chain.miners.len() as u64);
        let user = &mut chain.users[idx];
        if user.deposit < min_dep {
            let diff = min_dep - user.deposit;
            if diff >= amount {
                safe_add(&mut user.deposit, amount)?;
            } else {
                user.deposit = min_dep;
                safe_add(&mut user.deposit, amount - diff)?;
            }
        } else {
            safe_add(&mut user.advance_payment, amount)?;
        }
        self.store_sqlchain_object(chain);
        Ok(())
    }

    /// Legacy reward distribution: fees land in Wave, rewards in Particle,
    /// materializing receiver accounts as needed.
    fn apply_billing(&mut self, tx: &Billing) -> Result<(), StateError> {
        for (i, recv) in tx.receivers.iter().enumerate() {
            self.load_or_store_account_object(*recv, Account::new(*recv));
            let fee = tx.fees.get(i).copied().unwrap_or(0);
            let reward = tx.rewards.get(i).copied().unwrap_or(0);
            self.increase_account_covenant_balance(*recv, fee)?;
            self.increase_account_stable_balance(*recv, reward)?;
        }
        Ok(())
    }

    /// Register a service offer, staking the configured provider deposit.
    /// An already-registered provider keeps its existing offer.
    fn update_provider_list(&mut self, tx: &ProvideService) -> Result<(), StateError> {
        let sender = Address::from_public_key(&tx.signee);
        let deposit = self.config().min_provider_deposit;
        self.decrease_account_stable_balance(sender, deposit)?;
        let profile = ProviderProfile {
            provider: sender,
            space: tx.space,
            memory: tx.memory,
            load_avg_per_cpu: tx.load_avg_per_cpu,
            target_user: tx.target_user,
            deposit,
            gas_price: tx.gas_price,
            node_id: tx.node_id.clone(),
        };
        self.load_or_store_provider_object(sender, profile);
        Ok(())
    }

    /// Provision a chain: resolve every target offer, debit the owner once,
    /// install the profile with its signed genesis block, and consume the
    /// offers. All lookups and matching run before the first state write.
    fn match_providers_with_user(&mut self, tx: &CreateDatabase) -> Result<(), StateError> {
        let sender = check_signee(&tx.signee, tx.owner)?;

        if tx.gas_price == 0 {
            return Err(StateError::InvalidGasPrice);
        }
        let min_advance = self
            .config()
            .min_deposit(tx.gas_price, tx.resource_meta.target_miners.len() as u64);
        if tx.advance_payment < min_advance {
            log::warn!(
                "insufficient advance payment: got {} minimum {}",
                tx.advance_payment,
                min_advance
            );
            return Err(StateError::InsufficientAdvancePayment {
                min: min_advance,
                got: tx.advance_payment,
            });
        }

        let mut miners = Vec::with_capacity(tx.resource_meta.target_miners.len());
        for target in &tx.resource_meta.target_miners {
            let Some(offer) = self.load_provider_object(*target) else {
                log::error!("no provider offer for target miner {:?}", target);
                return Err(StateError::NoSuchMiner);
            };
            if offer.target_user != sender {
                log::error!(
                    "offer from {:?} targets another user, not {:?}",
                    target,
                    sender
                );
                return Err(StateError::MinerUserNotMatch);
            }
            if offer.gas_price > tx.gas_price {
                log::warn!(
                    "gas price mismatch: miner asks {} user offers {}",
                    offer.gas_price,
                    tx.gas_price
                );
                return Err(StateError::GasPriceMismatch);
            }
            miners.push(MinerInfo::from_provider(&offer));
        }

        let db_id = DatabaseId::from_owner_and_nonce(tx.owner, tx.nonce as u32);
        let db_addr = db_id.account_address();

        // One debit covers the mandatory deposit plus the declared advance.
        let mut total = min_advance;
        safe_add(&mut total, tx.advance_payment)?;
        self.decrease_account_token(sender, total, tx.token_type)?;

        let users = vec![SqlChainUser {
            address: sender,
            permission: UserPermission::Admin,
            status: UserStatus::Normal,
            deposit: min_advance,
            advance_payment: tx.advance_payment,
        }];
        let genesis = self.generate_genesis_block();
        let profile = crate::SqlChainProfile {
            id: db_id,
            address: db_addr,
            period: self.config().sqlchain_period,
            gas_price: tx.gas_price,
            // Chains bill in the stable token regardless of what the owner
            // was debited in.
            token_type: TokenType::Particle,
            owner: sender,
            users,
            miners,
            encoded_genesis: genesis.encode(),
        };

        if self.load_sqlchain_object(db_id).is_some() {
            return Err(StateError::DatabaseExists);
        }
        self.load_or_store_account_object(db_addr, Account::new(db_addr));
        self.load_or_store_sqlchain_object(db_id, profile);
        for target in &tx.resource_meta.target_miners {
            self.delete_provider_object(*target);
        }
        log::info!("created sqlchain {:?}", db_id);
        Ok(())
    }

    /// Admin grants or changes a user's permission. Admins cannot retarget
    /// themselves.
    fn update_permission(&mut self, tx: &UpdatePermission) -> Result<(), StateError> {
        let sender = Address::from_public_key(&tx.signee);
        if sender == tx.target_user {
            log::warn!("user {:?} cannot update its own permission", sender);
            return Err(StateError::InvalidSender);
        }
        let mut chain = self
            .load_sqlchain_object(tx.target_sqlchain)
            .ok_or(StateError::DatabaseNotFound)?;
        let permission =
            UserPermission::from_u32(tx.permission).ok_or(StateError::InvalidPermission)?;

        if !chain.is_admin(sender) {
            log::warn!(
                "permission update denied: {:?} is not an admin of {:?}",
                sender,
                tx.target_sqlchain
            );
            return Err(StateError::AccountPermissionDeny);
        }

        match chain.find_user(tx.target_user) {
            Some(i) => chain.users[i].permission = permission,
            None => chain.users.push(SqlChainUser {
                address: tx.target_user,
                permission,
                status: UserStatus::Normal,
                deposit: 0,
                advance_payment: 0,
            }),
        }
        self.store_sqlchain_object(chain);
        Ok(())
    }

    /// Admin distributes encryption keys to the chain's miners. Keys for
    /// miners not on the chain are silently ignored.
    fn update_keys(&mut self, tx: &IssueKeys) -> Result<(), StateError> {
        let sender = Address::from_public_key(&tx.signee);
        let mut chain = self
            .load_sqlchain_object(tx.target_sqlchain)
            .ok_or(StateError::DatabaseNotFound)?;
        if !chain.is_admin(sender) {
            log::warn!(
                "issue keys denied: {:?} is not an admin of {:?}",
                sender,
                tx.target_sqlchain
            );
            return Err(StateError::AccountPermissionDeny);
        }
        for key in &tx.miner_keys {
            if let Some(m) = chain.miners.iter_mut().find(|m| m.address == key.miner) {
                m.encryption_key = key.encryption_key.clone();
            }
        }
        self.store_sqlchain_object(chain);
        Ok(())
    }

    /// Miner-reported settlement. Rolls the previous window's pending
    /// income into received income, then distributes each user's bill —
    /// fully when the advance covers it, pro rata into arrears when not.
    fn update_billing(&mut self, tx: &UpdateBilling) -> Result<(), StateError> {
        let sender = Address::from_public_key(&tx.signee);
        let mut chain = self
            .load_sqlchain_object(tx.receiver.database_id())
            .ok_or(StateError::DatabaseNotFound)?;
        log::debug!("update billing: chain={:?} reporter={:?}", chain.id, sender);

        if !chain.is_miner(sender) {
            log::warn!("billing reporter {:?} is not a miner of the chain", sender);
            return Err(StateError::InvalidSender);
        }

        // Settle the previous window.
        for m in chain.miners.iter_mut() {
            let pending = m.pending_income;
            safe_add(&mut m.received_income, pending)?;
            m.pending_income = 0;
        }

        if chain.gas_price == 0 {
            self.store_sqlchain_object(chain);
            return Ok(());
        }

        let mut cost_map: HashMap<Address, u64> = HashMap::new();
        let mut income_map: HashMap<Address, HashMap<Address, u64>> = HashMap::new();
        for uc in &tx.users {
            cost_map.insert(uc.user, uc.cost);
            let per_miner = income_map.entry(uc.user).or_default();
            for mi in &uc.miners {
                let slot = per_miner.entry(mi.miner).or_insert(0);
                *slot = slot.saturating_add(mi.income);
            }
        }

        let gas_price = chain.gas_price;
        let crate::SqlChainProfile { users, miners, .. } = &mut chain;
        for user in users.iter_mut() {
            let cost = cost_map.get(&user.address).copied().unwrap_or(0);
            let bill = safe_mul(cost, gas_price)?;
            let incomes = income_map.get(&user.address);
            let miner_income = |addr: Address| -> u64 {
                incomes
                    .and_then(|per| per.get(&addr))
                    .copied()
                    .unwrap_or(0)
            };

            if user.advance_payment >= bill {
                user.advance_payment -= bill;
                for m in miners.iter_mut() {
                    let credit = safe_mul(miner_income(m.address), gas_price)?;
                    safe_add(&mut m.pending_income, credit)?;
                }
            } else {
                let advance = user.advance_payment;
                user.advance_payment = 0;
                user.status = UserStatus::Arrears;
                for m in miners.iter_mut() {
                    let credit = safe_mul(miner_income(m.address), gas_price)?;
                    // Paid fraction of the bill, floored: advance < bill
                    // here, so the quotient stays below `credit`.
                    let paid = ((credit as u128) * (advance as u128) / (bill as u128)) as u64;
                    safe_add(&mut m.pending_income, paid)?;
                    let shortfall = credit - paid;
                    for ua in m.user_arrears.iter_mut() {
                        ua.arrears = ua.arrears.saturating_add(shortfall);
                    }
                }
            }
        }

        self.store_sqlchain_object(chain);
        Ok(())
    }
}
