//! Transaction taxonomy.
//!
//! One variant per kind, dispatched by a plain `match` in the applier. The
//! integer tags mirror what the consensus layer writes into its log, so a
//! tag it hands us that no variant claims surfaces as
//! `UnknownTransactionType` instead of a decode panic.

use crate::{Account, Address, DatabaseId, StateError, TokenType};
use serde::{Deserialize, Serialize};
use tide_crypto::{NodeId, PublicKey};

/// Stable integer tags for the transaction kinds. Persisted; do not
/// renumber.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionType {
    BaseAccount = 0,
    Transfer = 1,
    Billing = 2,
    ProvideService = 3,
    CreateDatabase = 4,
    UpdatePermission = 5,
    IssueKeys = 6,
    UpdateBilling = 7,
}

impl TransactionType {
    pub fn from_u32(v: u32) -> Result<Self, StateError> {
        Ok(match v {
            0 => TransactionType::BaseAccount,
            1 => TransactionType::Transfer,
            2 => TransactionType::Billing,
            3 => TransactionType::ProvideService,
            4 => TransactionType::CreateDatabase,
            5 => TransactionType::UpdatePermission,
            6 => TransactionType::IssueKeys,
            7 => TransactionType::UpdateBilling,
            other => return Err(StateError::UnknownTransactionType(other)),
        })
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Bootstrap entry seeding an account directly, without a sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    pub address: Address,
    pub nonce: u64,
    pub account: Account,
}

/// Token movement between two accounts, or a top-up of a chain's billing
/// records when the sender address is a provisioned chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub sender: Address,
    pub receiver: Address,
    pub amount: u64,
    pub token_type: TokenType,
    pub nonce: u64,
    pub signee: PublicKey,
}

/// Legacy reward distribution: fees land in Wave, rewards in Particle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Billing {
    pub producer: Address,
    pub nonce: u64,
    pub receivers: Vec<Address>,
    pub fees: Vec<u64>,
    pub rewards: Vec<u64>,
}

/// Register a standing service offer, staking the provider deposit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProvideService {
    pub signee: PublicKey,
    pub nonce: u64,
    pub space: u64,
    pub memory: u64,
    pub load_avg_per_cpu: f64,
    pub target_user: Address,
    pub gas_price: u64,
    pub node_id: NodeId,
}

/// Resource requirements attached to a database creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct ResourceMeta {
    /// Providers to consume, in the order they become the chain's miners.
    pub target_miners: Vec<Address>,
    pub space: u64,
    pub memory: u64,
    pub load_avg_per_cpu: f64,
    pub encryption_key: String,
}

/// Provision a chain: debit the owner, consume the matching offers,
/// synthesize the signed genesis block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateDatabase {
    pub owner: Address,
    pub signee: PublicKey,
    pub nonce: u64,
    pub resource_meta: ResourceMeta,
    pub gas_price: u64,
    pub advance_payment: u64,
    pub token_type: TokenType,
}

/// Admin-driven grant or change of a user's permission on a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePermission {
    pub signee: PublicKey,
    pub nonce: u64,
    pub target_sqlchain: DatabaseId,
    pub target_user: Address,
    /// Raw wire value; out-of-range rejects with `InvalidPermission`.
    pub permission: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerKey {
    pub miner: Address,
    pub encryption_key: String,
}

/// Admin-driven distribution of encryption keys to a chain's miners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueKeys {
    pub signee: PublicKey,
    pub nonce: u64,
    pub target_sqlchain: DatabaseId,
    pub miner_keys: Vec<MinerKey>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerIncome {
    pub miner: Address,
    pub income: u64,
}

/// One user's consumption in the reported window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCost {
    pub user: Address,
    pub cost: u64,
    pub miners: Vec<MinerIncome>,
}

/// Miner-reported settlement of a chain's billing window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBilling {
    pub signee: PublicKey,
    pub nonce: u64,
    /// The chain's account address.
    pub receiver: Address,
    pub users: Vec<UserCost>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Transaction {
    BaseAccount(BaseAccount),
    Transfer(Transfer),
    Billing(Billing),
    ProvideService(ProvideService),
    CreateDatabase(CreateDatabase),
    UpdatePermission(UpdatePermission),
    IssueKeys(IssueKeys),
    UpdateBilling(UpdateBilling),
    /// Transport envelope; the applier unwraps and recurses.
    Wrapper(Box<Transaction>),
}

impl Transaction {
    /// The kind used for dispatch and logging. Wrappers report their inner
    /// transaction's kind.
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Transaction::BaseAccount(_) => TransactionType::BaseAccount,
            Transaction::Transfer(_) => TransactionType::Transfer,
            Transaction::Billing(_) => TransactionType::Billing,
            Transaction::ProvideService(_) => TransactionType::ProvideService,
            Transaction::CreateDatabase(_) => TransactionType::CreateDatabase,
            Transaction::UpdatePermission(_) => TransactionType::UpdatePermission,
            Transaction::IssueKeys(_) => TransactionType::IssueKeys,
            Transaction::UpdateBilling(_) => TransactionType::UpdateBilling,
            Transaction::Wrapper(inner) => inner.transaction_type(),
        }
    }

    /// The account whose nonce this transaction consumes. Kinds without a
    /// declared sender field derive it from the attached public key.
    pub fn sender_address(&self) -> Address {
        match self {
            Transaction::BaseAccount(t) => t.address,
            Transaction::Transfer(t) => t.sender,
            Transaction::Billing(t) => t.producer,
            Transaction::ProvideService(t) => Address::from_public_key(&t.signee),
            Transaction::CreateDatabase(t) => t.owner,
            Transaction::UpdatePermission(t) => Address::from_public_key(&t.signee),
            Transaction::IssueKeys(t) => Address::from_public_key(&t.signee),
            Transaction::UpdateBilling(t) => Address::from_public_key(&t.signee),
            Transaction::Wrapper(inner) => inner.sender_address(),
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Transaction::BaseAccount(t) => t.nonce,
            Transaction::Transfer(t) => t.nonce,
            Transaction::Billing(t) => t.nonce,
            Transaction::ProvideService(t) => t.nonce,
            Transaction::CreateDatabase(t) => t.nonce,
            Transaction::UpdatePermission(t) => t.nonce,
            Transaction::IssueKeys(t) => t.nonce,
            Transaction::UpdateBilling(t) => t.nonce,
            Transaction::Wrapper(inner) => inner.nonce(),
        }
    }
}

/// Check the public-key-to-address binding: the address derived from
/// `signee` must equal the declared sender. Signature validity itself is
/// the consensus layer's job.
pub(crate) fn check_signee(signee: &PublicKey, declared: Address) -> Result<Address, StateError> {
    let real = Address::from_public_key(signee);
    if real != declared {
        log::warn!(
            "public key does not match declared sender: real={:?} declared={:?}",
            real,
            declared
        );
        return Err(StateError::InvalidSender);
    }
    Ok(real)
}
