//! Chain and provider profiles: the non-account world state.

use crate::{Address, DatabaseId, TokenType};
use serde::{Deserialize, Serialize};
use tide_crypto::NodeId;

/// What a user may do on a chain. Persisted; do not renumber.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserPermission {
    Admin = 0,
    Write = 1,
    Read = 2,
}

impl UserPermission {
    /// Map a raw wire value, rejecting anything out of range.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(UserPermission::Admin),
            1 => Some(UserPermission::Write),
            2 => Some(UserPermission::Read),
            _ => None,
        }
    }
}

/// Billing standing of a chain user.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Normal = 0,
    /// Advance payment exhausted mid-cycle; outstanding amounts recorded
    /// against the miners.
    Arrears = 1,
}

/// Per-chain user record. Unique by address within a profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlChainUser {
    pub address: Address,
    pub permission: UserPermission,
    pub status: UserStatus,
    /// Service deposit, topped up before advance payments are accepted.
    pub deposit: u64,
    /// Prepaid query fees, consumed by billing settlements.
    pub advance_payment: u64,
}

/// Unpaid billing recorded against one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserArrears {
    pub user: Address,
    pub arrears: u64,
}

/// A provider that was selected into a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerInfo {
    pub address: Address,
    pub node_id: NodeId,
    pub deposit: u64,
    pub encryption_key: String,
    /// Income earned in the current billing window.
    pub pending_income: u64,
    /// Income settled from previous windows.
    pub received_income: u64,
    pub user_arrears: Vec<UserArrears>,
}

impl MinerInfo {
    /// Fresh miner record carrying over the provider's deposit.
    pub fn from_provider(p: &ProviderProfile) -> Self {
        MinerInfo {
            address: p.provider,
            node_id: p.node_id.clone(),
            deposit: p.deposit,
            encryption_key: String::new(),
            pending_income: 0,
            received_income: 0,
            user_arrears: Vec::new(),
        }
    }
}

/// World-state record of one provisioned chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlChainProfile {
    pub id: DatabaseId,
    /// The chain's own account address (raw bytes of `id`).
    pub address: Address,
    /// Billing period in minutes.
    pub period: u64,
    pub gas_price: u64,
    pub token_type: TokenType,
    pub owner: Address,
    /// Unique by address; must retain at least one Admin while the chain
    /// exists.
    pub users: Vec<SqlChainUser>,
    /// Order preserved from the creating transaction's target list.
    pub miners: Vec<MinerInfo>,
    /// Msgpack bytes of the signed genesis block.
    pub encoded_genesis: Vec<u8>,
}

impl SqlChainProfile {
    pub fn find_user(&self, addr: Address) -> Option<usize> {
        self.users.iter().position(|u| u.address == addr)
    }

    pub fn is_admin(&self, addr: Address) -> bool {
        self.users
            .iter()
            .any(|u| u.address == addr && u.permission == UserPermission::Admin)
    }

    pub fn is_miner(&self, addr: Address) -> bool {
        self.miners.iter().any(|m| m.address == addr)
    }
}

/// A standing service offer. Created by `ProvideService`, consumed and
/// removed when a matching `CreateDatabase` succeeds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub provider: Address,
    pub space: u64,
    pub memory: u64,
    pub load_avg_per_cpu: f64,
    /// The only user this offer may be consumed by.
    pub target_user: Address,
    pub deposit: u64,
    pub gas_price: u64,
    pub node_id: NodeId,
}
