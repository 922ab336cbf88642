use crate::Address;
use serde::{Deserialize, Serialize};

/// Token kinds held by every account. The integer values index
/// [`Account::token_balance`] and are part of the persisted layout; do not
/// renumber.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    /// The stable, fee-bearing token.
    Particle = 0,
    /// The covenant token used for service deposits.
    Wave = 1,
}

impl TokenType {
    pub const COUNT: usize = 2;
}

/// Ledger account: a monotonic nonce and one balance slot per token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Account {
    pub address: Address,
    pub next_nonce: u64,
    pub token_balance: [u64; TokenType::COUNT],
}

impl Account {
    /// Empty account at `address`: zero balances, nonce 0.
    pub fn new(address: Address) -> Self {
        Account {
            address,
            ..Account::default()
        }
    }

    #[inline]
    pub fn balance(&self, token: TokenType) -> u64 {
        self.token_balance[token as usize]
    }

    #[inline]
    pub fn balance_mut(&mut self, token: TokenType) -> &mut u64 {
        &mut self.token_balance[token as usize]
    }
}
