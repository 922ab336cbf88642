// Shared builders for the ledger integration tests.
#![allow(dead_code)]

use tide_crypto::{keypair, LocalKeys, NodeId, PublicKey};
use tide_ledger::{
    Account, Address, BaseAccount, ChainConfig, CreateDatabase, MetaState, ProvideService,
    ResourceMeta, TokenType, Transaction, Transfer,
};

/// A test participant: a keypair's public half and the derived address.
pub struct Actor {
    pub signee: PublicKey,
    pub address: Address,
}

pub fn actor() -> Actor {
    let (pk, _) = keypair();
    let address = Address::from_public_key(&pk);
    Actor { signee: pk, address }
}

/// Small knobs so minimum deposits stay single-digit in scenarios:
/// min_deposit(gas, miners) = gas × miners.
pub fn test_config() -> ChainConfig {
    ChainConfig {
        qps: 1,
        update_period: 1,
        min_provider_deposit: 10,
        sqlchain_period: 60 * 24 * 30,
    }
}

pub fn state() -> MetaState {
    MetaState::new(test_config(), LocalKeys::generate(NodeId::new("test-producer")))
}

pub fn balances(particle: u64, wave: u64) -> [u64; TokenType::COUNT] {
    let mut b = [0u64; TokenType::COUNT];
    b[TokenType::Particle as usize] = particle;
    b[TokenType::Wave as usize] = wave;
    b
}

pub fn base_account(addr: Address, particle: u64, wave: u64) -> Transaction {
    Transaction::BaseAccount(BaseAccount {
        address: addr,
        nonce: 0,
        account: Account {
            address: addr,
            next_nonce: 0,
            token_balance: balances(particle, wave),
        },
    })
}

/// Bootstrap an account through the regular applier; consumes nonce 0.
pub fn fund(s: &mut MetaState, addr: Address, particle: u64, wave: u64) {
    s.apply(&base_account(addr, particle, wave))
        .expect("bootstrap account");
}

pub fn transfer(
    from: &Actor,
    to: Address,
    amount: u64,
    token: TokenType,
    nonce: u64,
) -> Transaction {
    Transaction::Transfer(Transfer {
        sender: from.address,
        receiver: to,
        amount,
        token_type: token,
        nonce,
        signee: from.signee.clone(),
    })
}

pub fn provide_service(
    provider: &Actor,
    target_user: Address,
    gas_price: u64,
    nonce: u64,
) -> Transaction {
    Transaction::ProvideService(ProvideService {
        signee: provider.signee.clone(),
        nonce,
        space: 1 << 30,
        memory: 1 << 31,
        load_avg_per_cpu: 0.5,
        target_user,
        gas_price,
        node_id: NodeId::new(format!("node-{}", hex::encode(&provider.address.as_bytes()[..4]))),
    })
}

pub fn create_database(
    owner: &Actor,
    target_miners: &[Address],
    gas_price: u64,
    advance_payment: u64,
    nonce: u64,
) -> Transaction {
    Transaction::CreateDatabase(CreateDatabase {
        owner: owner.address,
        signee: owner.signee.clone(),
        nonce,
        resource_meta: ResourceMeta {
            target_miners: target_miners.to_vec(),
            space: 1 << 30,
            memory: 1 << 31,
            load_avg_per_cpu: 0.5,
            encryption_key: String::new(),
        },
        gas_price,
        advance_payment,
        token_type: TokenType::Particle,
    })
}
