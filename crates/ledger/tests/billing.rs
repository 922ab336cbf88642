//! Permission management, key issuance, billing settlement, and the legacy
//! reward distribution.

mod support;

use support::*;
use tide_ledger::{
    Address, Billing, DatabaseId, IssueKeys, MinerIncome, MinerKey, StateError, Transaction,
    UpdateBilling, UpdatePermission, UserCost, UserPermission, UserStatus,
};

struct Chain {
    id: DatabaseId,
    address: Address,
    owner: Actor,
    miner: Actor,
}

/// One chain with gas_price 2, a single miner, and the owner holding an
/// advance payment of 5 (min deposit is 2 under the test config).
fn provisioned_chain(s: &mut tide_ledger::MetaState) -> Chain {
    let owner = actor();
    let miner = actor();
    fund(s, owner.address, 100, 0);
    fund(s, miner.address, 100, 0);
    s.apply(&provide_service(&miner, owner.address, 1, 1))
        .unwrap();
    s.apply(&create_database(&owner, &[miner.address], 2, 5, 1))
        .unwrap();
    let id = DatabaseId::from_owner_and_nonce(owner.address, 1);
    Chain {
        id,
        address: id.account_address(),
        owner,
        miner,
    }
}

fn update_billing(
    reporter: &Actor,
    chain_address: Address,
    users: Vec<UserCost>,
    nonce: u64,
) -> Transaction {
    Transaction::UpdateBilling(UpdateBilling {
        signee: reporter.signee.clone(),
        nonce,
        receiver: chain_address,
        users,
    })
}

fn user_cost(user: Address, cost: u64, miner: Address, income: u64) -> UserCost {
    UserCost {
        user,
        cost,
        miners: vec![MinerIncome { miner, income }],
    }
}

#[test]
fn billing_within_advance_pays_miners_in_full() {
    let mut s = state();
    let c = provisioned_chain(&mut s);

    // cost 2 × gas 2 = bill 4, advance 5 covers it.
    s.apply(&update_billing(
        &c.miner,
        c.address,
        vec![user_cost(c.owner.address, 2, c.miner.address, 2)],
        2,
    ))
    .unwrap();

    let chain = s.load_sqlchain_object(c.id).unwrap();
    assert_eq!(chain.users[0].advance_payment, 1);
    assert_eq!(chain.users[0].status, UserStatus::Normal);
    assert_eq!(chain.miners[0].pending_income, 4);
    assert_eq!(chain.miners[0].received_income, 0);
}

#[test]
fn billing_settles_the_previous_window_first() {
    let mut s = state();
    let c = provisioned_chain(&mut s);
    s.apply(&update_billing(
        &c.miner,
        c.address,
        vec![user_cost(c.owner.address, 2, c.miner.address, 2)],
        2,
    ))
    .unwrap();

    // An empty report rolls pending into received.
    s.apply(&update_billing(&c.miner, c.address, Vec::new(), 3))
        .unwrap();
    let chain = s.load_sqlchain_object(c.id).unwrap();
    assert_eq!(chain.miners[0].pending_income, 0);
    assert_eq!(chain.miners[0].received_income, 4);
}

#[test]
fn billing_beyond_advance_goes_to_arrears_pro_rata() {
    let mut s = state();
    let c = provisioned_chain(&mut s);

    // cost 10 × gas 2 = bill 20, advance only 5: the user goes into
    // arrears, the miner gets floor(20 × 5 / 20) = 5.
    s.apply(&update_billing(
        &c.miner,
        c.address,
        vec![user_cost(c.owner.address, 10, c.miner.address, 10)],
        2,
    ))
    .unwrap();

    let chain = s.load_sqlchain_object(c.id).unwrap();
    assert_eq!(chain.users[0].advance_payment, 0);
    assert_eq!(chain.users[0].status, UserStatus::Arrears);
    assert_eq!(chain.miners[0].pending_income, 5);
}

#[test]
fn billing_from_a_non_miner_is_rejected() {
    let mut s = state();
    let c = provisioned_chain(&mut s);

    // The owner is a user, not a miner.
    let err = s
        .apply(&update_billing(
            &c.owner,
            c.address,
            vec![user_cost(c.owner.address, 1, c.miner.address, 1)],
            2,
        ))
        .unwrap_err();
    assert_eq!(err, StateError::InvalidSender);
    let chain = s.load_sqlchain_object(c.id).unwrap();
    assert_eq!(chain.users[0].advance_payment, 5);
}

#[test]
fn billing_against_a_plain_address_reports_database_not_found() {
    let mut s = state();
    let c = provisioned_chain(&mut s);
    let err = s
        .apply(&update_billing(&c.miner, c.miner.address, Vec::new(), 2))
        .unwrap_err();
    assert_eq!(err, StateError::DatabaseNotFound);
}

#[test]
fn zero_gas_price_still_settles_the_previous_window() {
    let mut s = state();
    let reporter = actor();
    fund(&mut s, reporter.address, 10, 0);

    // Hand-build a free chain with income pending from an earlier window.
    let id = DatabaseId::from_owner_and_nonce(reporter.address, 7);
    s.store_sqlchain_object(tide_ledger::SqlChainProfile {
        id,
        address: id.account_address(),
        period: 0,
        gas_price: 0,
        token_type: tide_ledger::TokenType::Particle,
        owner: reporter.address,
        users: Vec::new(),
        miners: vec![tide_ledger::MinerInfo {
            address: reporter.address,
            node_id: tide_crypto::NodeId::new("free-miner"),
            deposit: 0,
            encryption_key: String::new(),
            pending_income: 3,
            received_income: 1,
            user_arrears: Vec::new(),
        }],
        encoded_genesis: Vec::new(),
    });

    s.apply(&update_billing(
        &reporter,
        id.account_address(),
        vec![user_cost(reporter.address, 5, reporter.address, 5)],
        1,
    ))
    .unwrap();

    // The roll happened, but nothing was billed at gas price 0.
    let chain = s.load_sqlchain_object(id).unwrap();
    assert_eq!(chain.miners[0].pending_income, 0);
    assert_eq!(chain.miners[0].received_income, 4);
}

#[test]
fn admin_grants_and_updates_permissions() {
    let mut s = state();
    let c = provisioned_chain(&mut s);
    let w = actor();

    let grant = |permission: u32, nonce: u64| {
        Transaction::UpdatePermission(UpdatePermission {
            signee: c.owner.signee.clone(),
            nonce,
            target_sqlchain: c.id,
            target_user: w.address,
            permission,
        })
    };

    // Read, then tightened to Write in place.
    s.apply(&grant(2, 2)).unwrap();
    let chain = s.load_sqlchain_object(c.id).unwrap();
    let i = chain.find_user(w.address).unwrap();
    assert_eq!(chain.users[i].permission, UserPermission::Read);
    assert_eq!(chain.users[i].status, UserStatus::Normal);

    s.apply(&grant(1, 3)).unwrap();
    let chain = s.load_sqlchain_object(c.id).unwrap();
    assert_eq!(chain.users.len(), 2, "update happens in place");
    let i = chain.find_user(w.address).unwrap();
    assert_eq!(chain.users[i].permission, UserPermission::Write);
}

#[test]
fn permission_update_rejects_out_of_range_values() {
    let mut s = state();
    let c = provisioned_chain(&mut s);
    let w = actor();
    let tx = Transaction::UpdatePermission(UpdatePermission {
        signee: c.owner.signee.clone(),
        nonce: 2,
        target_sqlchain: c.id,
        target_user: w.address,
        permission: 99,
    });
    assert_eq!(s.apply(&tx).unwrap_err(), StateError::InvalidPermission);
}

#[test]
fn permission_update_denies_non_admins_and_self_service() {
    let mut s = state();
    let c = provisioned_chain(&mut s);
    let w = actor();
    fund(&mut s, w.address, 10, 0);

    // Self-service is invalid regardless of membership.
    let selfie = Transaction::UpdatePermission(UpdatePermission {
        signee: w.signee.clone(),
        nonce: 1,
        target_sqlchain: c.id,
        target_user: w.address,
        permission: 2,
    });
    assert_eq!(s.apply(&selfie).unwrap_err(), StateError::InvalidSender);

    // A stranger cannot grant permissions either.
    let grant = Transaction::UpdatePermission(UpdatePermission {
        signee: w.signee.clone(),
        nonce: 1,
        target_sqlchain: c.id,
        target_user: c.miner.address,
        permission: 2,
    });
    assert_eq!(s.apply(&grant).unwrap_err(), StateError::AccountPermissionDeny);
}

#[test]
fn issue_keys_updates_known_miners_and_ignores_strangers() {
    let mut s = state();
    let c = provisioned_chain(&mut s);
    let stranger = actor();

    let tx = Transaction::IssueKeys(IssueKeys {
        signee: c.owner.signee.clone(),
        nonce: 2,
        target_sqlchain: c.id,
        miner_keys: vec![
            MinerKey {
                miner: c.miner.address,
                encryption_key: "k-miner".into(),
            },
            MinerKey {
                miner: stranger.address,
                encryption_key: "k-ghost".into(),
            },
        ],
    });
    s.apply(&tx).unwrap();

    let chain = s.load_sqlchain_object(c.id).unwrap();
    assert_eq!(chain.miners[0].encryption_key, "k-miner");
    assert_eq!(chain.miners.len(), 1);
}

#[test]
fn issue_keys_requires_an_admin() {
    let mut s = state();
    let c = provisioned_chain(&mut s);
    // Miners are not admins.
    let tx = Transaction::IssueKeys(IssueKeys {
        signee: c.miner.signee.clone(),
        nonce: 2,
        target_sqlchain: c.id,
        miner_keys: Vec::new(),
    });
    assert_eq!(s.apply(&tx).unwrap_err(), StateError::AccountPermissionDeny);
}

#[test]
fn legacy_billing_distributes_fees_and_rewards() {
    let mut s = state();
    let producer = actor();
    let r1 = actor();
    let r2 = actor();
    fund(&mut s, producer.address, 10, 0);
    fund(&mut s, r1.address, 1, 1);

    let tx = Transaction::Billing(Billing {
        producer: producer.address,
        nonce: 1,
        receivers: vec![r1.address, r2.address],
        fees: vec![3, 4],
        rewards: vec![30, 40],
    });
    s.apply(&tx).unwrap();

    // Fees land in Wave, rewards in Particle; r2 is created on the fly.
    assert_eq!(s.load_account_covenant_balance(r1.address), Some(4));
    assert_eq!(s.load_account_stable_balance(r1.address), Some(31));
    assert_eq!(s.load_account_covenant_balance(r2.address), Some(4));
    assert_eq!(s.load_account_stable_balance(r2.address), Some(40));
}
