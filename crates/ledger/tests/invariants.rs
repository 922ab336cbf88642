//! Property tests over the engine invariants: safe arithmetic boundaries,
//! transfer conservation, nonce monotonicity, replay determinism, commit
//! folding, and copy isolation.

mod support;

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use support::*;
use tide_ledger::{safe_add, safe_sub, Address, ArithError, MetaState, TokenType};

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct(
            ".proptest-regressions-arith"
        ))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn safe_add_fails_exactly_past_the_max(x in any::<u64>(), y in any::<u64>()) {
        let mut dst = x;
        match x.checked_add(y) {
            Some(v) => {
                prop_assert_eq!(safe_add(&mut dst, y), Ok(()));
                prop_assert_eq!(dst, v);
            }
            None => {
                prop_assert_eq!(safe_add(&mut dst, y), Err(ArithError::Overflow));
                prop_assert_eq!(dst, x, "destination untouched on failure");
            }
        }
    }

    #[test]
    fn safe_sub_fails_exactly_below_zero(x in any::<u64>(), y in any::<u64>()) {
        let mut dst = x;
        match x.checked_sub(y) {
            Some(v) => {
                prop_assert_eq!(safe_sub(&mut dst, y), Ok(()));
                prop_assert_eq!(dst, v);
            }
            None => {
                prop_assert_eq!(safe_sub(&mut dst, y), Err(ArithError::Underflow));
                prop_assert_eq!(dst, x, "destination untouched on failure");
            }
        }
    }
}

/// A plan of transfers among three funded actors plus a sink address.
fn transfer_plan() -> impl Strategy<Value = Vec<(usize, usize, u64)>> {
    proptest::collection::vec((0usize..3, 0usize..4, 0u64..500), 1..12)
}

fn snapshot(s: &MetaState, addrs: &[Address]) -> Vec<(Option<u64>, Option<u64>, Option<u64>)> {
    addrs
        .iter()
        .map(|a| {
            (
                s.load_account_stable_balance(*a),
                s.load_account_covenant_balance(*a),
                s.next_nonce(*a).ok(),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct(
            ".proptest-regressions-state"
        ))),
        cases: 48,
        .. ProptestConfig::default()
    })]

    #[test]
    fn transfers_conserve_the_token_supply(plan in transfer_plan()) {
        let mut s = state();
        let actors = [actor(), actor(), actor()];
        let sink = actor();
        let addrs: Vec<Address> = actors
            .iter()
            .map(|a| a.address)
            .chain([sink.address])
            .collect();
        for a in &actors {
            fund(&mut s, a.address, 1_000, 0);
        }

        let total_before: u64 = addrs
            .iter()
            .filter_map(|a| s.load_account_stable_balance(*a))
            .sum();

        let mut nonces = [1u64; 3];
        for (from, to, amount) in plan {
            let tx = transfer(&actors[from], addrs[to], amount, TokenType::Particle, nonces[from]);
            if s.apply(&tx).is_ok() {
                nonces[from] += 1;
            }
        }

        let total_after: u64 = addrs
            .iter()
            .filter_map(|a| s.load_account_stable_balance(*a))
            .sum();
        prop_assert_eq!(total_before, total_after);
    }

    #[test]
    fn replaying_a_sequence_is_deterministic(plan in transfer_plan()) {
        let mut s1 = state();
        let mut s2 = state();
        let actors = [actor(), actor(), actor()];
        let sink = actor();
        let addrs: Vec<Address> = actors
            .iter()
            .map(|a| a.address)
            .chain([sink.address])
            .collect();
        for a in &actors {
            fund(&mut s1, a.address, 1_000, 200);
            fund(&mut s2, a.address, 1_000, 200);
        }

        let mut nonces = [1u64; 3];
        for (from, to, amount) in plan {
            let token = if amount % 2 == 0 { TokenType::Particle } else { TokenType::Wave };
            let tx = transfer(&actors[from], addrs[to], amount, token, nonces[from]);
            let r1 = s1.apply(&tx);
            let r2 = s2.apply(&tx);
            prop_assert_eq!(&r1, &r2, "replicas must agree on acceptance");
            if r1.is_ok() {
                nonces[from] += 1;
            }
        }
        prop_assert_eq!(snapshot(&s1, &addrs), snapshot(&s2, &addrs));
    }

    #[test]
    fn nonce_moves_by_exactly_one_per_accepted_tx(plan in transfer_plan()) {
        let mut s = state();
        let actors = [actor(), actor(), actor()];
        let sink = actor();
        let addrs: Vec<Address> = actors
            .iter()
            .map(|a| a.address)
            .chain([sink.address])
            .collect();
        for a in &actors {
            fund(&mut s, a.address, 100, 0);
        }

        let mut expected = [1u64; 3];
        for (from, to, amount) in plan {
            // Half the time aim a deliberately wrong nonce at the gate.
            let bad = amount % 3 == 0;
            let nonce = if bad { expected[from] + 7 } else { expected[from] };
            let before = s.next_nonce(actors[from].address).unwrap();
            let outcome = s.apply(&transfer(&actors[from], addrs[to], amount, TokenType::Particle, nonce));
            let after = s.next_nonce(actors[from].address).unwrap();
            match outcome {
                Ok(()) => {
                    prop_assert_eq!(after, before + 1);
                    expected[from] += 1;
                }
                Err(_) => prop_assert_eq!(after, before),
            }
        }
    }

    #[test]
    fn commit_preserves_the_overlay_view(plan in transfer_plan()) {
        let mut s = state();
        let actors = [actor(), actor(), actor()];
        let sink = actor();
        let addrs: Vec<Address> = actors
            .iter()
            .map(|a| a.address)
            .chain([sink.address])
            .collect();
        for a in &actors {
            fund(&mut s, a.address, 1_000, 0);
        }

        let mut nonces = [1u64; 3];
        for (from, to, amount) in plan {
            if s
                .apply(&transfer(&actors[from], addrs[to], amount, TokenType::Particle, nonces[from]))
                .is_ok()
            {
                nonces[from] += 1;
            }
        }

        let before = snapshot(&s, &addrs);
        s.commit();
        prop_assert_eq!(&before, &snapshot(&s, &addrs));
        // Nothing left to discard: the fold reset the dirty layer.
        s.clean();
        prop_assert_eq!(&before, &snapshot(&s, &addrs));
    }

    #[test]
    fn speculative_copies_never_leak_back(plan in transfer_plan()) {
        let mut s = state();
        let actors = [actor(), actor(), actor()];
        let sink = actor();
        let addrs: Vec<Address> = actors
            .iter()
            .map(|a| a.address)
            .chain([sink.address])
            .collect();
        for a in &actors {
            fund(&mut s, a.address, 1_000, 0);
        }
        s.commit();

        let baseline = snapshot(&s, &addrs);
        let mut speculative = s.make_copy();
        let mut nonces = [1u64; 3];
        for (from, to, amount) in plan {
            if speculative
                .apply(&transfer(&actors[from], addrs[to], amount, TokenType::Particle, nonces[from]))
                .is_ok()
            {
                nonces[from] += 1;
            }
        }
        speculative.commit();
        prop_assert_eq!(baseline, snapshot(&s, &addrs));
    }
}
