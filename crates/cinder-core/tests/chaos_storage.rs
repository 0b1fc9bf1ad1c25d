//! Chaos property tests for Storage implementations
//!
//! With `ChaoticStorage` failing a random share of operations:
//! - Failed operations leave no partial effect behind
//! - A successful post is always listed afterwards
//! - Gateway errors from injected faults are storage errors, and listings
//!   that succeed never contain placeholders

use cinder_core::{
    ChaoticStorage, GatewayError, MemoryStorage, RedbStorage, Storage, StorageError, UserId,
};
use cinder_harness::{SimEnv, sim_gateway_with, test_keys};
use proptest::prelude::*;
use tempfile::tempdir;

const ALICE: UserId = UserId::new(1);

fn chaos_run<S: Storage>(
    inner: S,
    failure_rate: f64,
    seed: u64,
    posts: usize,
) -> Result<(), TestCaseError> {
    let env = SimEnv::with_seed(seed);
    let setup = sim_gateway_with(&env, inner.clone(), test_keys());
    let id = setup.create_conversation(ALICE, [], None).unwrap().id();

    let chaotic = ChaoticStorage::with_seed(inner.clone(), failure_rate, seed);
    let gateway = sim_gateway_with(&env, chaotic, test_keys());

    let mut posted = Vec::new();
    for i in 0..posts {
        let text = format!("message {i}");
        match gateway.post_message(id, ALICE, &text) {
            Ok(_) => posted.push(text),
            Err(GatewayError::Storage(StorageError::Io(_))) => {},
            Err(other) => return Err(TestCaseError::fail(format!("unexpected error: {other}"))),
        }
        env.advance_secs(1);
    }

    // ORACLE: exactly the acknowledged posts are stored, in order
    let stored = inner.load_messages(id).unwrap();
    prop_assert_eq!(stored.len(), posted.len());

    let listed = setup.list_messages(id, ALICE).unwrap();
    let texts: Vec<String> = listed.iter().map(|v| v.text().to_string()).collect();
    prop_assert_eq!(texts, posted);

    // Listing through chaos either fails as storage or is fully readable
    match gateway.list_messages(id, ALICE) {
        Ok(views) => prop_assert!(views.iter().all(|v| v.is_readable())),
        Err(err) => prop_assert!(matches!(err, GatewayError::Storage(_))),
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_memory_chaos_never_half_writes(
        failure_rate in 0.0..0.8,
        seed in any::<u64>(),
        posts in 1usize..30,
    ) {
        chaos_run(MemoryStorage::new(), failure_rate, seed, posts)?;
    }

    #[test]
    fn prop_redb_chaos_never_half_writes(
        failure_rate in 0.0..0.8,
        seed in any::<u64>(),
        posts in 1usize..10,
    ) {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("chaos.redb")).unwrap();
        chaos_run(storage, failure_rate, seed, posts)?;
    }

    #[test]
    fn prop_purge_under_chaos_is_all_or_nothing(
        failure_rate in 0.0..0.9,
        seed in any::<u64>(),
        posts in 1usize..10,
    ) {
        let env = SimEnv::with_seed(seed);
        let inner = MemoryStorage::new();
        let setup = sim_gateway_with(&env, inner.clone(), test_keys());
        let id = setup.create_conversation(ALICE, [], None).unwrap().id();
        for i in 0..posts {
            setup.post_message(id, ALICE, &format!("m{i}")).unwrap();
        }
        setup.arm_autodestruct(id, ALICE, 1).unwrap();
        env.advance_secs(60);

        let chaotic = sim_gateway_with(
            &env,
            ChaoticStorage::with_seed(inner.clone(), failure_rate, seed),
            test_keys(),
        );
        let _ = chaotic.list_messages(id, ALICE);

        // ORACLE: deadline present iff messages present
        let conversation = inner.load_conversation(id).unwrap().unwrap();
        let remaining = inner.load_messages(id).unwrap().len();
        prop_assert_eq!(conversation.autodestruct_at().is_some(), remaining == posts);
        prop_assert!(remaining == 0 || remaining == posts);
    }
}
