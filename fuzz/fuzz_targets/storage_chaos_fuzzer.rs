//! Fuzz target for the gateway under storage failures
//!
//! Runs model operations against a gateway whose storage fails at a
//! fuzzer-chosen rate, with a healthy handle on the same data for checks.
//!
//! # Invariants
//!
//! - The gateway NEVER panics on storage errors
//! - A successful listing never contains an unreadable message
//! - A conversation never holds messages and an elapsed deadline after a
//!   successful read by a member
//! - A purge is all or nothing: a stored deadline is never cleared while
//!   messages posted before it remain

#![no_main]

use arbitrary::Arbitrary;
use cinder_core::{ChaoticStorage, Environment, MemoryStorage, Storage};
use cinder_harness::{Operation, OperationResult, RealWorld, SimEnv};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct ChaosScenario {
    /// Seed for the simulated environment
    seed: u64,
    /// Seed for ChaoticStorage RNG (deterministic failures)
    chaos_seed: u64,
    /// Failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    operations: Vec<Operation>,
}

fuzz_target!(|scenario: ChaosScenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;

    let healthy = MemoryStorage::new();
    let chaotic = ChaoticStorage::with_seed(healthy.clone(), failure_rate, scenario.chaos_seed);
    let Ok(real) = RealWorld::with_storage(SimEnv::with_seed(scenario.seed), chaotic) else {
        // Setup failures are expected under chaos
        return;
    };

    for op in scenario.operations.iter().take(256) {
        let before: Vec<_> = real
            .conversations()
            .iter()
            .map(|id| healthy.load_conversation(*id).unwrap().and_then(|c| c.autodestruct_at()))
            .collect();

        let result = real.apply(op);

        if let OperationResult::Listed(texts) = &result {
            assert!(texts.iter().all(|t| t != cinder_core::DECRYPTION_PLACEHOLDER));

            let (_, index) = op.target().unwrap();
            let id = real.conversations()[usize::from(index)];
            let stored = healthy.load_conversation(id).unwrap().unwrap();
            let now = real.env().now();
            assert!(stored.autodestruct_at().is_none_or(|deadline| deadline > now));
        }

        // All or nothing: a deadline that disappeared took its messages with
        // it. A post may store a fresh message right after purging.
        for (id, deadline_before) in real.conversations().iter().zip(before) {
            let after = healthy.load_conversation(*id).unwrap().unwrap().autodestruct_at();
            let was_cleared = deadline_before.is_some() && after.is_none();
            if was_cleared && !matches!(op, Operation::Post { .. }) {
                assert!(healthy.load_messages(*id).unwrap().is_empty());
            }
        }
    }
});
