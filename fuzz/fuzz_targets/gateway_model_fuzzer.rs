//! Fuzz target comparing the gateway against the reference model
//!
//! # Invariants
//!
//! - Every operation returns the same result from `RealWorld` and
//!   `ModelWorld`, including the error kind
//! - After the run, stored deadlines and message counts agree with the model

#![no_main]

use arbitrary::Arbitrary;
use cinder_core::{Environment, Storage};
use cinder_harness::{ModelWorld, Operation, RealWorld};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    operations: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let real = RealWorld::new(scenario.seed);
    let mut model = ModelWorld::new(real.env().now());

    for (i, op) in scenario.operations.iter().take(256).enumerate() {
        let expected = model.apply(op);
        let actual = real.apply(op);
        assert_eq!(expected, actual, "divergence at operation {i}: {op:?}");
    }

    for (index, id) in real.conversations().iter().enumerate() {
        let index = index as u8;
        let stored = real.gateway().storage().load_conversation(*id).unwrap().unwrap();
        assert_eq!(stored.autodestruct_at(), model.deadline(index));
        assert_eq!(
            real.gateway().storage().load_messages(*id).unwrap().len(),
            model.stored_messages(index)
        );
    }
});
