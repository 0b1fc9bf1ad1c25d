//! Property-based tests for envelope encryption
//!
//! These tests verify the invariants every stored message relies on:
//!
//! 1. **Round-trip**: open(seal(p, a), a) == p for all plaintexts and AADs
//! 2. **Context binding**: opening with any other AAD fails
//! 3. **Tamper detection**: one flipped bit in ciphertext, nonce or wrapped
//!    DEK always fails, never yields altered plaintext
//! 4. **Nonce uniqueness**: independent seeds do not repeat nonces

use std::collections::HashSet;

use cinder_crypto::{
    CryptoError, Envelope, EnvelopeSeed, Kek, KekId, KeyRing, NONCE_SIZE, open_envelope,
    seal_envelope,
};
use proptest::prelude::*;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn test_ring() -> KeyRing {
    KeyRing::single(KekId::new("kek-test").unwrap(), Kek::from_bytes([0x5a; 32]))
}

fn seeded(seed: u64) -> EnvelopeSeed {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    EnvelopeSeed::generate(|buf| rng.fill_bytes(buf))
}

fn seal(plaintext: &[u8], aad: &[u8], seed: u64) -> Envelope {
    seal_envelope(plaintext, aad, seeded(seed), &test_ring()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_seal_open_roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        aad in prop::collection::vec(any::<u8>(), 0..64),
        seed in any::<u64>(),
    ) {
        let envelope = seal(&plaintext, &aad, seed);
        let opened = open_envelope(&envelope, &aad, &test_ring()).unwrap();

        prop_assert_eq!(opened, plaintext);
    }

    #[test]
    fn prop_other_aad_never_opens(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
        aad in prop::collection::vec(any::<u8>(), 0..64),
        other in prop::collection::vec(any::<u8>(), 0..64),
        seed in any::<u64>(),
    ) {
        prop_assume!(aad != other);

        let envelope = seal(&plaintext, &aad, seed);
        let result = open_envelope(&envelope, &other, &test_ring());

        let is_decryption_error = matches!(result, Err(CryptoError::Decryption { .. }));
        prop_assert!(is_decryption_error);
    }

    #[test]
    fn prop_ciphertext_bit_flip_detected(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        seed in any::<u64>(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut envelope = seal(&plaintext, b"ctx", seed);
        let index = position.index(envelope.ciphertext.len());
        envelope.ciphertext[index] ^= 1 << bit;

        prop_assert!(open_envelope(&envelope, b"ctx", &test_ring()).is_err());
    }

    #[test]
    fn prop_nonce_bit_flip_detected(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
        seed in any::<u64>(),
        index in 0usize..NONCE_SIZE,
        bit in 0u8..8,
    ) {
        let mut envelope = seal(&plaintext, b"ctx", seed);
        envelope.nonce[index] ^= 1 << bit;

        prop_assert!(open_envelope(&envelope, b"ctx", &test_ring()).is_err());
    }

    #[test]
    fn prop_wrapped_dek_bit_flip_detected(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
        seed in any::<u64>(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut envelope = seal(&plaintext, b"ctx", seed);
        let index = position.index(envelope.wrapped_dek.len());
        envelope.wrapped_dek[index] ^= 1 << bit;

        prop_assert!(open_envelope(&envelope, b"ctx", &test_ring()).is_err());
    }

    #[test]
    fn prop_same_plaintext_different_ciphertext(
        plaintext in prop::collection::vec(any::<u8>(), 1..128),
        seed in any::<u64>(),
    ) {
        let first = seal(&plaintext, b"ctx", seed);
        let second = seal(&plaintext, b"ctx", seed.wrapping_add(1));

        prop_assert_ne!(first.ciphertext, second.ciphertext);
        prop_assert_ne!(first.wrapped_dek, second.wrapped_dek);
    }
}

#[test]
fn nonces_do_not_repeat_across_ten_thousand_envelopes() {
    // A 96-bit nonce collides within 10k draws with probability ~2^-70, so
    // any repeat here points at a broken seed pipeline.
    let keys = test_ring();
    let mut rng = ChaCha20Rng::seed_from_u64(0xC1DE_5EED);
    let mut nonces = HashSet::with_capacity(10_000);

    for i in 0..10_000u32 {
        let seed = EnvelopeSeed::generate(|buf| rng.fill_bytes(buf));
        let envelope = seal_envelope(&i.to_be_bytes(), b"ctx", seed, &keys).unwrap();
        assert!(nonces.insert(envelope.nonce), "nonce repeated at envelope {i}");
    }

    assert_eq!(nonces.len(), 10_000);
}
