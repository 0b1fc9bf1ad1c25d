//! Fuzz target for envelope opening
//!
//! Feeds hostile envelopes to `open_envelope`: fully arbitrary records, and
//! genuine envelopes with one field corrupted.
//!
//! # Invariants
//!
//! - `open_envelope` NEVER panics
//! - Arbitrary records never open
//! - A corrupted genuine envelope never opens, and never yields partial
//!   plaintext
//! - The untouched genuine envelope always opens to the original plaintext

#![no_main]

use arbitrary::Arbitrary;
use cinder_crypto::{
    ALGORITHM, Envelope, EnvelopeSeed, KeyRing, NONCE_SIZE, open_envelope, seal_envelope,
};
use cinder_harness::test_keys;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Input {
    /// Record built entirely from fuzzer bytes
    Raw {
        alg_is_supported: bool,
        ciphertext: Vec<u8>,
        nonce: [u8; NONCE_SIZE],
        wrapped_dek: Vec<u8>,
        kek_id: String,
        aad: Vec<u8>,
    },
    /// Genuine envelope with one corruption applied
    Tampered { seed: [u8; 44], plaintext: Vec<u8>, aad: Vec<u8>, corruption: Corruption },
}

#[derive(Debug, Arbitrary)]
enum Corruption {
    FlipCiphertext { index: u16, mask: u8 },
    FlipNonce { index: u8, mask: u8 },
    FlipWrappedDek { index: u8, mask: u8 },
    TruncateCiphertext { len: u16 },
    OtherAad { aad: Vec<u8> },
    RenameKek { kek_id: String },
    None,
}

fn flip(bytes: &mut [u8], index: usize, mask: u8) -> bool {
    if bytes.is_empty() || mask == 0 {
        return false;
    }
    let len = bytes.len();
    bytes[index % len] ^= mask;
    true
}

fuzz_target!(|input: Input| {
    let keys: KeyRing = test_keys();

    match input {
        Input::Raw { alg_is_supported, ciphertext, nonce, wrapped_dek, kek_id, aad } => {
            let envelope = Envelope {
                alg: if alg_is_supported { ALGORITHM.to_string() } else { "none".to_string() },
                ciphertext,
                nonce,
                aad: aad.clone(),
                wrapped_dek,
                kek_id,
            };
            assert!(open_envelope(&envelope, &aad, &keys).is_err());
        },
        Input::Tampered { seed, plaintext, aad, corruption } => {
            let mut offset = 0;
            let seed = EnvelopeSeed::generate(|buf| {
                for byte in buf.iter_mut() {
                    *byte = seed[offset % seed.len()];
                    offset += 1;
                }
            });
            let Ok(mut envelope) = seal_envelope(&plaintext, &aad, seed, &keys) else {
                return;
            };

            let mut open_aad = aad.clone();
            let tampered = match corruption {
                Corruption::FlipCiphertext { index, mask } => {
                    flip(&mut envelope.ciphertext, usize::from(index), mask)
                },
                Corruption::FlipNonce { index, mask } => {
                    flip(&mut envelope.nonce, usize::from(index), mask)
                },
                Corruption::FlipWrappedDek { index, mask } => {
                    flip(&mut envelope.wrapped_dek, usize::from(index), mask)
                },
                Corruption::TruncateCiphertext { len } => {
                    let len = usize::from(len);
                    let shorter = len < envelope.ciphertext.len();
                    envelope.ciphertext.truncate(len);
                    shorter
                },
                Corruption::OtherAad { aad: other } => {
                    let differs = other != open_aad;
                    open_aad = other;
                    differs
                },
                Corruption::RenameKek { kek_id } => {
                    let differs = kek_id != envelope.kek_id;
                    envelope.kek_id = kek_id;
                    differs
                },
                Corruption::None => false,
            };

            let opened = open_envelope(&envelope, &open_aad, &keys);
            if tampered {
                assert!(opened.is_err(), "tampered envelope opened");
            } else {
                assert_eq!(opened.ok(), Some(plaintext));
            }
        },
    }
});
