//! Key rings and gateways wired for tests.

use cinder_core::{ConversationGateway, MemoryStorage, Storage};
use cinder_crypto::{Kek, KekId, KeyRing};

use crate::sim_env::SimEnv;

/// Identifier of the fixed test KEK.
pub const TEST_KEK_ID: &str = "kek-test";

/// Hex form of the fixed test KEK (bytes 0x00..=0x1f).
pub const TEST_KEK_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// Identifier of the KEK that replaces [`TEST_KEK_ID`] in [`rotated_keys`].
pub const NEXT_KEK_ID: &str = "kek-next";

/// Gateway over the simulated environment.
pub type SimGateway<S = MemoryStorage> = ConversationGateway<SimEnv, S, KeyRing>;

/// Key ring holding only the test KEK.
///
/// # Panics
///
/// Never in practice; the identifier and key are constants.
#[allow(clippy::expect_used)]
pub fn test_keys() -> KeyRing {
    KeyRing::single(KekId::new(TEST_KEK_ID).expect("constant id is valid"), test_kek())
}

/// Key ring after one rotation: a new active KEK, the test KEK retired.
///
/// # Panics
///
/// Never in practice; the identifiers and keys are constants.
#[allow(clippy::expect_used)]
pub fn rotated_keys() -> KeyRing {
    let next = KekId::new(NEXT_KEK_ID).expect("constant id is valid");
    let retired = KekId::new(TEST_KEK_ID).expect("constant id is valid");

    KeyRing::single(next, Kek::from_bytes([0xA5; 32]))
        .with_retired(retired, test_kek())
        .expect("identifiers are distinct")
}

/// Key ring holding an unrelated KEK under the test identifier. Envelopes
/// sealed with [`test_keys`] fail to unwrap under it.
///
/// # Panics
///
/// Never in practice; the identifier is a constant.
#[allow(clippy::expect_used)]
pub fn impostor_keys() -> KeyRing {
    let id = KekId::new(TEST_KEK_ID).expect("constant id is valid");
    KeyRing::single(id, Kek::from_bytes([0xEE; 32]))
}

/// In-memory gateway sharing `env`'s clock and RNG.
pub fn sim_gateway(env: &SimEnv) -> SimGateway {
    sim_gateway_with(env, MemoryStorage::new(), test_keys())
}

/// Gateway over any storage and key ring, sharing `env`.
pub fn sim_gateway_with<S: Storage>(env: &SimEnv, storage: S, keys: KeyRing) -> SimGateway<S> {
    ConversationGateway::new(env.clone(), storage, keys)
}

fn test_kek() -> Kek {
    let mut bytes = [0u8; 32];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = i as u8;
    }
    Kek::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use cinder_crypto::KeyProvider;

    use super::*;

    #[test]
    fn hex_constant_matches_test_kek() {
        let from_hex = Kek::from_hex(TEST_KEK_HEX).unwrap();
        let ring = KeyRing::single(KekId::new("a").unwrap(), from_hex);
        let direct = KeyRing::single(KekId::new("a").unwrap(), test_kek());

        // Equal keys wrap identically (AES-KW is deterministic)
        let env = SimEnv::new();
        let cipher_a = cinder_core::EnvelopeCipher::new(ring);
        let envelope = cipher_a.encrypt(b"x", b"aad", &env).unwrap();
        let cipher_b = cinder_core::EnvelopeCipher::new(direct);
        assert_eq!(cipher_b.decrypt(&envelope, b"aad").unwrap(), b"x");
    }

    #[test]
    fn rotated_ring_still_resolves_retired_kek() {
        let keys = rotated_keys();

        assert_eq!(keys.current_id().as_str(), NEXT_KEK_ID);
        assert!(keys.kek(TEST_KEK_ID).is_ok());
        assert_eq!(keys.len(), 2);
    }
}
