// Privacy — hashing of external fan identifiers at the ingestion boundary.
//
// The core never handles a raw external identifier beyond this one write
// boundary (fan ingestion). HMAC-SHA256 with a per-agency secret salt means
// the hash can't be reversed or rainbow-tabled without the salt, but re-runs
// of the same import are still idempotent (same id -> same hash).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hash an external fan identifier with the agency's secret salt.
///
/// Panics only if `salt` is empty (a configuration bug, not a runtime
/// condition) — callers are expected to validate config before ingestion.
pub fn hash_external_id(external_id: &str, salt: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC accepts keys of any length");
    mac.update(external_id.as_bytes());
    let result = mac.finalize().into_bytes();
    hex::encode(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_and_salt_produce_same_hash() {
        let a = hash_external_id("fan_42", b"agency-salt");
        let b = hash_external_id("fan_42", b"agency-salt");
        assert_eq!(a, b);
    }

    #[test]
    fn different_salts_produce_different_hashes() {
        let a = hash_external_id("fan_42", b"salt_one");
        let b = hash_external_id("fan_42", b"salt_two");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_never_contains_the_raw_identifier() {
        let hash = hash_external_id("plaintext_id_123", b"agency-salt");
        assert!(!hash.contains("plaintext_id_123"));
        assert_eq!(hash.len(), 64); // hex-encoded SHA-256 digest
    }
}
