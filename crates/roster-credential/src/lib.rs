//! Roster Credential Manager
//!
//! One-way transformation of plaintext passwords into storable hash+salt
//! pairs, and verification of a candidate password against a stored pair.
//! PBKDF2-HMAC-SHA512 with a fresh 16-byte salt per derivation; both hash
//! and salt are stored as lowercase hex strings.
//!
//! Purely CPU-bound: no I/O, no shared state, safe to call from any task.

use pbkdf2::pbkdf2_hmac;
use rand_core::{OsRng, RngCore};
use sha2::Sha512;
use thiserror::Error;

/// Random salt length in raw bytes (32 hex chars on the wire).
const SALT_BYTES: usize = 16;

/// Derived hash length in raw bytes (128 hex chars on the wire).
const HASH_BYTES: usize = 64;

/// Default PBKDF2 iteration count, following current OWASP guidance for
/// PBKDF2-HMAC-SHA512. Stores derived under a different count verify via
/// `with_iterations`.
pub const DEFAULT_ITERATIONS: u32 = 210_000;

/// A stored password credential: the derived hash and the per-credential
/// salt, both hex-encoded. Never contains the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub hash: String,
    pub salt: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The stored credential is missing or corrupt — a data-integrity bug,
    /// never a normal authentication outcome.
    #[error("stored credential is malformed: {0}")]
    InvalidFormat(&'static str),
}

/// Derives and verifies password credentials. Holds only the iteration
/// count; all operations are pure functions of their inputs plus the salt
/// randomness in `derive`.
#[derive(Debug, Clone, Copy)]
pub struct CredentialManager {
    iterations: u32,
}

impl Default for CredentialManager {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl CredentialManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct with an explicit iteration count. Intended for tests and
    /// for operators migrating stores derived under a different count.
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Derive a fresh credential for `password`. A new random salt is drawn
    /// on every call, so two derivations of the same password produce
    /// different credentials.
    ///
    /// Length bounds on the password are the caller's job; this accepts any
    /// string.
    pub fn derive(&self, password: &str) -> Credential {
        let mut salt_bytes = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut salt_bytes);
        let salt = hex::encode(salt_bytes);

        let hash = self.derive_with_salt(password, &salt);
        Credential { hash, salt }
    }

    /// Check `password` against a stored credential.
    ///
    /// A mismatch is `Ok(false)` — only a malformed stored credential is an
    /// error. The comparison is constant-time in the hash bytes.
    pub fn verify(
        &self,
        password: &str,
        credential: &Credential,
    ) -> Result<bool, CredentialError> {
        if credential.salt.is_empty() || hex::decode(&credential.salt).is_err() {
            return Err(CredentialError::InvalidFormat("salt is not valid hex"));
        }
        let stored = hex::decode(&credential.hash)
            .map_err(|_| CredentialError::InvalidFormat("hash is not valid hex"))?;
        if stored.len() != HASH_BYTES {
            return Err(CredentialError::InvalidFormat("hash has wrong length"));
        }

        let mut candidate = [0u8; HASH_BYTES];
        self.derive_into(password, &credential.salt, &mut candidate);

        Ok(constant_time_eq(&candidate, &stored))
    }

    fn derive_with_salt(&self, password: &str, salt: &str) -> String {
        let mut out = [0u8; HASH_BYTES];
        self.derive_into(password, salt, &mut out);
        hex::encode(out)
    }

    // The hex-encoded salt string, not its decoded bytes, is the KDF salt
    // input. Changing this invalidates every stored credential.
    fn derive_into(&self, password: &str, salt: &str, out: &mut [u8; HASH_BYTES]) {
        pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), self.iterations, out);
    }
}

/// Constant-time byte comparison to prevent timing side channels.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // Full-strength derivation is deliberately slow; tests run reduced.
    fn manager() -> CredentialManager {
        CredentialManager::with_iterations(1_000)
    }

    #[test]
    fn derive_is_deterministic_for_fixed_salt() {
        let m = manager();
        let a = m.derive_with_salt("hunter22", "00112233445566778899aabbccddeeff");
        let b = m.derive_with_salt("hunter22", "00112233445566778899aabbccddeeff");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_BYTES * 2);
    }

    #[test]
    fn fresh_salt_on_every_derive() {
        let m = manager();
        let first = m.derive("same password");
        let second = m.derive("same password");
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
        assert_eq!(first.salt.len(), SALT_BYTES * 2);
    }

    #[test]
    fn roundtrip_verifies() {
        let m = manager();
        let cred = m.derive("correct horse battery staple");
        assert_eq!(m.verify("correct horse battery staple", &cred), Ok(true));
    }

    #[test]
    fn wrong_password_is_false_not_error() {
        let m = manager();
        let cred = m.derive("first password");
        assert_eq!(m.verify("second password", &cred), Ok(false));
    }

    #[test]
    fn login_scenario() {
        let m = manager();
        let cred = m.derive("Sup3rSecret!");
        assert_eq!(m.verify("wrongpass", &cred), Ok(false));
        assert_eq!(m.verify("Sup3rSecret!", &cred), Ok(true));
    }

    #[test]
    fn iteration_count_changes_hash() {
        let fast = CredentialManager::with_iterations(1_000);
        let slow = CredentialManager::with_iterations(2_000);
        let salt = "00112233445566778899aabbccddeeff";
        assert_ne!(
            fast.derive_with_salt("pw", salt),
            slow.derive_with_salt("pw", salt)
        );
    }

    #[test]
    fn malformed_salt_is_invalid_format() {
        let m = manager();
        let cred = Credential {
            hash: hex::encode([0u8; HASH_BYTES]),
            salt: "not hex at all".into(),
        };
        assert!(matches!(
            m.verify("anything", &cred),
            Err(CredentialError::InvalidFormat(_))
        ));
    }

    #[test]
    fn malformed_hash_is_invalid_format() {
        let m = manager();
        let good = m.derive("pw");

        let bad_hex = Credential {
            hash: "zz".into(),
            salt: good.salt.clone(),
        };
        assert!(matches!(
            m.verify("pw", &bad_hex),
            Err(CredentialError::InvalidFormat(_))
        ));

        let truncated = Credential {
            hash: good.hash[..32].to_string(),
            salt: good.salt,
        };
        assert!(matches!(
            m.verify("pw", &truncated),
            Err(CredentialError::InvalidFormat(_))
        ));
    }

    #[test]
    fn empty_credential_is_invalid_format() {
        let m = manager();
        let cred = Credential {
            hash: String::new(),
            salt: String::new(),
        };
        assert!(matches!(
            m.verify("pw", &cred),
            Err(CredentialError::InvalidFormat(_))
        ));
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
