//! Password hashing.
//!
//! New passwords are hashed with Argon2id and stored as PHC strings. Rows
//! created before that carry either an unsalted SHA-256 hex digest or a bcrypt
//! hash; both still verify and are converted to Argon2id the next time their
//! owner logs in successfully.

use crate::common::{MoodFitError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length of a hex-encoded SHA-256 digest.
pub const LEGACY_DIGEST_LEN: usize = 64;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    LegacyDigest,
    Bcrypt,
    SaltedAdaptive,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::LegacyDigest => "legacy-digest",
            HashAlgorithm::Bcrypt => "bcrypt",
            HashAlgorithm::SaltedAdaptive => "salted-adaptive-hash",
        }
    }

    /// Best guess for an untagged stored hash.
    pub fn detect(stored_hash: &str) -> Self {
        if stored_hash.len() == LEGACY_DIGEST_LEN && stored_hash.chars().all(|c| c.is_ascii_hexdigit()) {
            HashAlgorithm::LegacyDigest
        } else if BCRYPT_PREFIXES.iter().any(|prefix| stored_hash.starts_with(prefix)) {
            HashAlgorithm::Bcrypt
        } else {
            HashAlgorithm::SaltedAdaptive
        }
    }

    /// Whether rows under this tag get rehashed with Argon2id at next login.
    pub fn needs_upgrade(&self) -> bool {
        *self != HashAlgorithm::SaltedAdaptive
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = MoodFitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "legacy-digest" => Ok(HashAlgorithm::LegacyDigest),
            "bcrypt" => Ok(HashAlgorithm::Bcrypt),
            "salted-adaptive-hash" => Ok(HashAlgorithm::SaltedAdaptive),
            other => Err(MoodFitError::Storage(format!("unknown hash algorithm tag '{}'", other))),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| MoodFitError::Other(anyhow::anyhow!("Failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

pub fn legacy_digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Check `password` against `stored_hash` under `algorithm`. Malformed hashes never verify.
pub fn verify_password(password: &str, stored_hash: &str, algorithm: HashAlgorithm) -> bool {
    match algorithm {
        HashAlgorithm::SaltedAdaptive => match PasswordHash::new(stored_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!("Stored password hash is not a PHC string: {}", e);
                false
            }
        },
        HashAlgorithm::Bcrypt => match bcrypt::verify(password, stored_hash) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!("Stored bcrypt hash is malformed: {}", e);
                false
            }
        },
        HashAlgorithm::LegacyDigest => legacy_digest(password).eq_ignore_ascii_case(stored_hash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_hashes_verify_and_are_salted() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2"));
        assert!(verify_password("hunter22", &first, HashAlgorithm::SaltedAdaptive));
        assert!(!verify_password("hunter23", &first, HashAlgorithm::SaltedAdaptive));
    }

    #[test]
    fn legacy_digest_is_sha256_hex() {
        assert_eq!(
            legacy_digest("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
        let stored = legacy_digest("letmein");
        assert!(verify_password("letmein", &stored, HashAlgorithm::LegacyDigest));
        assert!(!verify_password("letmein!", &stored, HashAlgorithm::LegacyDigest));
    }

    #[test]
    fn bcrypt_hashes_still_verify() {
        let stored = bcrypt::hash("hunter2", 4).unwrap();

        assert_eq!(HashAlgorithm::detect(&stored), HashAlgorithm::Bcrypt);
        assert!(verify_password("hunter2", &stored, HashAlgorithm::Bcrypt));
        assert!(!verify_password("hunter3", &stored, HashAlgorithm::Bcrypt));
        assert!(!verify_password("hunter2", &stored, HashAlgorithm::SaltedAdaptive));
        assert!(HashAlgorithm::Bcrypt.needs_upgrade());
        assert!(!HashAlgorithm::SaltedAdaptive.needs_upgrade());
    }

    #[test]
    fn algorithm_mismatch_never_verifies() {
        let digest = legacy_digest("secret");
        assert!(!verify_password("secret", &digest, HashAlgorithm::SaltedAdaptive));
    }

    #[test]
    fn detects_untagged_hashes() {
        assert_eq!(HashAlgorithm::detect(&legacy_digest("x")), HashAlgorithm::LegacyDigest);
        assert_eq!(HashAlgorithm::detect(&hash_password("x").unwrap()), HashAlgorithm::SaltedAdaptive);
        assert_eq!(HashAlgorithm::detect(&"z".repeat(64)), HashAlgorithm::SaltedAdaptive);
        for prefix in ["$2a$", "$2b$", "$2y$"] {
            let stored = format!("{prefix}12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW");
            assert_eq!(HashAlgorithm::detect(&stored), HashAlgorithm::Bcrypt);
        }
    }

    #[test]
    fn tags_round_trip_through_strings() {
        for algorithm in [HashAlgorithm::LegacyDigest, HashAlgorithm::Bcrypt, HashAlgorithm::SaltedAdaptive] {
            assert_eq!(algorithm.as_str().parse::<HashAlgorithm>().unwrap(), algorithm);
        }
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }
}
