// PBKDF2-HMAC-SHA256 password hashing

use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use subtle::ConstantTimeEq;

const METHOD: &str = "pbkdf2";
const DIGEST: &str = "sha256";
const SALT_LENGTH: usize = 16;
const KEY_LENGTH: usize = 32;

/// Work factor for newly stored hashes
pub const DEFAULT_ITERATIONS: u32 = 260_000;

/// Stored password hash in the form `pbkdf2:sha256:<iterations>$<salt>$<key hex>`
///
/// The iteration count travels with the hash, so raising `DEFAULT_ITERATIONS`
/// leaves existing hashes verifiable. The layout matches werkzeug's
/// `generate_password_hash`, so accounts imported from it keep working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a plaintext password with a fresh salt and the default work factor
    pub fn generate(password: &Secret<String>) -> Self {
        Self::generate_with_iterations(password, DEFAULT_ITERATIONS)
    }

    pub fn generate_with_iterations(password: &Secret<String>, iterations: u32) -> Self {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_LENGTH)
            .map(char::from)
            .collect();
        Self::with_salt(password, &salt, iterations.max(1))
    }

    fn with_salt(password: &Secret<String>, salt: &str, iterations: u32) -> Self {
        let key = derive(password.expose_secret(), salt, iterations);
        Self(format!(
            "{}:{}:{}${}${}",
            METHOD,
            DIGEST,
            iterations,
            salt,
            hex::encode(key)
        ))
    }

    /// Wrap a value read from storage
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iteration count recorded in the hash, `None` when malformed
    pub fn iterations(&self) -> Option<u32> {
        let (method, _, _) = self.parts()?;
        let mut fields = method.split(':');
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(METHOD), Some(DIGEST), Some(iterations), None) => {
                iterations.parse::<u32>().ok().filter(|n| *n > 0)
            }
            _ => None,
        }
    }

    /// Constant-time check of `password` against this hash
    ///
    /// Malformed stored values never verify.
    pub fn verify(&self, password: &Secret<String>) -> bool {
        let (Some(iterations), Some((_, salt, key_hex))) = (self.iterations(), self.parts()) else {
            return false;
        };
        let Ok(expected) = hex::decode(key_hex) else {
            return false;
        };
        if expected.len() != KEY_LENGTH {
            return false;
        }

        let actual = derive(password.expose_secret(), salt, iterations);
        actual.as_slice().ct_eq(expected.as_slice()).into()
    }

    fn parts(&self) -> Option<(&str, &str, &str)> {
        let mut parts = self.0.splitn(3, '$');
        Some((parts.next()?, parts.next()?, parts.next()?))
    }
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Secret<String> {
        Secret::new(s.to_string())
    }

    #[test]
    fn test_verify_correct_password() {
        let hash = PasswordHash::generate_with_iterations(&secret("s3cret!"), 1_000);
        assert!(hash.verify(&secret("s3cret!")));
        assert!(!hash.verify(&secret("S3cret!")));
    }

    #[test]
    fn test_salts_differ() {
        let a = PasswordHash::generate_with_iterations(&secret("same"), 1_000);
        let b = PasswordHash::generate_with_iterations(&secret("same"), 1_000);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_records_work_factor() {
        let hash = PasswordHash::generate(&secret("pw"));
        assert!(hash.as_str().starts_with("pbkdf2:sha256:260000$"));
        assert_eq!(hash.iterations(), Some(DEFAULT_ITERATIONS));

        let parts: Vec<&str> = hash.as_str().split('$').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), SALT_LENGTH);
        assert_eq!(parts[2].len(), KEY_LENGTH * 2);
    }

    #[test]
    fn test_verify_uses_stored_iterations() {
        let hash = PasswordHash::with_salt(&secret("pw"), "fixedsalt", 2_000);
        assert_eq!(hash.iterations(), Some(2_000));
        assert!(hash.verify(&secret("pw")));

        // Same key under a different count must not verify
        let relabelled = hash.as_str().replacen(":2000$", ":2001$", 1);
        assert!(!PasswordHash::from_stored(relabelled).verify(&secret("pw")));
    }

    #[test]
    fn test_known_vector() {
        // PBKDF2-HMAC-SHA256("password", "salt", 1, 32)
        let hash = PasswordHash::with_salt(&secret("password"), "salt", 1);
        assert_eq!(
            hash.as_str(),
            "pbkdf2:sha256:1$salt$120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        for stored in [
            "",
            "sha256$00$00",
            "pbkdf2:sha256:0$salt$00",
            "pbkdf2:md5:1000$salt$00",
            "pbkdf2:sha256:260000$hash$admin",
        ] {
            assert!(!PasswordHash::from_stored(stored).verify(&secret("admin")));
        }
    }
}
