// Cryptographic utilities: Ed25519 transaction signing, JCS canonicalization, SHA-256 hashing

use crate::core::errors::CryptoError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use der::Decode;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use pkcs8::PrivateKeyInfo;
use rand::rngs::OsRng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Signs ledger transactions with an Ed25519 key
pub struct LedgerSigner {
    signing_key: SigningKey,
}

impl LedgerSigner {
    /// Create a signer from an existing key
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Create a signer with a freshly generated key
    ///
    /// Signatures made with an ephemeral key cannot be verified after a restart.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Load a PKCS8-encoded Ed25519 private key from a PEM file
    pub fn from_pem_file(path: &Path) -> Result<Self, CryptoError> {
        let pem_bytes = fs::read(path)
            .map_err(|e| CryptoError::KeyLoadError(format!("Failed to read key file: {}", e)))?;

        let pem_str = std::str::from_utf8(&pem_bytes)
            .map_err(|e| CryptoError::KeyLoadError(format!("Invalid PEM encoding: {}", e)))?;

        let pem = pem::parse(pem_str)
            .map_err(|e| CryptoError::KeyLoadError(format!("Failed to parse PEM: {}", e)))?;

        let pkcs8_key = PrivateKeyInfo::from_der(pem.contents())
            .map_err(|e| CryptoError::KeyLoadError(format!("Failed to parse PKCS8 DER: {}", e)))?;

        // RFC 8410 wraps the 32-byte seed in an inner OCTET STRING (0x04 0x20)
        let key_bytes = match pkcs8_key.private_key {
            [0x04, 0x20, rest @ ..] if rest.len() == 32 => rest,
            raw if raw.len() == 32 => raw,
            raw => {
                return Err(CryptoError::KeyLoadError(format!(
                    "Invalid Ed25519 key length: expected 32 bytes, got {}",
                    raw.len()
                )))
            }
        };

        let mut key_array = [0u8; 32];
        key_array.copy_from_slice(key_bytes);

        Ok(Self {
            signing_key: SigningKey::from_bytes(&key_array),
        })
    }

    /// Sign the canonical form of `payload`, returning a base64url signature
    pub fn sign(&self, payload: &Value) -> Result<String, CryptoError> {
        let message = canonicalize(payload)?;
        let signature = self.signing_key.sign(&message);
        Ok(URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    /// Check a signature produced by [`LedgerSigner::sign`]
    pub fn verify(&self, payload: &Value, signature_b64: &str) -> Result<(), CryptoError> {
        let message = canonicalize(payload)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| CryptoError::VerificationError(format!("Invalid base64: {}", e)))?;
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| CryptoError::VerificationError(e.to_string()))?;

        self.signing_key
            .verifying_key()
            .verify(&message, &signature)
            .map_err(|e| CryptoError::VerificationError(e.to_string()))
    }

    /// Hex-encoded public key
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }
}

/// Canonicalize JSON according to RFC 8785 (JCS)
pub fn canonicalize(data: &Value) -> Result<Vec<u8>, CryptoError> {
    serde_jcs::to_vec(data)
        .map_err(|e| CryptoError::CanonicalizationError(format!("Serialization error: {}", e)))
}

/// Hex-encoded SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_sorts_keys() {
        let a = canonicalize(&json!({"b": 1, "a": {"d": 2, "c": 3}})).unwrap();
        assert_eq!(String::from_utf8(a).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = LedgerSigner::generate();
        let payload = json!({"transaction_id": "tx-1", "user_id": 4});
        let signature = signer.sign(&payload).unwrap();

        assert!(signer.verify(&payload, &signature).is_ok());
        assert!(signer.verify(&json!({"transaction_id": "tx-1", "user_id": 5}), &signature).is_err());
        assert!(signer.verify(&payload, "not-base64!").is_err());
    }

    #[test]
    fn test_signature_independent_of_key_order() {
        let signer = LedgerSigner::generate();
        let sig = signer.sign(&json!({"a": 1, "b": 2})).unwrap();
        assert!(signer.verify(&json!({"b": 2, "a": 1}), &sig).is_ok());
    }

    #[test]
    fn test_from_pem_file_missing() {
        let result = LedgerSigner::from_pem_file(Path::new("/nonexistent/ledger.pem"));
        assert!(matches!(result, Err(CryptoError::KeyLoadError(_))));
    }
}
