// Ledger blocks and signed transactions

use crate::core::crypto::{canonicalize, sha256_hex, LedgerSigner};
use crate::core::errors::{CryptoError, QhseError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A mined block
///
/// `hash = sha256(index || timestamp || jcs(data) || previous_hash || nonce)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub index: i64,
    /// Unix seconds with fractional part
    pub timestamp: f64,
    pub data: Value,
    pub previous_hash: String,
    pub nonce: i64,
    pub hash: String,
}

impl Block {
    /// Build an unmined block
    pub fn new(index: i64, timestamp: f64, data: Value, previous_hash: impl Into<String>) -> Self {
        Self {
            index,
            timestamp,
            data,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
        }
    }

    fn hash_with(&self, canonical_data: &str, nonce: i64) -> String {
        let preimage = format!(
            "{}{}{}{}{}",
            self.index, self.timestamp, canonical_data, self.previous_hash, nonce
        );
        sha256_hex(preimage.as_bytes())
    }

    pub fn calculate_hash(&self) -> Result<String, CryptoError> {
        let canonical = canonical_string(&self.data)?;
        Ok(self.hash_with(&canonical, self.nonce))
    }

    /// Increment the nonce until the hash starts with `difficulty` zeros
    ///
    /// CPU-bound; call from a blocking thread.
    pub fn mine(&mut self, difficulty: usize) -> Result<(), CryptoError> {
        let canonical = canonical_string(&self.data)?;
        let target = "0".repeat(difficulty);
        let mut nonce = self.nonce;
        let mut hash = self.hash_with(&canonical, nonce);
        while !hash.starts_with(&target) {
            nonce += 1;
            hash = self.hash_with(&canonical, nonce);
        }
        self.nonce = nonce;
        self.hash = hash;
        Ok(())
    }

    /// Number of transactions recorded in the block payload
    pub fn transaction_count(&self) -> i64 {
        self.data
            .get("transaction_count")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }
}

fn canonical_string(data: &Value) -> Result<String, CryptoError> {
    let bytes = canonicalize(data)?;
    String::from_utf8(bytes).map_err(|e| CryptoError::CanonicalizationError(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Certificate,
    Audit,
    Incident,
    Compliance,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Certificate => "certificate",
            TransactionType::Audit => "audit",
            TransactionType::Incident => "incident",
            TransactionType::Compliance => "compliance",
        }
    }

    /// Payload fields each transaction type must carry
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            TransactionType::Certificate => &["certificate_type", "issued_at", "expires_at"],
            TransactionType::Audit => &["auditor_id", "auditee_id", "audit_type", "results"],
            TransactionType::Incident => &["incident_id", "severity_level", "description"],
            TransactionType::Compliance => &["compliance_type", "status", "requirements"],
        }
    }
}

impl FromStr for TransactionType {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "certificate" => Ok(TransactionType::Certificate),
            "audit" => Ok(TransactionType::Audit),
            "incident" => Ok(TransactionType::Incident),
            "compliance" => Ok(TransactionType::Compliance),
            other => Err(QhseError::Validation(format!("Unknown transaction type '{}'", other))),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    pub user_id: i64,
    pub data: Value,
    pub timestamp: f64,
    #[serde(default)]
    pub signature: String,
}

impl Transaction {
    pub fn new(transaction_type: TransactionType, user_id: i64, data: Value, timestamp: f64) -> Self {
        Self {
            transaction_id: uuid::Uuid::new_v4().to_string(),
            transaction_type,
            user_id,
            data,
            timestamp,
            signature: String::new(),
        }
    }

    /// The fields covered by the signature
    pub fn unsigned_payload(&self) -> Value {
        serde_json::json!({
            "transaction_id": self.transaction_id,
            "transaction_type": self.transaction_type,
            "user_id": self.user_id,
            "data": self.data,
            "timestamp": self.timestamp,
        })
    }

    pub fn validate(&self) -> Result<(), QhseError> {
        if self.transaction_id.is_empty() {
            return Err(QhseError::Validation("transaction_id is required".to_string()));
        }
        if self.user_id <= 0 {
            return Err(QhseError::Validation("user_id must be positive".to_string()));
        }
        let missing: Vec<&str> = self
            .transaction_type
            .required_fields()
            .iter()
            .filter(|field| self.data.get(**field).is_none())
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(QhseError::Validation(format!(
                "{} transaction missing fields: {}",
                self.transaction_type,
                missing.join(", ")
            )));
        }
        Ok(())
    }

    pub fn sign(&mut self, signer: &LedgerSigner) -> Result<(), CryptoError> {
        self.signature = signer.sign(&self.unsigned_payload())?;
        Ok(())
    }

    pub fn verify(&self, signer: &LedgerSigner) -> Result<(), CryptoError> {
        signer.verify(&self.unsigned_payload(), &self.signature)
    }
}
