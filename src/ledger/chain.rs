// Single-writer ledger persisted in SQLite

use crate::core::crypto::LedgerSigner;
use crate::core::errors::{CryptoError, QhseError};
use crate::ledger::block::{Block, Transaction, TransactionType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(FromRow)]
struct BlockRow {
    block_index: i64,
    timestamp: f64,
    data: String,
    previous_hash: String,
    nonce: i64,
    hash: String,
}

impl TryFrom<BlockRow> for Block {
    type Error = QhseError;

    fn try_from(row: BlockRow) -> Result<Self, Self::Error> {
        let data = serde_json::from_str(&row.data).map_err(|e| {
            QhseError::CryptoError(CryptoError::CanonicalizationError(format!(
                "Stored block {} is not valid JSON: {}",
                row.block_index, e
            )))
        })?;
        Ok(Block {
            index: row.block_index,
            timestamp: row.timestamp,
            data,
            previous_hash: row.previous_hash,
            nonce: row.nonce,
            hash: row.hash,
        })
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CertificateRecord {
    pub certificate_id: String,
    pub user_id: i64,
    pub certificate_type: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issuer: String,
    pub block_hash: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub audit_id: String,
    pub auditor_id: i64,
    pub auditee_id: i64,
    pub audit_type: String,
    pub results: Value,
    pub block_hash: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct AuditRow {
    audit_id: String,
    auditor_id: i64,
    auditee_id: i64,
    audit_type: String,
    results: String,
    block_hash: String,
    transaction_id: String,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditRecord {
    fn from(row: AuditRow) -> Self {
        Self {
            audit_id: row.audit_id,
            auditor_id: row.auditor_id,
            auditee_id: row.auditee_id,
            audit_type: row.audit_type,
            results: serde_json::from_str(&row.results).unwrap_or(Value::String(row.results)),
            block_hash: row.block_hash,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateVerification {
    pub valid: bool,
    pub certificate: CertificateRecord,
    pub is_expired: bool,
    pub blockchain_verified: bool,
    pub signature_verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub total_blocks: usize,
    pub total_transactions: i64,
    pub pending_transactions: usize,
    pub difficulty: usize,
    pub chain_valid: bool,
    pub last_block_hash: Option<String>,
    pub last_block_timestamp: Option<f64>,
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainExport {
    pub start_block: usize,
    pub end_block: usize,
    pub export_timestamp: DateTime<Utc>,
    pub total_blocks: usize,
    pub blocks: Vec<Block>,
}

/// A row written in the same database transaction as the block that anchors it
#[async_trait]
trait AnchoredRecord: Send + Sync {
    fn anchor_to(&mut self, block: &Block, transaction: &Transaction);

    async fn insert(
        &self,
        tx: &mut sqlx::Transaction<'static, sqlx::Sqlite>,
        transaction: &Transaction,
    ) -> Result<(), QhseError>;
}

#[async_trait]
impl AnchoredRecord for CertificateRecord {
    fn anchor_to(&mut self, block: &Block, transaction: &Transaction) {
        self.block_hash = block.hash.clone();
        self.transaction_id = transaction.transaction_id.clone();
    }

    async fn insert(
        &self,
        tx: &mut sqlx::Transaction<'static, sqlx::Sqlite>,
        transaction: &Transaction,
    ) -> Result<(), QhseError> {
        sqlx::query(
            "INSERT INTO ledger_certificates
             (certificate_id, user_id, certificate_type, issued_at, expires_at, issuer, block_hash, transaction_id, data)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.certificate_id)
        .bind(self.user_id)
        .bind(&self.certificate_type)
        .bind(self.issued_at)
        .bind(self.expires_at)
        .bind(&self.issuer)
        .bind(&self.block_hash)
        .bind(&self.transaction_id)
        .bind(transaction.data.to_string())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AnchoredRecord for AuditRecord {
    fn anchor_to(&mut self, block: &Block, transaction: &Transaction) {
        self.block_hash = block.hash.clone();
        self.transaction_id = transaction.transaction_id.clone();
    }

    async fn insert(
        &self,
        tx: &mut sqlx::Transaction<'static, sqlx::Sqlite>,
        _transaction: &Transaction,
    ) -> Result<(), QhseError> {
        sqlx::query(
            "INSERT INTO ledger_audits
             (audit_id, auditor_id, auditee_id, audit_type, results, block_hash, transaction_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.audit_id)
        .bind(self.auditor_id)
        .bind(self.auditee_id)
        .bind(&self.audit_type)
        .bind(self.results.to_string())
        .bind(&self.block_hash)
        .bind(&self.transaction_id)
        .bind(self.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

async fn mine_blocking(mut block: Block, difficulty: usize) -> Result<Block, QhseError> {
    tokio::task::spawn_blocking(move || {
        block.mine(difficulty)?;
        Ok::<Block, CryptoError>(block)
    })
    .await
    .map_err(|e| QhseError::TransientError(format!("Mining task failed: {}", e)))?
    .map_err(QhseError::from)
}

fn validate_links(chain: &[Block]) -> bool {
    chain.windows(2).all(|pair| {
        let (previous, current) = (&pair[0], &pair[1]);
        current.previous_hash == previous.hash
            && current.calculate_hash().map(|h| h == current.hash).unwrap_or(false)
    })
}

/// Hash-chained ledger with a single writer
///
/// The in-memory chain mirrors `ledger_blocks`; every mutation holds the state lock
/// until the mined block is persisted.
pub struct Ledger {
    db_pool: SqlitePool,
    signer: Arc<LedgerSigner>,
    difficulty: usize,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Load the persisted chain, mining a genesis block when it is empty
    pub async fn load(db_pool: SqlitePool, signer: Arc<LedgerSigner>, difficulty: usize) -> Result<Self, QhseError> {
        let rows = sqlx::query_as::<_, BlockRow>(
            "SELECT block_index, timestamp, data, previous_hash, nonce, hash FROM ledger_blocks ORDER BY block_index",
        )
        .fetch_all(&db_pool)
        .await?;

        let mut chain = rows
            .into_iter()
            .map(Block::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if chain.is_empty() {
            let genesis = Block::new(
                0,
                unix_now(),
                json!({
                    "message": "Genesis Block - QHSE Ledger",
                    "created_at": Utc::now().to_rfc3339(),
                    "version": "1.0"
                }),
                "0",
            );
            let genesis = mine_blocking(genesis, difficulty).await?;
            insert_block(&db_pool, &genesis).await?;
            info!(hash = %genesis.hash, "Genesis block created");
            chain.push(genesis);
        } else if !validate_links(&chain) {
            warn!(blocks = chain.len(), "Persisted ledger failed validation");
        }

        info!(blocks = chain.len(), difficulty, "Ledger loaded");

        Ok(Self {
            db_pool,
            signer,
            difficulty,
            state: Mutex::new(LedgerState {
                chain,
                pending: Vec::new(),
            }),
        })
    }

    /// Validate and sign a transaction, then queue it for the next block
    pub async fn add_transaction(&self, transaction: Transaction) -> Result<Transaction, QhseError> {
        let mut state = self.state.lock().await;
        let signed = self.sign_transaction(transaction)?;
        state.pending.push(signed.clone());
        debug!(transaction_id = %signed.transaction_id, pending = state.pending.len(), "Transaction queued");
        Ok(signed)
    }

    fn sign_transaction(&self, mut transaction: Transaction) -> Result<Transaction, QhseError> {
        transaction.validate()?;
        transaction.sign(&self.signer)?;
        Ok(transaction)
    }

    /// Mine every pending transaction into a new block
    pub async fn mine_pending(&self) -> Result<Block, QhseError> {
        let mut state = self.state.lock().await;
        self.mine_locked(&mut state).await
    }

    async fn mine_locked(&self, state: &mut LedgerState) -> Result<Block, QhseError> {
        let block = self.mine_next(state).await?;
        let mut tx = self.db_pool.begin().await?;
        persist_block(&mut tx, &block, &state.pending).await?;
        tx.commit().await?;
        Ok(self.commit_block(state, block))
    }

    /// Mine a block over the pending queue without touching storage
    async fn mine_next(&self, state: &LedgerState) -> Result<Block, QhseError> {
        if state.pending.is_empty() {
            return Err(QhseError::Validation("No pending transactions".to_string()));
        }

        let previous_hash = state
            .chain
            .last()
            .map(|b| b.hash.clone())
            .unwrap_or_else(|| "0".to_string());
        let transactions = serde_json::to_value(&state.pending).map_err(|e| {
            QhseError::CryptoError(CryptoError::CanonicalizationError(e.to_string()))
        })?;
        let block = Block::new(
            state.chain.len() as i64,
            unix_now(),
            json!({
                "transactions": transactions,
                "transaction_count": state.pending.len(),
            }),
            previous_hash,
        );

        mine_blocking(block, self.difficulty).await
    }

    fn commit_block(&self, state: &mut LedgerState, block: Block) -> Block {
        info!(
            index = block.index,
            hash = %block.hash,
            nonce = block.nonce,
            transactions = state.pending.len(),
            "Block mined"
        );
        state.pending.clear();
        state.chain.push(block.clone());
        block
    }

    /// Queue `transaction`, mine it and persist the block together with `record`
    ///
    /// On any failure the queue is restored to what it held before the call, so a
    /// failed issuance never rides along in a later block.
    async fn anchor<R: AnchoredRecord>(&self, transaction: Transaction, mut record: R) -> Result<R, QhseError> {
        let mut state = self.state.lock().await;
        let signed = self.sign_transaction(transaction)?;
        let queued = state.pending.len();
        state.pending.push(signed.clone());

        let anchored = async {
            let block = self.mine_next(&state).await?;
            record.anchor_to(&block, &signed);
            let mut tx = self.db_pool.begin().await?;
            persist_block(&mut tx, &block, &state.pending).await?;
            record.insert(&mut tx, &signed).await?;
            tx.commit().await?;
            Ok::<_, QhseError>(block)
        }
        .await;

        match anchored {
            Ok(block) => {
                self.commit_block(&mut state, block);
                Ok(record)
            }
            Err(e) => {
                state.pending.truncate(queued);
                warn!(error = %e, transaction_id = %signed.transaction_id, "Ledger record rolled back");
                Err(e)
            }
        }
    }

    /// Record a certificate and mine it immediately
    pub async fn create_certificate(
        &self,
        user_id: i64,
        certificate_type: &str,
        expires_at: Option<DateTime<Utc>>,
        issuer: &str,
        extra: Value,
    ) -> Result<CertificateRecord, QhseError> {
        if certificate_type.trim().is_empty() {
            return Err(QhseError::Validation("certificate_type is required".to_string()));
        }

        let certificate_id = uuid::Uuid::new_v4().to_string();
        let issued_at = Utc::now();
        let transaction = Transaction::new(
            TransactionType::Certificate,
            user_id,
            json!({
                "certificate_id": certificate_id,
                "certificate_type": certificate_type,
                "issued_at": issued_at.to_rfc3339(),
                "expires_at": expires_at.map(|e| e.to_rfc3339()),
                "issuer": issuer,
                "status": "active",
                "details": extra,
            }),
            unix_now(),
        );
        let record = CertificateRecord {
            certificate_id,
            user_id,
            certificate_type: certificate_type.to_string(),
            issued_at,
            expires_at,
            issuer: issuer.to_string(),
            block_hash: String::new(),
            transaction_id: String::new(),
        };

        let record = self.anchor(transaction, record).await?;
        info!(certificate_id = %record.certificate_id, user_id, "Certificate recorded");
        Ok(record)
    }

    /// Record an audit and mine it immediately
    pub async fn create_audit_record(
        &self,
        auditor_id: i64,
        auditee_id: i64,
        audit_type: &str,
        results: Value,
    ) -> Result<AuditRecord, QhseError> {
        let audit_id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let transaction = Transaction::new(
            TransactionType::Audit,
            auditor_id,
            json!({
                "audit_id": audit_id,
                "auditor_id": auditor_id,
                "auditee_id": auditee_id,
                "audit_type": audit_type,
                "results": results,
                "audit_date": created_at.to_rfc3339(),
                "status": "completed",
            }),
            unix_now(),
        );
        let record = AuditRecord {
            audit_id,
            auditor_id,
            auditee_id,
            audit_type: audit_type.to_string(),
            results,
            block_hash: String::new(),
            transaction_id: String::new(),
            created_at,
        };

        let record = self.anchor(transaction, record).await?;
        info!(audit_id = %record.audit_id, auditor_id, auditee_id, "Audit recorded");
        Ok(record)
    }

    /// Check that a certificate exists, is anchored in the chain and has not expired
    pub async fn verify_certificate(&self, certificate_id: &str) -> Result<CertificateVerification, QhseError> {
        let certificate = sqlx::query_as::<_, CertificateRecord>(
            "SELECT certificate_id, user_id, certificate_type, issued_at, expires_at, issuer, block_hash, transaction_id
             FROM ledger_certificates WHERE certificate_id = ?",
        )
        .bind(certificate_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| QhseError::NotFound(format!("Certificate {}", certificate_id)))?;

        let blockchain_verified = {
            let state = self.state.lock().await;
            state.chain.iter().any(|b| b.hash == certificate.block_hash)
        };
        let is_expired = certificate.expires_at.map(|e| e < Utc::now()).unwrap_or(false);
        let signature_verified = self.transaction_signature_valid(&certificate.transaction_id).await?;

        Ok(CertificateVerification {
            valid: blockchain_verified && !is_expired,
            certificate,
            is_expired,
            blockchain_verified,
            signature_verified,
        })
    }

    async fn transaction_signature_valid(&self, transaction_id: &str) -> Result<bool, QhseError> {
        let row = sqlx::query_as::<_, (String, i64, String, f64, String)>(
            "SELECT transaction_type, user_id, data, timestamp, signature FROM ledger_transactions WHERE transaction_id = ?",
        )
        .bind(transaction_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let Some((transaction_type, user_id, data, timestamp, signature)) = row else {
            return Ok(false);
        };
        let Ok(data) = serde_json::from_str::<Value>(&data) else {
            return Ok(false);
        };
        let transaction = Transaction {
            transaction_id: transaction_id.to_string(),
            transaction_type: transaction_type.parse()?,
            user_id,
            data,
            timestamp,
            signature,
        };
        Ok(transaction.verify(&self.signer).is_ok())
    }

    pub async fn certificate_history(&self, user_id: i64) -> Result<Vec<CertificateRecord>, QhseError> {
        let rows = sqlx::query_as::<_, CertificateRecord>(
            "SELECT certificate_id, user_id, certificate_type, issued_at, expires_at, issuer, block_hash, transaction_id
             FROM ledger_certificates WHERE user_id = ? ORDER BY issued_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    /// Audits where the user was auditor or auditee
    pub async fn audit_history(&self, user_id: i64) -> Result<Vec<AuditRecord>, QhseError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT audit_id, auditor_id, auditee_id, audit_type, results, block_hash, transaction_id, created_at
             FROM ledger_audits WHERE auditor_id = ? OR auditee_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows.into_iter().map(AuditRecord::from).collect())
    }

    pub async fn is_chain_valid(&self) -> bool {
        let state = self.state.lock().await;
        validate_links(&state.chain)
    }

    pub async fn block_count(&self) -> usize {
        self.state.lock().await.chain.len()
    }

    pub async fn stats(&self) -> LedgerStats {
        let state = self.state.lock().await;
        let last = state.chain.last();
        LedgerStats {
            total_blocks: state.chain.len(),
            total_transactions: state.chain.iter().map(Block::transaction_count).sum(),
            pending_transactions: state.pending.len(),
            difficulty: self.difficulty,
            chain_valid: validate_links(&state.chain),
            last_block_hash: last.map(|b| b.hash.clone()),
            last_block_timestamp: last.map(|b| b.timestamp),
            public_key: self.signer.public_key_hex(),
        }
    }

    /// Blocks in `[start, end)`; `end` defaults to the chain length
    pub async fn export_range(&self, start: usize, end: Option<usize>) -> ChainExport {
        let state = self.state.lock().await;
        let len = state.chain.len();
        let end = end.unwrap_or(len).min(len);
        let start = start.min(end);
        let blocks = state.chain[start..end].to_vec();

        ChainExport {
            start_block: start,
            end_block: end,
            export_timestamp: Utc::now(),
            total_blocks: blocks.len(),
            blocks,
        }
    }

    #[cfg(test)]
    async fn tamper_with_block(&self, index: usize, data: Value) {
        let mut state = self.state.lock().await;
        if let Some(block) = state.chain.get_mut(index) {
            block.data = data;
        }
    }
}

/// Block row plus one row per transaction, inside the caller's transaction
async fn persist_block(
    tx: &mut sqlx::Transaction<'static, sqlx::Sqlite>,
    block: &Block,
    transactions: &[Transaction],
) -> Result<(), QhseError> {
    insert_block(&mut **tx, block).await?;
    for transaction in transactions {
        sqlx::query(
            "INSERT INTO ledger_transactions
             (transaction_id, block_index, transaction_type, user_id, data, timestamp, signature)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&transaction.transaction_id)
        .bind(block.index)
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.user_id)
        .bind(transaction.data.to_string())
        .bind(transaction.timestamp)
        .bind(&transaction.signature)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_block<'e, E>(executor: E, block: &Block) -> Result<(), QhseError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO ledger_blocks (block_index, timestamp, data, previous_hash, nonce, hash)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(block.index)
    .bind(block.timestamp)
    .bind(block.data.to_string())
    .bind(&block.previous_hash)
    .bind(block.nonce)
    .bind(&block.hash)
    .execute(executor)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn ledger() -> (Ledger, SqlitePool) {
        let pool = db::connect_in_memory().await.unwrap();
        let ledger = Ledger::load(pool.clone(), Arc::new(LedgerSigner::generate()), 1)
            .await
            .unwrap();
        (ledger, pool)
    }

    #[tokio::test]
    async fn test_genesis_created_once() {
        let (ledger, pool) = ledger().await;
        assert_eq!(ledger.block_count().await, 1);

        let reloaded = Ledger::load(pool, Arc::new(LedgerSigner::generate()), 1).await.unwrap();
        assert_eq!(reloaded.block_count().await, 1);
        assert!(reloaded.is_chain_valid().await);
    }

    #[tokio::test]
    async fn test_certificate_lifecycle() {
        let (ledger, _pool) = ledger().await;
        let cert = ledger
            .create_certificate(7, "Habilitation électrique", None, "admin", json!({}))
            .await
            .unwrap();
        assert!(cert.block_hash.starts_with('0'));

        let verification = ledger.verify_certificate(&cert.certificate_id).await.unwrap();
        assert!(verification.valid);
        assert!(verification.signature_verified);

        let history = ledger.certificate_history(7).await.unwrap();
        assert_eq!(history.len(), 1);

        let stats = ledger.stats().await;
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.total_transactions, 1);
        assert!(stats.chain_valid);
    }

    #[tokio::test]
    async fn test_expired_certificate_is_invalid() {
        let (ledger, _pool) = ledger().await;
        let expired = Utc::now() - chrono::Duration::days(1);
        let cert = ledger
            .create_certificate(7, "SST", Some(expired), "admin", json!({}))
            .await
            .unwrap();
        let verification = ledger.verify_certificate(&cert.certificate_id).await.unwrap();
        assert!(verification.is_expired);
        assert!(!verification.valid);
    }

    #[tokio::test]
    async fn test_unknown_certificate() {
        let (ledger, _pool) = ledger().await;
        let result = ledger.verify_certificate("missing").await;
        assert!(matches!(result, Err(QhseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_issuance_leaves_no_trace() {
        let (ledger, pool) = ledger().await;
        sqlx::query("ALTER TABLE ledger_certificates RENAME TO ledger_certificates_offline")
            .execute(&pool)
            .await
            .unwrap();

        let result = ledger.create_certificate(7, "SST", None, "admin", json!({})).await;
        assert!(matches!(result, Err(QhseError::Database(_))));
        assert_eq!(ledger.stats().await.pending_transactions, 0);
        assert_eq!(ledger.block_count().await, 1);
        let (stored_blocks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_blocks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored_blocks, 1);

        sqlx::query("ALTER TABLE ledger_certificates_offline RENAME TO ledger_certificates")
            .execute(&pool)
            .await
            .unwrap();
        let audit = ledger.create_audit_record(1, 2, "interne", json!({})).await.unwrap();

        let export = ledger.export_range(1, None).await;
        assert_eq!(export.total_blocks, 1);
        assert_eq!(export.blocks[0].hash, audit.block_hash);
        assert_eq!(export.blocks[0].transaction_count(), 1);
        assert!(ledger.certificate_history(7).await.unwrap().is_empty());
        assert!(ledger.is_chain_valid().await);
    }

    #[tokio::test]
    async fn test_queued_transactions_survive_failed_issuance() {
        let (ledger, pool) = ledger().await;
        ledger
            .add_transaction(Transaction::new(
                TransactionType::Compliance,
                4,
                json!({"compliance_type": "ISO_14001", "status": "conforme", "requirements": []}),
                unix_now(),
            ))
            .await
            .unwrap();
        sqlx::query("ALTER TABLE ledger_audits RENAME TO ledger_audits_offline")
            .execute(&pool)
            .await
            .unwrap();

        assert!(ledger.create_audit_record(1, 2, "interne", json!({})).await.is_err());
        assert_eq!(ledger.stats().await.pending_transactions, 1);

        let block = ledger.mine_pending().await.unwrap();
        assert_eq!(block.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_audit_history_includes_both_sides() {
        let (ledger, _pool) = ledger().await;
        ledger.create_audit_record(1, 2, "interne", json!({"score": 88})).await.unwrap();
        ledger.create_audit_record(3, 1, "externe", json!({"score": 70})).await.unwrap();

        assert_eq!(ledger.audit_history(1).await.unwrap().len(), 2);
        assert_eq!(ledger.audit_history(2).await.unwrap().len(), 1);
        assert_eq!(ledger.audit_history(2).await.unwrap()[0].results["score"], 88);
    }

    #[tokio::test]
    async fn test_mine_pending_requires_transactions() {
        let (ledger, _pool) = ledger().await;
        assert!(matches!(ledger.mine_pending().await, Err(QhseError::Validation(_))));

        ledger
            .add_transaction(Transaction::new(
                TransactionType::Compliance,
                4,
                json!({"compliance_type": "ISO_45001", "status": "conforme", "requirements": []}),
                unix_now(),
            ))
            .await
            .unwrap();
        let block = ledger.mine_pending().await.unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_transaction_rejected() {
        let (ledger, _pool) = ledger().await;
        let result = ledger
            .add_transaction(Transaction::new(TransactionType::Incident, 0, json!({}), unix_now()))
            .await;
        assert!(matches!(result, Err(QhseError::Validation(_))));
        assert_eq!(ledger.stats().await.pending_transactions, 0);
    }

    #[tokio::test]
    async fn test_tampering_breaks_validity() {
        let (ledger, _pool) = ledger().await;
        ledger.create_audit_record(1, 2, "interne", json!({})).await.unwrap();
        assert!(ledger.is_chain_valid().await);

        ledger.tamper_with_block(1, json!({"forged": true})).await;
        assert!(!ledger.is_chain_valid().await);
    }

    #[tokio::test]
    async fn test_export_range_clamps() {
        let (ledger, _pool) = ledger().await;
        let export = ledger.export_range(0, Some(50)).await;
        assert_eq!(export.total_blocks, 1);
        assert_eq!(export.end_block, 1);
        let empty = ledger.export_range(5, None).await;
        assert_eq!(empty.total_blocks, 0);
    }
}
