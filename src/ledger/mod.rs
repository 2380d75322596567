// Hash-chained certificate and audit ledger

pub mod block;
pub mod chain;

pub use block::{Block, Transaction, TransactionType};
pub use chain::{AuditRecord, CertificateRecord, CertificateVerification, ChainExport, Ledger, LedgerStats};
