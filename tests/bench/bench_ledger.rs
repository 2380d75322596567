// Performance benchmarks for ledger hashing, mining and signing

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qhse_assistant::core::crypto::{canonicalize, LedgerSigner};
use qhse_assistant::ledger::{Block, Transaction, TransactionType};
use serde_json::json;

fn sample_block() -> Block {
    Block::new(
        1,
        1_700_000_000.25,
        json!({
            "transactions": [{
                "transaction_type": "certificate",
                "user_id": 42,
                "data": {"certificate_type": "habilitation_electrique"}
            }],
            "transaction_count": 1
        }),
        "0000000000000000000000000000000000000000000000000000000000000000",
    )
}

fn bench_block_hash(c: &mut Criterion) {
    let block = sample_block();

    c.bench_function("block_calculate_hash", |b| {
        b.iter(|| {
            black_box(&block).calculate_hash().unwrap();
        });
    });
}

fn bench_block_mining(c: &mut Criterion) {
    c.bench_function("block_mine_difficulty_2", |b| {
        b.iter(|| {
            let mut block = sample_block();
            block.mine(black_box(2)).unwrap();
        });
    });
}

fn bench_transaction_signing(c: &mut Criterion) {
    let signer = LedgerSigner::generate();
    let transaction = Transaction::new(
        TransactionType::Certificate,
        42,
        json!({"certificate_id": "CERT-bench", "certificate_type": "sst"}),
        1_700_000_000.5,
    );

    c.bench_function("transaction_sign", |b| {
        b.iter(|| {
            let mut tx = transaction.clone();
            tx.sign(black_box(&signer)).unwrap();
        });
    });
}

fn bench_canonicalization(c: &mut Criterion) {
    let data = json!({
        "z": 3,
        "a": {"nested": [1, 2, 3], "b": "x"},
        "m": null
    });

    c.bench_function("json_canonicalization", |b| {
        b.iter(|| {
            canonicalize(black_box(&data)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_block_hash,
    bench_block_mining,
    bench_transaction_signing,
    bench_canonicalization
);
criterion_main!(benches);
