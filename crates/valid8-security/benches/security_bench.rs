// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for document fingerprinting and issuer signature
// checks in the valid8-security crate.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use valid8_core::oracle::{EvidenceQuery, Oracle};
use valid8_core::types::{ClaimsRecord, Document, MediaType, SignatureEnvelope};
use valid8_security::{IssuerKeyPair, SignatureOracle, hash_bytes};

/// SHA-256 over typical upload sizes, from a small PNG to a multi-page scan.
fn bench_document_hash(c: &mut Criterion) {
    let sizes: &[(&str, usize)] = &[
        ("64 KiB", 64 * 1024),
        ("1 MiB", 1024 * 1024),
        ("8 MiB", 8 * 1024 * 1024),
    ];

    let mut group = c.benchmark_group("document_hash_sha256");
    for &(label, size) in sizes {
        let data = vec![0xABu8; size];
        group.bench_function(label, |b| {
            b.iter(|| black_box(hash_bytes(black_box(&data))));
        });
    }
    group.finish();
}

/// A full signature-oracle check on a 1 MiB document.
fn bench_signature_check(c: &mut Criterion) {
    let key = IssuerKeyPair::generate().expect("keygen");
    let oracle = SignatureOracle::new()
        .trust("Tech University", &key.public_key_hex())
        .expect("trust");
    let bytes = vec![0x42u8; 1024 * 1024];
    let envelope = SignatureEnvelope {
        signer: "Tech University".into(),
        signature_hex: key.sign_hex(&bytes).expect("sign"),
    };
    let document = Arc::new(Document::new(bytes, MediaType::Pdf));
    let query = EvidenceQuery::new(document, ClaimsRecord::default()).with_signature(Some(envelope));

    c.bench_function("signature_check (1 MiB)", |b| {
        b.iter(|| {
            let result = oracle.check(black_box(&query)).expect("check");
            assert!(result.verified);
        });
    });
}

criterion_group!(benches, bench_document_hash, bench_signature_check);
criterion_main!(benches);
