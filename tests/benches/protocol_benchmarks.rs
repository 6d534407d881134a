//! # AIM Protocol Benchmarks
//!
//! Per-request cost of Protocol V2 on both sides of a call:
//!
//! | Path | Work |
//! |------|------|
//! | Canonical message | header filter, sort, body SHA-256 |
//! | Sign call | canonical message + keccak + ECDSA sign |
//! | Verify request | canonical message + keccak + ECDSA recover |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use aim_01_protocol::{
    build_canonical_message, parse_signing_key, verify_request, CallOptions, RequestParts,
    RequestSigner, VerifyOptions,
};

const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

fn call_options(body_len: usize) -> CallOptions {
    let mut options = CallOptions::new("POST", "7", "/model");
    options.nonce = Some("1".into());
    options.body = Some(vec![b'x'; body_len]);
    options
}

fn bench_canonical_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("aim-01-canonical-message");

    for size in [0usize, 1024, 64 * 1024, 1024 * 1024] {
        let body = vec![b'x'; size];
        let headers = vec![
            ("tx-sender", "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1"),
            ("tx-nonce", "1"),
            ("tx-protocol", "2"),
            ("currency-type", "USDC"),
            ("spend_order", "USDC,HyPC"),
        ];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("build", size), &body, |b, body| {
            b.iter(|| {
                black_box(
                    build_canonical_message(
                        "POST",
                        "/aim/7/model",
                        headers.iter().copied(),
                        Some(body.as_slice()),
                    )
                    .is_ok(),
                )
            })
        });
    }

    group.finish();
}

fn bench_sign_and_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("aim-01-sign-verify");
    group.measurement_time(Duration::from_secs(10));

    let signer = RequestSigner::new(parse_signing_key(KEY).unwrap());
    let options = call_options(1024);

    group.bench_function("sign_call", |b| {
        b.iter(|| black_box(signer.sign_call(&options).is_ok()))
    });

    let call = signer.sign_call(&options).unwrap();
    let body = call.body.clone().unwrap_or_default();
    let verify = VerifyOptions::default();

    group.bench_function("verify_request", |b| {
        b.iter(|| {
            let parts = RequestParts {
                method: &call.method,
                path: &call.path,
                headers: &call.headers,
                body: &body,
            };
            black_box(verify_request(&parts, &verify).is_ok())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_canonical_message, bench_sign_and_verify);
criterion_main!(benches);
