use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bb84_pipeline::channel::ChannelSimulator;
use bb84_pipeline::cipher::{decrypt, encrypt};
use bb84_pipeline::error_correction::block_parity_correction;
use bb84_pipeline::privacy_amplification::derive_secret_key;
use bb84_pipeline::{run_exchange, ChannelConfig, ProtocolConfig, Variant};

fn benchmark_pipeline(c: &mut Criterion) {
    let channel = ChannelConfig::default().with_qubits(1024).with_seed(42);
    let mut simulator = ChannelSimulator::new(channel).unwrap();
    let noisy = simulator.transmit(Variant::Noisy);
    let sifted = noisy.sift().unwrap();

    c.bench_function("sift_1024", |b| b.iter(|| black_box(&noisy).sift().unwrap()));

    c.bench_function("block_parity_correction", |b| {
        b.iter(|| {
            block_parity_correction(
                black_box(&sifted.sender_sifted),
                black_box(&sifted.receiver_sifted),
                4,
            )
            .unwrap()
        })
    });

    c.bench_function("derive_secret_key", |b| {
        b.iter(|| derive_secret_key(black_box(&sifted.sender_sifted), 64).unwrap())
    });

    let message = vec![0x5au8; 4096];
    c.bench_function("xor_cipher_4k", |b| {
        b.iter(|| {
            let ciphertext = encrypt(black_box(&message), &sifted.sender_sifted);
            decrypt(&ciphertext, &sifted.sender_sifted)
        })
    });

    let config = ProtocolConfig::for_variant(Variant::Noisy);
    c.bench_function("run_exchange_noisy", |b| {
        b.iter(|| run_exchange(black_box(noisy.clone()), &config, None).unwrap())
    });
}

criterion_group!(benches, benchmark_pipeline);
criterion_main!(benches);
