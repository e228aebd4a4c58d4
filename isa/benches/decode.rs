use criterion::{Criterion, black_box, criterion_group, criterion_main};
use isa::decoder::{DecodeGraph, Isa, a64_tables};

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("build_bootstrap_graph", |b| {
        b.iter(|| {
            DecodeGraph::builder(a64_tables::TABLES)
                .root(Isa::A64, a64_tables::A64_ROOT)
                .root(Isa::C64, a64_tables::C64_ROOT)
                .build()
        });
    });

    let graph = DecodeGraph::shared();
    // Deterministic spread over the whole word space.
    let words: Vec<u32> = (0..4096_u32).map(|i| i.wrapping_mul(0x9E37_79B9)).collect();
    for isa in Isa::ALL {
        c.bench_function(&format!("classify_4096_{isa}"), |b| {
            b.iter(|| {
                for &word in &words {
                    black_box(graph.classify(black_box(word), isa));
                }
            });
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
