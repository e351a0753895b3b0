use criterion::{Criterion, criterion_group, criterion_main};
use qa_analyzer::embeddings::chunking::{ChunkingConfig, chunk_text};
use std::hint::black_box;

pub fn criterion_benchmark(c: &mut Criterion) {
    // Roughly 28KB of requirements-like prose, enough for a few dozen chunks.
    let sentence = "The system shall reject invalid credentials and record the attempt. ";
    let text = sentence.repeat(400);
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_text(black_box(&text), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
