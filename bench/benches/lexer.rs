use criterion::{criterion_group, criterion_main, Criterion};
use fnc::{
    config::Config,
    lexer::{self, SUGGESTED_TOKENS_CAPACITY},
};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/bench.fn");

fn criterion_benchmark(c: &mut Criterion) {
    let config = Config::default();
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY * 2);

    c.bench_function("lexer", |b| {
        b.iter(|| {
            tokens.clear();
            let summary = lexer::lex(black_box(INPUT.as_bytes()), &config, &mut tokens);
            black_box(summary);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
