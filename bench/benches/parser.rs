use criterion::{criterion_group, criterion_main, Criterion};
use fnc::{config::Config, lexer, parser::parse_unit};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/bench.fn");

fn criterion_benchmark(c: &mut Criterion) {
    let config = Config::default();
    let (tokens, _) = lexer::lex_in_new(INPUT.as_bytes(), &config);

    c.bench_function("parser", |b| {
        b.iter(|| {
            let unit = parse_unit(black_box(&tokens)).unwrap();
            black_box(unit);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
