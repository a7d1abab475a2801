use criterion::{black_box, criterion_group, criterion_main, Criterion};

use flat_collections::CompactPrefixTree;

const WORDS: &[&str] = &[
    "alpha", "alphabet", "alphanumeric", "beta", "betatron", "gamma", "delta", "deltoid",
    "epsilon", "zeta", "eta", "theta", "iota", "kappa", "lambda", "mu", "nu", "xi", "omicron",
    "pi", "rho", "sigma", "sigmoid", "tau", "upsilon", "phi", "chi", "psi", "omega",
    "inter", "internal", "interop", "interoperability", "internet", "interstellar",
];

fn search(c: &mut Criterion) {
    let tree =
        CompactPrefixTree::from_entries(WORDS.iter().enumerate().map(|(i, w)| (*w, i))).unwrap();

    let mut group = c.benchmark_group("prefix_match");
    group.bench_function("longest_hit", |b| {
        b.iter(|| tree.try_match_longest(black_box("interoperability layer")))
    });
    group.bench_function("longest_deep_stem", |b| {
        b.iter(|| tree.try_match_longest(black_box("alphanumerical sorting")))
    });
    group.bench_function("longest_miss", |b| {
        b.iter(|| tree.try_match_longest(black_box("unrelated text")))
    });
    group.bench_function("shortest_hit", |b| {
        b.iter(|| tree.try_match_shortest(black_box("interstellar medium")))
    });
    group.bench_function("exact_hit", |b| {
        b.iter(|| tree.try_match_exact(black_box("sigmoid")))
    });
    group.finish();
}

criterion_group!(benches, search);
criterion_main!(benches);
