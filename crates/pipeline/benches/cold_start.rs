//! Benchmarks for cold-start prediction
//!
//! Run with: cargo bench --package pipeline
//!
//! Compares fold-in against a snapshot with a full refit per request on a
//! deterministic synthetic catalog.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use data_loader::Rating;
use factorization::{precompute, SvdFactorizer};
use pipeline::{
    recommend, ColdStartPredictor, FoldInPredictor, FullRefitPredictor, NewUserRatings,
};

const USERS: u32 = 200;
const ITEMS: u32 = 120;
const RANK: usize = 20;

fn synthetic_ratings() -> Vec<Rating> {
    let mut ratings = Vec::new();
    for user_id in 1..=USERS {
        for item_id in 1..=ITEMS {
            if (user_id * 31 + item_id * 17) % 5 != 0 {
                continue;
            }
            let score = 1 + (user_id * 7 + item_id * 3) % 5;
            ratings.push(Rating::new(user_id, item_id, score as f32));
        }
    }
    ratings
}

fn new_user() -> NewUserRatings {
    [(1, 5.0), (2, 1.0), (10, 4.0), (33, 3.0), (57, 2.0)]
        .into_iter()
        .collect()
}

fn bench_fold_in(c: &mut Criterion) {
    let snapshot = precompute(&synthetic_ratings(), RANK, &SvdFactorizer::new())
        .expect("Failed to precompute snapshot");
    let predictor = FoldInPredictor::new(&snapshot);
    let ratings = new_user();

    c.bench_function("fold_in_predict", |b| {
        b.iter(|| black_box(predictor.predict(black_box(&ratings)).unwrap()))
    });

    c.bench_function("fold_in_recommend_top10", |b| {
        b.iter(|| black_box(recommend(black_box(&ratings), &snapshot, 10).unwrap()))
    });
}

fn bench_full_refit(c: &mut Criterion) {
    let refit = FullRefitPredictor::from_ratings(&synthetic_ratings(), RANK)
        .expect("Failed to build refit predictor");
    let ratings = new_user();

    let mut group = c.benchmark_group("full_refit");
    group.sample_size(10);
    group.bench_function("full_refit_predict", |b| {
        b.iter(|| black_box(refit.predict(black_box(&ratings)).unwrap()))
    });
    group.finish();
}

fn bench_precompute(c: &mut Criterion) {
    let ratings = synthetic_ratings();

    let mut group = c.benchmark_group("precompute");
    group.sample_size(10);
    group.bench_function("precompute_rank20", |b| {
        b.iter(|| black_box(precompute(black_box(&ratings), RANK, &SvdFactorizer::new()).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_fold_in, bench_full_refit, bench_precompute);
criterion_main!(benches);
