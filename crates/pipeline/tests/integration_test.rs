//! Integration tests for the pipeline.
//!
//! These tests run the batch precompute and the request pipeline together
//! the way the service does.

use data_loader::Rating;
use factorization::{
    precompute, FactorSnapshot, PrecomputeJob, PrecomputeOutcome, RecError, SnapshotStore,
    SvdFactorizer,
};
use pipeline::{
    recommend, ColdStartPredictor, FoldInPredictor, FullRefitPredictor, NewUserRatings,
    Recommender,
};
use std::collections::HashSet;

fn three_user_ratings() -> Vec<Rating> {
    vec![
        Rating::new(1, 1, 5.0),
        Rating::new(1, 2, 1.0),
        Rating::new(2, 1, 4.0),
        Rating::new(2, 2, 2.0),
        Rating::new(3, 1, 1.0),
        Rating::new(3, 2, 5.0),
    ]
}

/// Deterministic sparse ratings: 24 users, 15 items.
fn synthetic_ratings() -> Vec<Rating> {
    let mut ratings = Vec::new();
    for user_id in 1..=24u32 {
        for item_id in 1..=15u32 {
            if (user_id + item_id) % 4 == 0 {
                continue;
            }
            let score = 1 + (user_id * 7 + item_id * 3) % 5;
            ratings.push(Rating::new(user_id, item_id, score as f32));
        }
    }
    ratings
}

// ============================================================================
// Cold start end to end
// ============================================================================

#[test]
fn test_fold_in_mirrors_similar_user() {
    let snapshot = precompute(&three_user_ratings(), 1, &SvdFactorizer::new()).unwrap();

    let ratings: NewUserRatings = [(1, 5.0)].into_iter().collect();
    let recs = recommend(&ratings, &snapshot, 10).unwrap();

    assert_eq!(recs.len(), 1, "only item 2 is unrated");
    assert_eq!(recs[0].item_id, 2);
    assert!(
        (recs[0].predicted - 1.0).abs() < (recs[0].predicted - 5.0).abs(),
        "predicted {} should be closer to 1 than 5",
        recs[0].predicted
    );
}

#[test]
fn test_full_refit_agrees_on_rank_one_data() {
    let history = three_user_ratings();
    let snapshot = precompute(&history, 1, &SvdFactorizer::new()).unwrap();
    let refit = FullRefitPredictor::from_ratings(&history, 1).unwrap();

    let ratings: NewUserRatings = [(1, 5.0)].into_iter().collect();
    let folded = FoldInPredictor::new(&snapshot).predict(&ratings).unwrap();
    let refitted = refit.predict(&ratings).unwrap();

    assert_eq!(folded.len(), refitted.len());
    for (a, b) in folded.iter().zip(&refitted) {
        assert_eq!(a.item_id, b.item_id);
        assert!(
            (a.predicted - b.predicted).abs() < 1e-6,
            "item {}: fold-in {} vs refit {}",
            a.item_id,
            a.predicted,
            b.predicted
        );
    }
}

#[test]
fn test_refit_through_recommender() {
    let history = synthetic_ratings();
    let refit = FullRefitPredictor::from_ratings(&history, 3).unwrap();
    let ratings: NewUserRatings = [(2, 5.0), (7, 1.0)].into_iter().collect();

    let recs = Recommender::new()
        .recommend_with(&refit, refit.popularity(), &ratings, 4)
        .unwrap();

    assert_eq!(recs.len(), 4);
    assert!(recs.iter().all(|r| r.item_id != 2 && r.item_id != 7));
}

// ============================================================================
// Output properties
// ============================================================================

#[test]
fn test_recommendations_exclude_rated_and_respect_bounds() {
    let snapshot = precompute(&synthetic_ratings(), 4, &SvdFactorizer::new()).unwrap();
    let ratings: NewUserRatings = [(1, 5.0), (4, 2.0), (9, 4.0)].into_iter().collect();
    let rated: HashSet<u32> = ratings.rated_set();

    for top_n in [0, 1, 5, 12, 100] {
        let recs = recommend(&ratings, &snapshot, top_n).unwrap();
        let expected = top_n.clamp(1, 12);
        assert_eq!(recs.len(), expected, "top_n {}", top_n);
        assert!(
            recs.iter().all(|r| !rated.contains(&r.item_id)),
            "rated items must never be recommended"
        );

        let unique: HashSet<u32> = recs.iter().map(|r| r.item_id).collect();
        assert_eq!(unique.len(), recs.len(), "no duplicate items");

        for pair in recs.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].item_id < pair[1].item_id),
                "output must be ordered by score then item id"
            );
        }
    }
}

#[test]
fn test_recommend_is_deterministic() {
    let snapshot = precompute(&synthetic_ratings(), 4, &SvdFactorizer::new()).unwrap();
    let ratings: NewUserRatings = [(3, 4.0), (11, 1.0)].into_iter().collect();

    let first = recommend(&ratings, &snapshot, 8).unwrap();
    for _ in 0..5 {
        assert_eq!(recommend(&ratings, &snapshot, 8).unwrap(), first);
    }
}

#[test]
fn test_unrated_user_predicts_zero_and_ties_by_id() {
    let snapshot = precompute(&synthetic_ratings(), 4, &SvdFactorizer::new()).unwrap();
    let recs = recommend(&NewUserRatings::new(), &snapshot, 15).unwrap();

    assert_eq!(recs.len(), 15);
    assert!(recs.iter().all(|r| r.predicted == 0.0 && r.score == 0.0));
    let ids: Vec<u32> = recs.iter().map(|r| r.item_id).collect();
    assert_eq!(ids, (1..=15).collect::<Vec<u32>>());
}

#[test]
fn test_invalid_ratings_are_rejected() {
    let snapshot = precompute(&synthetic_ratings(), 4, &SvdFactorizer::new()).unwrap();

    let unknown: NewUserRatings = [(999, 4.0)].into_iter().collect();
    assert!(matches!(
        recommend(&unknown, &snapshot, 5),
        Err(RecError::InvalidRating { item_id: 999, .. })
    ));

    let out_of_range: NewUserRatings = [(1, 7.5)].into_iter().collect();
    assert!(matches!(
        recommend(&out_of_range, &snapshot, 5),
        Err(RecError::InvalidRating { item_id: 1, .. })
    ));
}

// ============================================================================
// Snapshot lifecycle
// ============================================================================

#[test]
fn test_persisted_snapshot_gives_identical_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("factors.json");

    let snapshot = precompute(&synthetic_ratings(), 4, &SvdFactorizer::new()).unwrap();
    snapshot.save(&path).unwrap();
    let loaded = FactorSnapshot::load(&path).unwrap();

    let ratings: NewUserRatings = [(5, 5.0), (6, 3.0)].into_iter().collect();
    assert_eq!(
        recommend(&ratings, &snapshot, 6).unwrap(),
        recommend(&ratings, &loaded, 6).unwrap()
    );
}

#[test]
fn test_recommend_from_published_store() {
    let store = SnapshotStore::new();
    let recommender = Recommender::new();
    let ratings: NewUserRatings = [(1, 5.0)].into_iter().collect();

    assert!(matches!(
        recommender.recommend_from_store(&ratings, &store, 3),
        Err(RecError::SnapshotUnavailable)
    ));

    let ticket = store.begin_rebuild();
    let outcome = PrecomputeJob::new(4)
        .run(&store, ticket, &synthetic_ratings(), &SvdFactorizer::new())
        .unwrap();
    assert!(matches!(outcome, PrecomputeOutcome::Published(_)));

    let recs = recommender.recommend_from_store(&ratings, &store, 3).unwrap();
    assert_eq!(recs.len(), 3);
}
