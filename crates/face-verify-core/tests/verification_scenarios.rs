//! End-to-end verification protocol scenarios over synthetic embeddings.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use face_verify_core::{evaluate, evaluate_stratified, EvalConfig, GroupPair};

/// Build a flattened 1-D embedding sequence whose pair distances equal
/// `dists` (pair i = positions 2i and 2i+1).
fn embeddings_with_distances(dists: &[f64]) -> Vec<Vec<f64>> {
    let mut embeddings = Vec::with_capacity(dists.len() * 2);
    for &d in dists {
        embeddings.push(vec![0.0]);
        embeddings.push(vec![d.sqrt()]);
    }
    embeddings
}

/// Scenario 1: 100 pairs, matches uniform in [0,1), non-matches uniform in
/// [3,4), alternating so every fold holds both classes. Ten folds must each
/// score perfect accuracy and full TAR.
#[test]
fn separable_distances_score_perfectly() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut dists = Vec::with_capacity(100);
    let mut labels = Vec::with_capacity(100);
    for i in 0..100 {
        let same = i % 2 == 0;
        let d = if same {
            rng.gen_range(0.0..1.0)
        } else {
            rng.gen_range(3.0..4.0)
        };
        dists.push(d);
        labels.push(same);
    }
    let embeddings = embeddings_with_distances(&dists);

    let report = evaluate(&embeddings, &labels, &EvalConfig::default()).unwrap();

    assert_eq!(report.fold_accuracies.len(), 10);
    // The first-maximum tie-break puts each fold's threshold just above the
    // train split's largest match distance, so at most the single largest
    // match in a test split can fall on the wrong side.
    for acc in &report.fold_accuracies {
        assert!(*acc >= 0.8, "fold accuracy {acc}");
    }
    assert!(report.accuracy.mean >= 0.97);
    assert!((report.tar.mean - 1.0).abs() < 1e-12);
    // The interpolated threshold sits just above the train split's smallest
    // non-match distance; a few test non-matches below it are tolerable.
    assert!(report.far_mean < 0.1);
}

/// Scenario 2: every pair at distance exactly 2.0 regardless of label. All
/// thresholds on one side predict everything non-match, all on the other
/// everything match, so accuracy equals the majority-label fraction and the
/// ROC curve collapses to the (0,0)/(1,1) corners.
#[test]
fn degenerate_constant_distance_tracks_majority_label() {
    let dists = vec![2.0; 100];
    // Pattern repeats every 5 pairs: 2 matches, 3 non-matches. With K=5,
    // each fold of 20 holds 8 matches and 12 non-matches.
    let labels: Vec<bool> = (0..100).map(|i| i % 5 < 2).collect();
    let embeddings = embeddings_with_distances(&dists);

    let config = EvalConfig {
        n_folds: 5,
        ..EvalConfig::default()
    };
    let report = evaluate(&embeddings, &labels, &config).unwrap();

    for acc in &report.fold_accuracies {
        assert!((acc - 0.6).abs() < 1e-12, "fold accuracy {acc}");
    }

    // Thresholds at or below 2.0 accept nothing; above 2.0 they accept
    // everything.
    let grid = &report.roc.thresholds;
    for (i, &t) in grid.iter().enumerate() {
        if t <= 2.0 {
            assert_eq!(report.roc.tpr[i], 0.0);
            assert_eq!(report.roc.fpr[i], 0.0);
        } else {
            assert!((report.roc.tpr[i] - 1.0).abs() < 1e-12);
            assert!((report.roc.fpr[i] - 1.0).abs() < 1e-12);
        }
    }

    // The interpolated TAR threshold lands within one grid step of 2.0;
    // whichever side it falls on, the accept decision is all-or-nothing and
    // TAR and FAR collapse together.
    let all_accepted = (report.tar.mean - 1.0).abs() < 1e-12;
    let none_accepted = report.tar.mean.abs() < 1e-12;
    assert!(all_accepted || none_accepted, "tar {}", report.tar.mean);
    assert!((report.tar.mean - report.far_mean).abs() < 1e-12);
}

/// Scenario 3: two enumerated combinations where one has no pairs in the
/// second fold. The empty bucket yields accuracy 0 for that fold and the
/// run completes without error.
#[test]
fn stratified_with_fold_empty_combination() {
    // 20 separable pairs, alternating match/non-match.
    let dists: Vec<f64> = (0..20)
        .map(|i| if i % 2 == 0 { 0.25 } else { 3.5 })
        .collect();
    let labels: Vec<bool> = (0..20).map(|i| i % 2 == 0).collect();
    let embeddings = embeddings_with_distances(&dists);

    // B/B pairs exist only among indices 0..10; the second fold's test set
    // (10..20 under the contiguous split) has none.
    let pair_groups: Vec<GroupPair> = (0..20)
        .map(|i| {
            if i < 10 && i % 2 == 1 {
                GroupPair::new("B", "B")
            } else {
                GroupPair::new("A", "A")
            }
        })
        .collect();
    let combinations = vec![GroupPair::new("A", "A"), GroupPair::new("B", "B")];

    let config = EvalConfig {
        n_folds: 2,
        ..EvalConfig::default()
    };
    let report =
        evaluate_stratified(&embeddings, &labels, &pair_groups, &combinations, &config).unwrap();

    assert!((report.overall.accuracy.mean - 1.0).abs() < 1e-12);

    let bb = report
        .groups
        .iter()
        .find(|g| g.combination == GroupPair::new("B", "B"))
        .expect("B/B combination missing from report");
    // Fold 0: all five B/B pairs classified correctly (accuracy 1.0).
    // Fold 1: empty bucket, accuracy defined as 0.
    assert!((bb.accuracy.mean - 0.5).abs() < 1e-12);
    assert!((bb.accuracy.std - 0.5).abs() < 1e-12);

    let aa = report
        .groups
        .iter()
        .find(|g| g.combination == GroupPair::new("A", "A"))
        .unwrap();
    assert!((aa.accuracy.mean - 1.0).abs() < 1e-12);
}

/// The same seed must reproduce the same shuffled folds and therefore the
/// same report, and the shuffled protocol still separates clean data.
#[test]
fn shuffled_folds_are_seed_reproducible() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut dists = Vec::with_capacity(60);
    let mut labels = Vec::with_capacity(60);
    for i in 0..60 {
        let same = i % 2 == 0;
        dists.push(if same {
            rng.gen_range(0.0..0.5)
        } else {
            rng.gen_range(3.2..3.9)
        });
        labels.push(same);
    }
    let embeddings = embeddings_with_distances(&dists);

    let config = EvalConfig {
        n_folds: 6,
        shuffle: true,
        seed: 99,
        ..EvalConfig::default()
    };
    let first = evaluate(&embeddings, &labels, &config).unwrap();
    let second = evaluate(&embeddings, &labels, &config).unwrap();

    assert_eq!(first.fold_accuracies, second.fold_accuracies);
    assert_eq!(first.tar.mean, second.tar.mean);
    assert!(first.accuracy.mean >= 0.95);
}
