//! Cross-validation splitters and the hold-out split

use crate::error::{MlopsError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Contiguous folds in row order
    KFold { n_splits: usize },
    /// Per-class contiguous folds, preserving class proportions
    StratifiedKFold { n_splits: usize },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5 }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Deterministic splitter; no shuffling, so the same labels always give the same folds
pub struct CrossValidator {
    strategy: CVStrategy,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self { strategy }
    }

    pub fn stratified(n_splits: usize) -> Self {
        Self::new(CVStrategy::StratifiedKFold { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        match self.strategy {
            CVStrategy::KFold { n_splits } | CVStrategy::StratifiedKFold { n_splits } => n_splits,
        }
    }

    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        let n_splits = self.n_splits();
        if n_splits < 2 {
            return Err(MlopsError::Validation("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(MlopsError::Validation(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let fold_of: Vec<usize> = match self.strategy {
            CVStrategy::KFold { .. } => {
                let mut folds = vec![0; n_samples];
                assign_chunks(&(0..n_samples).collect::<Vec<_>>(), n_splits, &mut folds);
                folds
            }
            CVStrategy::StratifiedKFold { .. } => {
                let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
                for (idx, &val) in y.iter().enumerate() {
                    by_class.entry(val.round() as i64).or_default().push(idx);
                }
                if let Some(min) = by_class.values().map(Vec::len).min() {
                    if min < n_splits {
                        warn!(least_populated = min, n_splits, "A class has fewer members than folds");
                    }
                }

                let mut folds = vec![0; n_samples];
                for members in by_class.values() {
                    assign_chunks(members, n_splits, &mut folds);
                }
                folds
            }
        };

        Ok((0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&i| fold_of[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }
}

/// Split `members` (in order) into `n_splits` contiguous chunks whose sizes
/// differ by at most one, larger chunks first
fn assign_chunks(members: &[usize], n_splits: usize, folds: &mut [usize]) {
    let base = members.len() / n_splits;
    let remainder = members.len() % n_splits;
    let mut pos = 0;
    for fold in 0..n_splits {
        let size = if fold < remainder { base + 1 } else { base };
        for &idx in &members[pos..pos + size] {
            folds[idx] = fold;
        }
        pos += size;
    }
}

/// Seeded shuffled hold-out split. The test part has `ceil(test_size * n)` rows.
/// Returns `(train_indices, test_indices)`.
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(MlopsError::Validation(format!("test_size must be in (0, 1), got {}", test_size)));
    }
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(MlopsError::Validation(format!(
            "cannot hold out {} of {} rows",
            n_test, n_samples
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut rng);

    let test = indices[..n_test].to_vec();
    let train = indices[n_test..].to_vec();
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_kfold_contiguous() {
        let y = Array1::zeros(10);
        let splits = CrossValidator::new(CVStrategy::KFold { n_splits: 3 }).split(&y).unwrap();
        assert_eq!(splits[0].test_indices, vec![0, 1, 2, 3]);
        assert_eq!(splits[1].test_indices, vec![4, 5, 6]);
        assert_eq!(splits[2].test_indices, vec![7, 8, 9]);
        assert_eq!(splits[0].train_indices.len(), 6);
    }

    #[test]
    fn test_stratified_preserves_proportions() {
        let y = array![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let splits = CrossValidator::stratified(2).split(&y).unwrap();

        for split in &splits {
            let pos = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(pos, 3);
            assert_eq!(split.test_indices.len(), 5);
        }
    }

    #[test]
    fn test_stratified_is_deterministic() {
        let y = array![1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let a = CrossValidator::stratified(3).split(&y).unwrap();
        let b = CrossValidator::stratified(3).split(&y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_row_is_tested_once() {
        let y = array![1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
        let splits = CrossValidator::stratified(3).split(&y).unwrap();
        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort();
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_too_few_samples() {
        let y = array![1.0, 0.0];
        assert!(CrossValidator::stratified(5).split(&y).is_err());
    }

    #[test]
    fn test_train_test_split() {
        let (train, test) = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);

        let (train2, test2) = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(train, train2);
        assert_eq!(test, test2);

        let mut all: Vec<usize> = train.into_iter().chain(test).collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_train_test_split_rounds_up() {
        let (_, test) = train_test_split(11, 0.2, 1).unwrap();
        assert_eq!(test.len(), 3);
    }
}
