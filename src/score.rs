//! Affinity scores: topic-specific rank with the popularity trend removed.
//!
//! Popular items rank high under every personalization, so a raw category rank mostly restates
//! the global rank. We fit `category ≈ m * global + b` by ordinary least squares over all items
//! and report how far each item sits above or below that trend:
//!
//! \[
//!   s_i = \frac{c_i}{m g_i + b} - 1
//! \]
//!
//! `0` means "exactly what its popularity predicts", positive means the category over-weights
//! the item, negative means it under-weights it.

use crate::{Error, Result};

/// What to do when the fitted prediction is zero (or, for `Clamp`, too close to zero) at an item.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ZeroPredictionPolicy {
    /// Fail the category with [`Error::ZeroPrediction`].
    #[default]
    Propagate,
    /// Emit `NaN` for the item and keep going.
    Skip,
    /// Raise the prediction's magnitude to at least `floor` at every item, keeping its sign.
    Clamp { floor: f64 },
}

/// What to do when the global rank has (numerically) zero variance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DegenerateFitPolicy {
    /// Fail the category with [`Error::DegenerateFit`].
    #[default]
    Propagate,
    /// Predict the category mean for every item (slope 0), the minimum-norm least-squares fit.
    MeanFallback,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoringConfig {
    pub on_zero_prediction: ZeroPredictionPolicy,
    pub on_degenerate_fit: DegenerateFitPolicy,
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if let ZeroPredictionPolicy::Clamp { floor } = self.on_zero_prediction {
            if !(floor > 0.0 && floor.is_finite()) {
                return Err(Error::InvalidConfig(format!(
                    "clamp floor must be finite and positive, got {floor}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AffineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl AffineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least-squares fit of `y ≈ slope * x + intercept`.
///
/// Fails with [`Error::DegenerateFit`] when `x` is empty or numerically constant.
pub fn fit_affine(x: &[f64], y: &[f64]) -> Result<AffineFit> {
    if x.len() != y.len() {
        return Err(Error::LengthMismatch { expected: x.len(), actual: y.len() });
    }
    if x.is_empty() {
        return Err(Error::DegenerateFit);
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut sum_sq = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        sxx += dx * dx;
        sxy += dx * (yi - mean_y);
        sum_sq += xi * xi;
    }
    if !(sxx > f64::EPSILON * sum_sq) {
        return Err(Error::DegenerateFit);
    }

    let slope = sxy / sxx;
    Ok(AffineFit { slope, intercept: mean_y - slope * mean_x })
}

/// De-trended affinity of every item for one category.
pub fn score(global_rank: &[f64], category_rank: &[f64], config: ScoringConfig) -> Result<Vec<f64>> {
    config.validate()?;
    let fit = match fit_affine(global_rank, category_rank) {
        Ok(fit) => fit,
        Err(Error::DegenerateFit)
            if config.on_degenerate_fit == DegenerateFitPolicy::MeanFallback =>
        {
            let mean = category_rank.iter().sum::<f64>() / category_rank.len().max(1) as f64;
            AffineFit { slope: 0.0, intercept: mean }
        }
        Err(e) => return Err(e),
    };

    global_rank
        .iter()
        .zip(category_rank)
        .enumerate()
        .map(|(item, (&g, &c))| {
            let raw = fit.predict(g);
            let predicted = match config.on_zero_prediction {
                ZeroPredictionPolicy::Clamp { floor } if raw.abs() < floor => floor.copysign(raw),
                ZeroPredictionPolicy::Propagate if raw == 0.0 => {
                    return Err(Error::ZeroPrediction { item });
                }
                ZeroPredictionPolicy::Skip if raw == 0.0 => return Ok(f64::NAN),
                _ => raw,
            };
            Ok(c / predicted - 1.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_trend_items_score_zero() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        let fit = fit_affine(&x, &y).unwrap();
        assert_eq!(fit, AffineFit { slope: 2.0, intercept: 1.0 });
        let s = score(&x, &y, ScoringConfig::default()).unwrap();
        assert_eq!(s, vec![0.0; 4]);
    }

    #[test]
    fn above_trend_is_positive_below_is_negative() {
        let x = [0.1, 0.2, 0.3, 0.4];
        let y = [0.1, 0.5, 0.2, 0.2];
        let fit = fit_affine(&x, &y).unwrap();
        let s = score(&x, &y, ScoringConfig::default()).unwrap();
        for i in 0..4 {
            let residual = y[i] - fit.predict(x[i]);
            assert_eq!(s[i] > 0.0, residual > 0.0, "item {i}");
        }
        assert!(s[1] > 0.0);
    }

    #[test]
    fn constant_global_rank_is_degenerate() {
        let x = [0.25; 4];
        let y = [0.5, 0.5, 0.0, 0.0];
        assert_eq!(score(&x, &y, ScoringConfig::default()), Err(Error::DegenerateFit));
        assert_eq!(fit_affine(&[], &[]), Err(Error::DegenerateFit));
    }

    #[test]
    fn mean_fallback_predicts_category_mean() {
        let cfg = ScoringConfig {
            on_degenerate_fit: DegenerateFitPolicy::MeanFallback,
            ..ScoringConfig::default()
        };
        let s = score(&[0.25; 4], &[0.5, 0.5, 0.0, 0.0], cfg).unwrap();
        assert_eq!(s, vec![1.0, 1.0, -1.0, -1.0]);
    }

    #[test]
    fn zero_prediction_policies() {
        // Fit is exactly y = x, so the prediction at item 0 is 0.
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 2.0];

        let err = score(&x, &y, ScoringConfig::default()).unwrap_err();
        assert_eq!(err, Error::ZeroPrediction { item: 0 });

        let skip = ScoringConfig {
            on_zero_prediction: ZeroPredictionPolicy::Skip,
            ..ScoringConfig::default()
        };
        let s = score(&x, &y, skip).unwrap();
        assert!(s[0].is_nan());
        assert_eq!(&s[1..], &[0.0, 0.0]);

        let clamp = ScoringConfig {
            on_zero_prediction: ZeroPredictionPolicy::Clamp { floor: 1e-3 },
            ..ScoringConfig::default()
        };
        assert_eq!(score(&x, &y, clamp).unwrap()[0], -1.0);
    }

    #[test]
    fn clamp_applies_to_tiny_nonzero_predictions() {
        // Fit is y = x + 1e-12: the prediction at item 0 is tiny but not zero.
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| v + 1e-12).collect();
        let fit = fit_affine(&x, &y).unwrap();
        let p0 = fit.predict(x[0]);
        assert!(p0 != 0.0 && p0.abs() < 1e-3);

        let clamp = ScoringConfig {
            on_zero_prediction: ZeroPredictionPolicy::Clamp { floor: 1e-3 },
            ..ScoringConfig::default()
        };
        let s = score(&x, &y, clamp).unwrap();
        // c / floor - 1 with c = 1e-12.
        assert!((s[0] + 1.0).abs() < 1e-6, "s[0] = {}", s[0]);
        // Predictions above the floor go through unchanged.
        for i in 1..4 {
            assert!(s[i].abs() < 1e-9, "item {i}: {}", s[i]);
        }

        // Propagate only reacts to an exact zero.
        let plain = score(&x, &y, ScoringConfig::default()).unwrap();
        assert!((plain[0] - (y[0] / p0 - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_clamp_floor_and_length_mismatch() {
        let bad = ScoringConfig {
            on_zero_prediction: ZeroPredictionPolicy::Clamp { floor: 0.0 },
            ..ScoringConfig::default()
        };
        assert!(matches!(score(&[1.0, 2.0], &[1.0, 2.0], bad), Err(Error::InvalidConfig(_))));
        assert_eq!(
            score(&[1.0, 2.0], &[1.0], ScoringConfig::default()),
            Err(Error::LengthMismatch { expected: 2, actual: 1 })
        );
    }
}
