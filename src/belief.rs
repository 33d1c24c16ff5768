//! Beta-distributed belief states.
//!
//! An agent's belief is the pair of Beta shape parameters `(a, b)`: `a`
//! accumulates evidence for the proposition, `b` evidence against it. The
//! scalar opinion is the distribution mean `a / (a + b)`.

use serde::{Deserialize, Serialize};

use crate::error::{MimError, Result};

/// Beta shape parameters of an agent's accumulated evidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeliefState {
    /// Evidence for (alpha).
    pub a: f64,
    /// Evidence against (beta).
    pub b: f64,
}

impl BeliefState {
    /// Create a belief state from raw shape parameters
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    /// Build the belief whose mean is `mean` under the given variance.
    pub fn from_mean(mean: f64, variance: f64) -> Result<Self> {
        let (a, b) = compute_ab(mean, variance)?;
        Ok(Self { a, b })
    }

    /// Scalar opinion, the Beta mean.
    pub fn opinion(&self) -> f64 {
        opinion(self.a, self.b)
    }
}

/// Beta mean `a / (a + b)`, or `0` when the quotient is not finite.
pub fn opinion(a: f64, b: f64) -> f64 {
    let value = a / (a + b);
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Invert a target mean and variance into Beta shape parameters.
///
/// ```text
/// a = -(μ (v + μ² - μ) / v)
/// b = (v + μ² - μ)(μ - 1) / v
/// ```
///
/// Both parameters are positive only when `0 < μ < 1` and `v < μ (1 - μ)`;
/// anything else is rejected instead of leaking NaNs or negative evidence
/// into the simulation.
pub fn compute_ab(mean: f64, variance: f64) -> Result<(f64, f64)> {
    let invalid = || MimError::InvalidBelief { mean, variance };

    if variance.is_nan() || variance <= 0.0 || mean.is_nan() || mean <= 0.0 || mean >= 1.0 {
        return Err(invalid());
    }

    let spread = variance + mean * mean - mean;
    let a = -(mean * spread / variance);
    let b = spread * (mean - 1.0) / variance;

    if a.is_finite() && b.is_finite() && a > 0.0 && b > 0.0 {
        Ok((a, b))
    } else {
        Err(invalid())
    }
}

/// Means whose Beta inversion is valid under `variance`, shrunk by `margin`.
///
/// [`compute_ab`] needs `μ (1 - μ) > v`, i.e. `μ` strictly between the roots
/// of `μ² - μ + v`. Returns `None` when no such mean exists (`v >= 1/4`).
pub fn feasible_means(variance: f64, margin: f64) -> Option<OpinionRange> {
    let discriminant = 1.0 - 4.0 * variance;
    if variance.is_nan() || variance <= 0.0 || discriminant <= 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let low = (1.0 - root) / 2.0 + margin;
    let high = (1.0 + root) / 2.0 - margin;
    (low < high).then_some(OpinionRange::new(low, high))
}

/// Open opinion interval `(low, high)`.
///
/// Used for the moderation "not ban" band, the inoculation trust band and the
/// reinstatement draw range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpinionRange {
    /// Lower bound.
    pub low: f64,
    /// Upper bound.
    pub high: f64,
}

impl OpinionRange {
    /// Create a new range
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// `low < value < high`
    pub fn contains_strict(&self, value: f64) -> bool {
        self.low < value && value < self.high
    }

    /// Check the range is ordered and lies inside `[0, 1]`
    pub fn validate(&self, name: &str) -> Result<()> {
        let ordered = self.low < self.high;
        let bounded = (0.0..=1.0).contains(&self.low) && (0.0..=1.0).contains(&self.high);
        if ordered && bounded {
            Ok(())
        } else {
            Err(MimError::Config(format!(
                "{name} must satisfy 0 <= low < high <= 1, got ({}, {})",
                self.low, self.high
            )))
        }
    }
}

impl Default for OpinionRange {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}
