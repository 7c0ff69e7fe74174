//! Planner configuration.

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

/// Configuration for the KPIECE planner.
///
/// The score factors and the border fraction must lie in `(ε, 1]` where
/// `ε` is [`f64::EPSILON`]; [`KpieceConfig::validate`] enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpieceConfig {
    /// Probability of consulting the close-sample set for selection
    /// instead of the grid, per iteration. Range `[0, 1]`.
    pub goal_bias: f64,

    /// Minimum fraction of selections taken from exterior (border)
    /// cells. The effective fraction is the maximum of this value and
    /// the current exterior share of the grid. Range `(ε, 1]`.
    pub border_fraction: f64,

    /// Multiplier applied to a cell's score after a productive
    /// expansion (propagation reached the minimum duration).
    /// Range `(ε, 1]`.
    pub good_score_factor: f64,

    /// Multiplier applied to a cell's score after an unproductive
    /// expansion (propagation fell short). Range `(ε, 1]`.
    pub bad_score_factor: f64,

    /// Capacity of the close-sample set used for goal-biased selection.
    pub n_close_samples: usize,
}

impl Default for KpieceConfig {
    fn default() -> Self {
        Self {
            goal_bias: 0.05,
            border_fraction: 0.8,
            good_score_factor: 0.9,
            bad_score_factor: 0.45,
            n_close_samples: 30,
        }
    }
}

impl KpieceConfig {
    /// Check every parameter against its documented range.
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("bad_score_factor", self.bad_score_factor)?;
        check_unit_interval("good_score_factor", self.good_score_factor)?;
        check_unit_interval("border_fraction", self.border_fraction)?;
        if !(0.0..=1.0).contains(&self.goal_bias) {
            return Err(PlannerError::InvalidParameter {
                name: "goal_bias",
                value: self.goal_bias,
                range: "[0, 1]",
            });
        }
        Ok(())
    }
}

fn check_unit_interval(name: &'static str, value: f64) -> Result<()> {
    if value < f64::EPSILON || value > 1.0 {
        return Err(PlannerError::InvalidParameter {
            name,
            value,
            range: "(0, 1]",
        });
    }
    Ok(())
}
