//! Initial agent parameters.
//!
//! The population starts spread evenly over the belief spectrum: the
//! spectrum is cut into `belief_groups` equal intervals, the identities into
//! as many equally sized groups, and every member of group `i` draws its
//! initial mean uniformly from interval `i`. The parameter sets are then
//! shuffled so group membership is unrelated to position in the graph.
//!
//! The spectrum is the band of means the Beta inversion accepts under the
//! configured variance, not the full `[0, 1]`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::agent::AgentParameter;
use crate::belief::{feasible_means, OpinionRange};
use crate::config::Config;
use crate::error::{MimError, Result};

/// Number of bot identities appended after the graph agents
pub const BOT_COUNT: usize = 2;

/// Distance kept from the edges of the feasible band
const SPECTRUM_MARGIN: f64 = 1e-6;

/// Parameter sets for a whole population
#[derive(Debug, Clone, Serialize)]
pub struct PopulationParameters {
    /// One set per graph node, indexed by node id
    pub agents: Vec<AgentParameter>,
    /// Left bot parameters
    pub left_bot: AgentParameter,
    /// Right bot parameters
    pub right_bot: AgentParameter,
}

impl PopulationParameters {
    /// Split `N + 2` parameter sets into agents and the two bots.
    pub fn from_sets(mut sets: Vec<AgentParameter>, agent_count: usize) -> Result<Self> {
        if sets.len() != agent_count + BOT_COUNT {
            return Err(MimError::ParameterCount {
                expected: agent_count + BOT_COUNT,
                actual: sets.len(),
            });
        }
        let right_bot = sets.pop().ok_or(MimError::ParameterCount {
            expected: agent_count + BOT_COUNT,
            actual: 0,
        })?;
        let left_bot = sets.pop().ok_or(MimError::ParameterCount {
            expected: agent_count + BOT_COUNT,
            actual: 1,
        })?;
        Ok(Self {
            agents: sets,
            left_bot,
            right_bot,
        })
    }
}

/// `k` equal-width intervals covering `[low, high]`.
pub fn belief_intervals(low: f64, high: f64, k: usize) -> Vec<OpinionRange> {
    let width = (high - low) / k as f64;
    (0..k)
        .map(|i| {
            let start = low + width * i as f64;
            let end = if i + 1 == k { high } else { start + width };
            OpinionRange::new(start, end)
        })
        .collect()
}

/// Sizes of `k` groups splitting `total` items as evenly as rounding allows.
///
/// Boundaries are the rounded points of an even split of `[0, total]`, so
/// the sizes always sum to `total`.
pub fn group_sizes(total: usize, k: usize) -> Vec<usize> {
    let boundary = |i: usize| (total as f64 * i as f64 / k as f64).round() as usize;
    (0..k).map(|i| boundary(i + 1) - boundary(i)).collect()
}

/// Generate evenly spread parameters for `agent_count` graph agents plus the bots.
pub fn generate_agent_params<R: Rng + ?Sized>(
    rng: &mut R,
    agent_count: usize,
    config: &Config,
) -> Result<PopulationParameters> {
    let variance = config.model.opinion_variance;
    let groups = config.model.belief_groups;
    let spectrum = feasible_means(variance, SPECTRUM_MARGIN)
        .ok_or(MimError::InvalidBelief { mean: 0.5, variance })?;

    let total = agent_count + BOT_COUNT;
    let intervals = belief_intervals(spectrum.low, spectrum.high, groups);

    let mut sets = Vec::with_capacity(total);
    for (interval, size) in intervals.iter().zip(group_sizes(total, groups)) {
        for _ in 0..size {
            let mean = rng.gen_range(interval.low..=interval.high);
            sets.push(AgentParameter::from_mean(mean, variance)?.with_run(&config.run));
        }
    }
    sets.shuffle(rng);

    tracing::debug!(
        "Generated {} parameter sets over [{:.4}, {:.4}] in {} groups",
        sets.len(),
        spectrum.low,
        spectrum.high,
        groups
    );

    PopulationParameters::from_sets(sets, agent_count)
}
