//! Population metrics.
//!
//! Pure functions of agent state. Every metric is taken over the whole
//! population, bots included, unless it names a subpopulation. Empty
//! populations and empty subpopulations yield `0`.
//!
//! ## Polarization
//!
//! Esteban-Ray style index over `K` equal-width bins spanning the observed
//! opinion range:
//!
//! ```text
//! Pol = Σ_i Σ_j  k · r_i^(1+α) · r_j · |μ_i - μ_j|,   α = 0.5,  k = 1 / (2 · 0.5^(2+α))
//! ```
//!
//! where `r_i` is the share of agents in bin `i` and `μ_i` their mean opinion.
//! Bins are closed and an opinion on a shared boundary goes to the lower bin.
//! Empty bins have no mean and contribute nothing. The normalization puts two
//! equal camps at opinions 0 and 1 at exactly `Pol = 1`.

pub mod collector;

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId, AgentType};

/// Esteban-Ray polarization sensitivity
pub const ALPHA: f64 = 0.5;

/// Mean squared distance of opinions from the truth
pub fn misinformation(agents: &[Agent], truth: f64) -> f64 {
    mean(agents.iter().map(|a| (a.opinion() - truth).powi(2)))
}

/// Mean opinion of any set of agents
pub fn average_opinion<'a>(agents: impl IntoIterator<Item = &'a Agent>) -> f64 {
    mean(agents.into_iter().map(Agent::opinion))
}

/// Mean opinion of the agents following `bot`
pub fn average_opinion_following(agents: &[Agent], bot: AgentId) -> f64 {
    average_opinion(agents.iter().filter(|a| a.bot_followed().contains(&bot)))
}

/// Mean opinion of regular agents
pub fn average_opinion_regular(agents: &[Agent]) -> f64 {
    average_opinion(agents.iter().filter(|a| a.agent_type() == AgentType::Regular))
}

/// Polarization index of the population's opinions
pub fn population_polarization(agents: &[Agent], groups: usize) -> f64 {
    let opinions: Vec<f64> = agents.iter().map(Agent::opinion).collect();
    polarization(&opinions, groups)
}

/// Esteban-Ray polarization of `opinions` binned into `groups` bins.
pub fn polarization(opinions: &[f64], groups: usize) -> f64 {
    if opinions.is_empty() || groups == 0 {
        return 0.0;
    }

    let min = opinions.iter().copied().fold(f64::INFINITY, f64::min);
    let max = opinions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / groups as f64;

    let mut counts = vec![0usize; groups];
    let mut sums = vec![0.0f64; groups];

    for &opinion in opinions {
        let bin = (0..groups).find(|&i| {
            let low = min + width * i as f64;
            let high = if i + 1 == groups { max } else { min + width * (i + 1) as f64 };
            low <= opinion && opinion <= high
        });
        if let Some(bin) = bin {
            counts[bin] += 1;
            sums[bin] += opinion;
        }
    }

    let total = opinions.len() as f64;
    let k = 1.0 / (2.0 * 0.5f64.powf(2.0 + ALPHA));

    let occupied: Vec<(f64, f64)> = counts
        .iter()
        .zip(&sums)
        .filter(|(&count, _)| count > 0)
        .map(|(&count, &sum)| (count as f64 / total, sum / count as f64))
        .collect();

    let mut pol = 0.0;
    for &(ratio_i, mean_i) in &occupied {
        for &(ratio_j, mean_j) in &occupied {
            pol += k * ratio_i.powf(1.0 + ALPHA) * ratio_j * (mean_i - mean_j).abs();
        }
    }
    pol
}

/// Head counts by agent type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCounts {
    /// Followers of either bot
    pub num_bot_followers: usize,
    /// Left bot followers
    pub num_l_followers: usize,
    /// Right bot followers
    pub num_r_followers: usize,
    /// Regular agents
    pub num_regular_agents: usize,
}

/// Count agents by type
pub fn count_population(agents: &[Agent]) -> PopulationCounts {
    let mut counts = PopulationCounts::default();
    for agent in agents {
        match agent.agent_type() {
            AgentType::Regular => counts.num_regular_agents += 1,
            AgentType::LeftBotFollower => counts.num_l_followers += 1,
            AgentType::RightBotFollower => counts.num_r_followers += 1,
            AgentType::LeftBot | AgentType::RightBot => {},
        }
    }
    counts.num_bot_followers = counts.num_l_followers + counts.num_r_followers;
    counts
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentParameter;

    fn agent(id: usize, a: f64, b: f64) -> Agent {
        Agent::new(AgentId(id), AgentType::Regular, &AgentParameter::new(a, b), 0.5, 3)
    }

    #[test]
    fn test_polarization_two_camps_is_one() {
        for groups in [2, 7, 10] {
            let pol = polarization(&[0.0, 0.0, 1.0, 1.0], groups);
            assert!((pol - 1.0).abs() < 1e-12, "groups {groups}: {pol}");
        }
    }

    #[test]
    fn test_polarization_consensus_is_zero() {
        assert_eq!(polarization(&[0.4, 0.4, 0.4], 10), 0.0);
        assert_eq!(polarization(&[], 10), 0.0);
    }

    #[test]
    fn test_polarization_unequal_camps() {
        // r = (0.25, 0.75): k * (0.25^1.5 * 0.75 + 0.75^1.5 * 0.25)
        let pol = polarization(&[0.0, 1.0, 1.0, 1.0], 2);
        let k = 1.0 / (2.0 * 0.5f64.powf(2.5));
        let expected = k * (0.25f64.powf(1.5) * 0.75 + 0.75f64.powf(1.5) * 0.25);
        assert!((pol - expected).abs() < 1e-12);
        assert!(pol < 1.0);
    }

    #[test]
    fn test_boundary_opinion_goes_to_lower_bin() {
        // 0.5 sits on the boundary of two bins over [0, 1]; joining the low
        // camp makes the camps (0, 0.5) vs (1)
        let pol = polarization(&[0.0, 0.5, 1.0], 2);
        let k = 1.0 / (2.0 * 0.5f64.powf(2.5));
        let low = (2.0f64 / 3.0, 0.25f64);
        let high = (1.0f64 / 3.0, 1.0f64);
        let expected = k
            * (low.0.powf(1.5) * high.0 * (low.1 - high.1).abs()
                + high.0.powf(1.5) * low.0 * (high.1 - low.1).abs());
        assert!((pol - expected).abs() < 1e-12);
    }

    #[test]
    fn test_misinformation() {
        let agents = vec![agent(0, 1.0, 1.0), agent(1, 3.0, 1.0)];
        // (0.5 - 0.5)^2 = 0, (0.75 - 0.5)^2 = 0.0625
        assert!((misinformation(&agents, 0.5) - 0.03125).abs() < 1e-12);
        assert_eq!(misinformation(&agents[..1], 0.5), 0.0);
        assert_eq!(misinformation(&[], 0.5), 0.0);
    }

    #[test]
    fn test_subpopulation_averages() {
        let mut agents = vec![agent(0, 1.0, 3.0), agent(1, 3.0, 1.0), agent(2, 1.0, 1.0)];
        agents[0].follow_bot(AgentType::LeftBotFollower, AgentId(3));
        agents[1].follow_bot(AgentType::RightBotFollower, AgentId(4));

        assert_eq!(average_opinion_following(&agents, AgentId(3)), 0.25);
        assert_eq!(average_opinion_following(&agents, AgentId(4)), 0.75);
        assert_eq!(average_opinion_following(&agents, AgentId(9)), 0.0);
        assert_eq!(average_opinion_regular(&agents), 0.5);
        assert_eq!(average_opinion(&agents), 0.5);

        let counts = count_population(&agents);
        assert_eq!(counts.num_bot_followers, 2);
        assert_eq!(counts.num_l_followers, 1);
        assert_eq!(counts.num_r_followers, 1);
        assert_eq!(counts.num_regular_agents, 1);
    }
}
