//! Agents and the belief-update rule.
//!
//! Every agent owns a [`BeliefState`]. Activation is split in two phases so a
//! step can read the whole population while deciding what one agent does:
//!
//! 1. [`Agent::plan`] reads the agent, its sampled neighbors and the random
//!    stream, and returns an [`Activation`]
//! 2. [`Agent::apply`] commits that activation to the agent
//!
//! Agent variants differ in two places only:
//!
//! | Type                         | Update                        | Neighbor policy              |
//! |------------------------------|-------------------------------|------------------------------|
//! | Regular                      | social update + truth signal  | sampled graph neighbors      |
//! | Left/RightBotFollower        | social update + truth signal  | graph neighbors + their bot  |
//! | LeftBot / RightBot           | flood one parameter           | none                         |

pub mod moderation;
pub mod sampler;

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub use moderation::{BanState, Moderation, ModerationStep};
pub use sampler::{sample_neighbors, Neighbor, PeerState, PeerView};

use crate::belief::{BeliefState, OpinionRange};
use crate::config::{Experiment, ModelConfig, RunConfig};
use crate::error::Result;
use crate::network::SocialGraph;

/// Agent identifier, dense within one model run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub usize);

impl AgentId {
    /// Position in the population vector
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent#{}", self.0)
    }
}

/// Agent variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    /// Listens to graph neighbors only
    Regular,
    /// Also listens to the left bot
    LeftBotFollower,
    /// Also listens to the right bot
    RightBotFollower,
    /// Floods evidence against (pushes opinions toward 0)
    LeftBot,
    /// Floods evidence for (pushes opinions toward 1)
    RightBot,
}

impl AgentType {
    /// LeftBot or RightBot
    pub fn is_bot(self) -> bool {
        matches!(self, Self::LeftBot | Self::RightBot)
    }

    /// LeftBotFollower or RightBotFollower
    pub fn follows_bot(self) -> bool {
        matches!(self, Self::LeftBotFollower | Self::RightBotFollower)
    }

    /// Short label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::LeftBotFollower => "left-follower",
            Self::RightBotFollower => "right-follower",
            Self::LeftBot => "left-bot",
            Self::RightBot => "right-bot",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Construction-time parameters for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentParameter {
    /// Initial evidence for
    pub a: f64,
    /// Initial evidence against
    pub b: f64,
    /// Experiment the agent takes part in
    pub experiment: Experiment,
    /// Per-step flooding (bots only)
    pub flooding_capacity: f64,
    /// Trusted band if the agent ends up inoculated
    pub inoculation_range: OpinionRange,
}

impl AgentParameter {
    /// Parameters from raw shape values, with baseline run settings
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            a,
            b,
            experiment: Experiment::Baseline,
            flooding_capacity: 0.0,
            inoculation_range: OpinionRange::default(),
        }
    }

    /// Parameters whose initial opinion is `mean`
    pub fn from_mean(mean: f64, variance: f64) -> Result<Self> {
        let belief = BeliefState::from_mean(mean, variance)?;
        Ok(Self::new(belief.a, belief.b))
    }

    /// Stamp the run-level settings onto these parameters
    pub fn with_run(mut self, run: &RunConfig) -> Self {
        self.experiment = run.experiment;
        self.flooding_capacity = run.flooding_capacity;
        self.inoculation_range = run.inoculation_range;
        self
    }
}

/// Read-only inputs shared by every activation in a step
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Model constants
    pub config: &'a ModelConfig,
    /// Evidence pair of one unbiased signal
    pub truth_evidence: BeliefState,
    /// Static topology
    pub graph: &'a SocialGraph,
    /// Moderation applies this step
    pub moderation_active: bool,
}

/// Outcome of one activation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    /// New belief from the update rule (or bot flooding)
    Update(BeliefState),
    /// Agent gets banned, belief frozen
    Ban,
    /// Agent stays banned, belief frozen
    Sleep,
    /// Ban lifted with a freshly drawn belief
    Reinstate(BeliefState),
}

/// A member of the simulated population
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    unique_id: AgentId,
    agent_type: AgentType,
    belief: BeliefState,
    influence_of_friends: f64,
    flooding_capacity: f64,
    bot_followed: Vec<AgentId>,
    moderated: bool,
    moderation: Moderation,
    inoculated: bool,
    inoculation_range: OpinionRange,
}

impl Agent {
    /// Build an agent from its parameter set.
    ///
    /// Bots are never moderated, whatever the experiment.
    pub fn new(
        unique_id: AgentId,
        agent_type: AgentType,
        param: &AgentParameter,
        influence_of_friends: f64,
        sleep_count: u32,
    ) -> Self {
        Self {
            unique_id,
            agent_type,
            belief: BeliefState::new(param.a, param.b),
            influence_of_friends,
            flooding_capacity: param.flooding_capacity,
            bot_followed: Vec::new(),
            moderated: param.experiment.moderates() && !agent_type.is_bot(),
            moderation: Moderation::new(sleep_count),
            inoculated: false,
            inoculation_range: param.inoculation_range,
        }
    }

    /// Get agent ID
    pub fn unique_id(&self) -> AgentId {
        self.unique_id
    }

    /// Get agent type
    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    /// Current belief
    pub fn belief(&self) -> BeliefState {
        self.belief
    }

    /// Current opinion
    pub fn opinion(&self) -> f64 {
        self.belief.opinion()
    }

    /// Weight given to neighbor evidence
    pub fn influence_of_friends(&self) -> f64 {
        self.influence_of_friends
    }

    /// Per-step flooding of a bot
    pub fn flooding_capacity(&self) -> f64 {
        self.flooding_capacity
    }

    /// Bots this agent follows
    pub fn bot_followed(&self) -> &[AgentId] {
        &self.bot_followed
    }

    /// Check if the agent is banned
    pub fn is_banned(&self) -> bool {
        self.moderation.is_banned()
    }

    /// Remaining ban countdown
    pub fn sleep_count(&self) -> u32 {
        self.moderation.sleep_count()
    }

    /// Current moderation state
    pub fn ban_state(&self) -> BanState {
        self.moderation.state()
    }

    /// Subject to moderation when it is active
    pub fn is_moderated(&self) -> bool {
        self.moderated
    }

    /// Check if the agent is inoculated
    pub fn is_inoculated(&self) -> bool {
        self.inoculated
    }

    /// Trusted band used when inoculated
    pub fn inoculation_range(&self) -> OpinionRange {
        self.inoculation_range
    }

    /// What other agents see of this one
    pub fn peer_state(&self) -> PeerState {
        PeerState {
            belief: self.belief,
            banned: self.is_banned(),
        }
    }

    /// Turn this agent into a follower of `bot`
    pub fn follow_bot(&mut self, follower_type: AgentType, bot: AgentId) {
        self.agent_type = follower_type;
        self.bot_followed.push(bot);
    }

    /// Restrict attention to `range`
    pub fn inoculate(&mut self, range: OpinionRange) {
        self.inoculated = true;
        self.inoculation_range = range;
    }

    /// Overwrite the belief (scenario setup)
    pub fn set_belief(&mut self, belief: BeliefState) {
        self.belief = belief;
    }

    /// Decide this activation's outcome without mutating anything.
    pub fn plan<P, R>(&self, ctx: &StepContext<'_>, peers: &P, rng: &mut R) -> Activation
    where
        P: PeerView + ?Sized,
        R: Rng + ?Sized,
    {
        if self.agent_type.is_bot() {
            return Activation::Update(self.flood());
        }

        if ctx.moderation_active && self.moderated {
            let extreme = !ctx.config.not_ban_range.contains_strict(self.opinion());
            match self.moderation.plan(extreme) {
                ModerationStep::Update => {},
                ModerationStep::Ban => return Activation::Ban,
                ModerationStep::Sleep => return Activation::Sleep,
                ModerationStep::Reinstate => {
                    return Activation::Reinstate(self.fresh_belief(ctx.config, rng));
                },
            }
        }

        Activation::Update(self.social_update(ctx, peers, rng))
    }

    /// Commit a planned activation.
    pub fn apply(&mut self, activation: Activation) {
        match activation {
            Activation::Update(belief) => self.belief = belief,
            Activation::Ban => self.moderation.apply(ModerationStep::Ban),
            Activation::Sleep => self.moderation.apply(ModerationStep::Sleep),
            Activation::Reinstate(belief) => {
                self.moderation.apply(ModerationStep::Reinstate);
                self.belief = belief;
            },
        }
    }

    /// Bots ignore the network and the truth; they only push one parameter.
    fn flood(&self) -> BeliefState {
        let mut belief = self.belief;
        match self.agent_type {
            AgentType::LeftBot => belief.b += self.flooding_capacity,
            AgentType::RightBot => belief.a += self.flooding_capacity,
            _ => {},
        }
        belief
    }

    /// Weighted average of own-plus-truth evidence and mean neighbor evidence.
    ///
    /// With nobody heard this step the weight collapses to zero, so the agent
    /// relies on itself and the truth signal alone.
    fn social_update<P, R>(&self, ctx: &StepContext<'_>, peers: &P, rng: &mut R) -> BeliefState
    where
        P: PeerView + ?Sized,
        R: Rng + ?Sized,
    {
        let neighbors =
            sample_neighbors(self, ctx.graph, peers, ctx.config.communication_speed, rng);

        let (w, a_bar, b_bar) = if neighbors.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let n = neighbors.len() as f64;
            let a_sum: f64 = neighbors.iter().map(|n| n.belief.a).sum();
            let b_sum: f64 = neighbors.iter().map(|n| n.belief.b).sum();
            (self.influence_of_friends, a_sum / n, b_sum / n)
        };

        let truth = learn_truth(ctx, rng);

        BeliefState::new(
            (1.0 - w) * (self.belief.a + truth.a) + w * a_bar,
            (1.0 - w) * (self.belief.b + truth.b) + w * b_bar,
        )
    }

    fn fresh_belief<R: Rng + ?Sized>(&self, config: &ModelConfig, rng: &mut R) -> BeliefState {
        let range = config.reinstatement_range;
        let mean = rng.gen_range(range.low..=range.high);
        // Endpoints are validated with the config, so interior means always invert
        BeliefState::from_mean(mean, config.opinion_variance).unwrap_or(self.belief)
    }
}

/// One Bernoulli draw: the unbiased signal, or no evidence at all.
fn learn_truth<R: Rng + ?Sized>(ctx: &StepContext<'_>, rng: &mut R) -> BeliefState {
    if rng.gen_bool(ctx.config.truth_signal_probability) {
        ctx.truth_evidence
    } else {
        BeliefState::new(0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::network::build_ring_network;

    fn fixture(config: &ModelConfig) -> (SocialGraph, BeliefState) {
        let graph = SocialGraph::from_petgraph(&build_ring_network(4, 2)).unwrap();
        (graph, config.truth_evidence().unwrap())
    }

    fn agent(id: usize, a: f64, b: f64) -> Agent {
        Agent::new(AgentId(id), AgentType::Regular, &AgentParameter::new(a, b), 0.5, 3)
    }

    #[test]
    fn test_update_averages_neighbor_evidence() {
        let config = ModelConfig {
            communication_speed: 1.0,
            truth_signal_probability: 0.0,
            ..Default::default()
        };
        let (graph, truth_evidence) = fixture(&config);
        let ctx = StepContext {
            config: &config,
            truth_evidence,
            graph: &graph,
            moderation_active: false,
        };
        let agents = vec![
            agent(0, 2.0, 2.0),
            agent(1, 4.0, 0.0),
            agent(2, 1.0, 1.0),
            agent(3, 0.0, 8.0),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        // Neighbors of 0 are 1 and 3: a_bar = 2, b_bar = 4
        let activation = agents[0].plan(&ctx, agents.as_slice(), &mut rng);
        assert_eq!(activation, Activation::Update(BeliefState::new(2.0, 3.0)));
    }

    #[test]
    fn test_isolated_agent_takes_truth_only() {
        let config = ModelConfig {
            communication_speed: 0.0,
            truth_signal_probability: 1.0,
            ..Default::default()
        };
        let (graph, truth_evidence) = fixture(&config);
        let ctx = StepContext {
            config: &config,
            truth_evidence,
            graph: &graph,
            moderation_active: false,
        };
        let agents = vec![agent(0, 1.0, 3.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let activation = agents[0].plan(&ctx, agents.as_slice(), &mut rng);
        assert_eq!(
            activation,
            Activation::Update(BeliefState::new(1.0 + truth_evidence.a, 3.0 + truth_evidence.b))
        );
    }

    #[test]
    fn test_bots_flood_one_side() {
        let config = ModelConfig::default();
        let (graph, truth_evidence) = fixture(&config);
        let ctx = StepContext {
            config: &config,
            truth_evidence,
            graph: &graph,
            moderation_active: true,
        };
        let mut param = AgentParameter::new(1.0, 1.0);
        param.flooding_capacity = 5.0;
        param.experiment = Experiment::Ban;
        let left = Agent::new(AgentId(4), AgentType::LeftBot, &param, 0.5, 3);
        let right = Agent::new(AgentId(5), AgentType::RightBot, &param, 0.5, 3);
        assert!(!left.is_moderated());
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let peers: Vec<Agent> = Vec::new();

        assert_eq!(
            left.plan(&ctx, peers.as_slice(), &mut rng),
            Activation::Update(BeliefState::new(1.0, 6.0))
        );
        assert_eq!(
            right.plan(&ctx, peers.as_slice(), &mut rng),
            Activation::Update(BeliefState::new(6.0, 1.0))
        );
    }

    #[test]
    fn test_extreme_agent_is_banned_and_frozen() {
        let config = ModelConfig::default();
        let (graph, truth_evidence) = fixture(&config);
        let ctx = StepContext {
            config: &config,
            truth_evidence,
            graph: &graph,
            moderation_active: true,
        };
        let mut param = AgentParameter::new(19.0, 1.0);
        param.experiment = Experiment::Ban;
        let mut extreme = Agent::new(AgentId(0), AgentType::Regular, &param, 0.5, 2);
        let before = extreme.belief();
        let peers = vec![extreme.clone()];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let activation = extreme.plan(&ctx, peers.as_slice(), &mut rng);
        assert_eq!(activation, Activation::Ban);
        extreme.apply(activation);
        assert!(extreme.is_banned());
        assert_eq!(extreme.belief(), before);
        assert_eq!(extreme.sleep_count(), 1);
    }

    #[test]
    fn test_reinstated_belief_inside_range() {
        let config = ModelConfig {
            sleep_count: 0,
            ..Default::default()
        };
        let (graph, truth_evidence) = fixture(&config);
        let ctx = StepContext {
            config: &config,
            truth_evidence,
            graph: &graph,
            moderation_active: true,
        };
        let mut param = AgentParameter::new(1.0, 19.0);
        param.experiment = Experiment::Ban;
        let mut agent = Agent::new(AgentId(0), AgentType::Regular, &param, 0.5, 0);
        let peers: Vec<Agent> = Vec::new();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let ban = agent.plan(&ctx, peers.as_slice(), &mut rng);
        agent.apply(ban);
        let activation = agent.plan(&ctx, peers.as_slice(), &mut rng);
        assert!(matches!(activation, Activation::Reinstate(_)));
        agent.apply(activation);

        assert!(!agent.is_banned());
        let opinion = agent.opinion();
        assert!((0.2..=0.8).contains(&opinion), "opinion {opinion}");
    }

    #[test]
    fn test_baseline_agent_never_moderated() {
        let agent = agent(0, 99.0, 1.0);
        assert!(!agent.is_moderated());
    }
}
