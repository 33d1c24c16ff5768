//! Simulation model.
//!
//! The [`Model`] owns the graph, the population, the run's random stream and
//! the data collector. Each [`Model::step`]:
//!
//! 1. snapshots the metrics of the current state
//! 2. draws a fresh activation order from the [`Scheduler`]
//! 3. activates every agent once in that order
//!
//! # Identities
//!
//! Graph nodes `0..N` become agents with the same ids. The left bot is `N`,
//! the right bot `N + 1`. Bots have no graph edges; they are only reached
//! through the followers that list them in `bot_followed`.
//!
//! # Update order
//!
//! In [`UpdateMode::Asynchronous`] agents read their neighbors' current
//! beliefs, including changes made earlier in the same step, so the outcome
//! of a step depends on the drawn order. [`UpdateMode::Synchronous`] reads a
//! snapshot taken before the first activation instead.

pub mod scheduler;

use std::fmt::Write as _;

use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub use scheduler::Scheduler;

use crate::agent::{Activation, Agent, AgentId, AgentParameter, AgentType, PeerState, StepContext};
use crate::belief::BeliefState;
use crate::config::{Config, UpdateMode};
use crate::error::{MimError, Result};
use crate::metrics::collector::{AgentRecord, DataCollector, ModelRecord, SimulationReport};
use crate::network::SocialGraph;
use crate::params::{generate_agent_params, PopulationParameters};

/// One simulation run
#[derive(Debug, Clone)]
pub struct Model {
    config: Config,
    truth_evidence: BeliefState,
    graph: SocialGraph,
    agents: Vec<Agent>,
    scheduler: Scheduler,
    rng: ChaCha8Rng,
    step_index: u64,
    banned_count: usize,
    left_bot: AgentId,
    right_bot: AgentId,
    collector: DataCollector,
}

impl Model {
    /// Build a model from externally supplied parameters.
    pub fn new(graph: SocialGraph, params: PopulationParameters, config: Config) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.run.seed);
        Self::with_rng(graph, params, config, rng)
    }

    /// Build a model whose initial beliefs are generated from the run seed.
    pub fn from_seed(graph: SocialGraph, config: Config) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.run.seed);
        let params = generate_agent_params(&mut rng, graph.node_count(), &config)?;
        Self::with_rng(graph, params, config, rng)
    }

    fn with_rng(
        graph: SocialGraph,
        params: PopulationParameters,
        config: Config,
        mut rng: ChaCha8Rng,
    ) -> Result<Self> {
        config.validate()?;
        let truth_evidence = config.model.truth_evidence()?;

        let n = graph.node_count();
        if params.agents.len() != n {
            return Err(MimError::ParameterCount {
                expected: n,
                actual: params.agents.len(),
            });
        }

        for (i, param) in params.agents.iter().enumerate() {
            check_parameter(param, &AgentId(i).to_string())?;
        }
        check_parameter(&params.left_bot, "left bot")?;
        check_parameter(&params.right_bot, "right bot")?;

        let influence = config.model.influence_of_friends;
        let sleep_count = config.model.sleep_count;

        // Run settings are authoritative over whatever the provider stamped
        let build = |id: AgentId, agent_type: AgentType, param: AgentParameter| {
            Agent::new(id, agent_type, &param.with_run(&config.run), influence, sleep_count)
        };

        let left_bot = AgentId(n);
        let right_bot = AgentId(n + 1);
        let mut agents: Vec<Agent> = params
            .agents
            .into_iter()
            .enumerate()
            .map(|(i, param)| build(AgentId(i), AgentType::Regular, param))
            .collect();
        agents.push(build(left_bot, AgentType::LeftBot, params.left_bot));
        agents.push(build(right_bot, AgentType::RightBot, params.right_bot));

        // Followers pick the bot on their side of the spectrum
        let follower_count = share_of(config.run.bot_follower_percentage, n);
        for i in index::sample(&mut rng, n, follower_count) {
            let agent = &mut agents[i];
            if agent.opinion() < 0.5 {
                agent.follow_bot(AgentType::LeftBotFollower, left_bot);
            } else {
                agent.follow_bot(AgentType::RightBotFollower, right_bot);
            }
        }

        let mut inoculated = 0;
        if config.run.experiment.inoculates() {
            inoculated = share_of(config.run.inoculation_rate, n);
            for i in index::sample(&mut rng, n, inoculated) {
                let range = agents[i].inoculation_range();
                agents[i].inoculate(range);
            }
        }

        tracing::info!(
            "Model built: {} agents ({} nodes, {} edges), {} bot followers, {} inoculated, experiment {}",
            agents.len(),
            n,
            graph.edge_count(),
            follower_count,
            inoculated,
            config.run.experiment
        );

        let scheduler = Scheduler::new(agents.len());

        Ok(Self {
            config,
            truth_evidence,
            graph,
            agents,
            scheduler,
            rng,
            step_index: 0,
            banned_count: 0,
            left_bot,
            right_bot,
            collector: DataCollector::default(),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the graph
    pub fn graph(&self) -> &SocialGraph {
        &self.graph
    }

    /// All agents, indexed by id
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Look up an agent; unknown ids give `None`.
    pub fn get_agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id.index())
    }

    /// Mutable lookup, for scenario setup
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id.index())
    }

    /// Left bot id
    pub fn left_bot(&self) -> AgentId {
        self.left_bot
    }

    /// Right bot id
    pub fn right_bot(&self) -> AgentId {
        self.right_bot
    }

    /// Steps completed so far
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    /// Bans since the counter was last read, without resetting it
    pub fn banned_count(&self) -> usize {
        self.banned_count
    }

    /// Read and reset the ban counter.
    pub fn take_banned_count(&mut self) -> usize {
        std::mem::take(&mut self.banned_count)
    }

    /// Whether the ban state machine runs at the current step
    pub fn moderation_active(&self) -> bool {
        self.config.run.experiment.moderates() && self.step_index >= self.config.run.activation_delay
    }

    /// Collected metrics so far
    pub fn collector(&self) -> &DataCollector {
        &self.collector
    }

    /// Record metrics, then activate every agent once in a random order.
    pub fn step(&mut self) {
        self.collect();
        let order = self.scheduler.next_order(&mut self.rng);
        self.activate(&order);
    }

    /// Activate agents in the given order without collecting metrics.
    ///
    /// Ids not in the population are skipped.
    pub fn step_with_order(&mut self, order: &[AgentId]) {
        self.activate(order);
    }

    /// Run `num_steps` steps.
    pub fn run(&mut self, num_steps: u64) {
        for _ in 0..num_steps {
            self.step();
        }
        tracing::info!(
            "Run finished at step {}: {} model records, {} agent records",
            self.step_index,
            self.collector.model_records().len(),
            self.collector.agent_records().len()
        );
    }

    /// Run the configured number of steps and hand back the report.
    pub fn run_to_report(mut self) -> SimulationReport {
        let steps = self.config.run.num_steps;
        self.run(steps);
        self.into_report()
    }

    /// Consume the model into its report
    pub fn into_report(self) -> SimulationReport {
        self.collector.into_report(self.config)
    }

    fn collect(&mut self) {
        let accounts_banned = self.take_banned_count();
        let record = ModelRecord::capture(self, accounts_banned);

        let interval = self.config.model.agent_sample_interval;
        let agent_records = if self.config.run.collect_agent_data && self.step_index % interval == 0 {
            AgentRecord::capture(self.step_index, &self.agents)
        } else {
            Vec::new()
        };

        self.collector.push(record, agent_records);
    }

    fn activate(&mut self, order: &[AgentId]) {
        let moderation_active = self.moderation_active();
        let ctx = StepContext {
            config: &self.config.model,
            truth_evidence: self.truth_evidence,
            graph: &self.graph,
            moderation_active,
        };

        let snapshot: Option<Vec<PeerState>> = match self.config.model.update_mode {
            UpdateMode::Synchronous => Some(self.agents.iter().map(Agent::peer_state).collect()),
            UpdateMode::Asynchronous => None,
        };

        for &id in order {
            let Some(agent) = self.agents.get(id.index()) else {
                continue;
            };

            let activation = match &snapshot {
                Some(peers) => agent.plan(&ctx, peers.as_slice(), &mut self.rng),
                None => agent.plan(&ctx, self.agents.as_slice(), &mut self.rng),
            };

            match activation {
                Activation::Ban => {
                    self.banned_count += 1;
                    tracing::debug!(
                        "Step {}: {} banned at opinion {:.4}",
                        self.step_index,
                        id,
                        agent.opinion()
                    );
                },
                Activation::Reinstate(belief) => {
                    tracing::debug!(
                        "Step {}: {} reinstated at opinion {:.4}",
                        self.step_index,
                        id,
                        belief.opinion()
                    );
                },
                Activation::Update(_) | Activation::Sleep => {},
            }

            self.agents[id.index()].apply(activation);
        }

        tracing::trace!("Step {} done, {} bans pending", self.step_index, self.banned_count);
        self.step_index += 1;
    }

    /// Render the population in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let (header, connector) = if self.graph.is_directed() {
            ("digraph", "->")
        } else {
            ("graph", "--")
        };

        let _ = writeln!(dot, "{header} Population {{");
        dot.push_str("  node [shape=circle style=filled];\n\n");

        for agent in &self.agents {
            let color = if agent.is_banned() {
                "gray"
            } else {
                match agent.agent_type() {
                    AgentType::Regular => "lightblue",
                    AgentType::LeftBotFollower => "lightpink",
                    AgentType::RightBotFollower => "palegreen",
                    AgentType::LeftBot => "red",
                    AgentType::RightBot => "darkgreen",
                }
            };
            let _ = writeln!(
                dot,
                "  {} [label=\"{}\\n{:.2}\" fillcolor={}];",
                agent.unique_id().0,
                agent.unique_id().0,
                agent.opinion(),
                color
            );
        }

        dot.push_str("\n  // Network connections\n");
        for (source, target) in self.graph.edges() {
            let _ = writeln!(dot, "  {} {connector} {};", source.0, target.0);
        }

        dot.push_str("\n  // Bot exposure\n");
        for agent in &self.agents {
            for bot in agent.bot_followed() {
                let _ = writeln!(
                    dot,
                    "  {} {connector} {} [style=dashed color=red];",
                    bot.0,
                    agent.unique_id().0
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}

/// Supplied evidence must be finite and positive on both sides.
fn check_parameter(param: &AgentParameter, owner: &str) -> Result<()> {
    let valid = |x: f64| x.is_finite() && x > 0.0;
    if valid(param.a) && valid(param.b) {
        Ok(())
    } else {
        Err(MimError::Config(format!(
            "{owner}: initial evidence must be finite and positive, got a = {}, b = {}",
            param.a, param.b
        )))
    }
}

fn share_of(fraction: f64, n: usize) -> usize {
    ((fraction * n as f64).round() as usize).min(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Experiment;
    use crate::network::build_ring_network;

    fn ring(n: usize) -> SocialGraph {
        SocialGraph::from_petgraph(&build_ring_network(n, 2)).unwrap()
    }

    fn params(n: usize, mean: f64) -> PopulationParameters {
        let set = AgentParameter::from_mean(mean, 0.01).unwrap();
        PopulationParameters {
            agents: vec![set.clone(); n],
            left_bot: set.clone(),
            right_bot: set,
        }
    }

    #[test]
    fn test_population_layout() {
        let mut config = Config::default();
        config.run.bot_follower_percentage = 0.5;
        let model = Model::from_seed(ring(10), config).unwrap();

        assert_eq!(model.agents().len(), 12);
        assert_eq!(model.left_bot(), AgentId(10));
        assert_eq!(model.right_bot(), AgentId(11));
        assert_eq!(model.get_agent(AgentId(10)).unwrap().agent_type(), AgentType::LeftBot);
        assert_eq!(model.get_agent(AgentId(11)).unwrap().agent_type(), AgentType::RightBot);
        assert!(model.get_agent(AgentId(12)).is_none());

        let followers: Vec<&Agent> =
            model.agents().iter().filter(|a| a.agent_type().follows_bot()).collect();
        assert_eq!(followers.len(), 5);
        for follower in followers {
            let expected = if follower.agent_type() == AgentType::LeftBotFollower {
                AgentId(10)
            } else {
                AgentId(11)
            };
            assert_eq!(follower.bot_followed(), &[expected]);
        }
    }

    #[test]
    fn test_followers_side_with_their_opinion() {
        let mut config = Config::default();
        config.run.bot_follower_percentage = 1.0;

        let model = Model::new(ring(6), params(6, 0.3), config.clone()).unwrap();
        assert!(model
            .agents()
            .iter()
            .take(6)
            .all(|a| a.agent_type() == AgentType::LeftBotFollower));

        let model = Model::new(ring(6), params(6, 0.7), config).unwrap();
        assert!(model
            .agents()
            .iter()
            .take(6)
            .all(|a| a.agent_type() == AgentType::RightBotFollower));
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let result = Model::new(ring(6), params(5, 0.5), Config::default());
        assert!(matches!(
            result,
            Err(MimError::ParameterCount {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_rejects_invalid_supplied_evidence() {
        for bad in [f64::NAN, f64::INFINITY, 0.0, -1.0] {
            let mut agents = params(4, 0.5);
            agents.agents[0].a = bad;
            assert!(matches!(
                Model::new(ring(4), agents, Config::default()),
                Err(MimError::Config(_))
            ));

            let mut bots = params(4, 0.5);
            bots.right_bot.b = bad;
            assert!(Model::new(ring(4), bots, Config::default()).is_err());
        }
    }

    #[test]
    fn test_rejects_unbounded_flooding() {
        let mut config = Config::default();
        config.run.flooding_capacity = f64::INFINITY;
        config.run.bot_follower_percentage = 1.0;
        assert!(Model::new(ring(4), params(4, 0.7), config.clone()).is_err());
        assert!(Model::from_seed(ring(4), config).is_err());
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = Config::default();
        config.model.opinion_variance = -1.0;
        assert!(Model::from_seed(ring(4), config).is_err());
    }

    #[test]
    fn test_inoculation_assignment() {
        let mut config = Config::default();
        config.run.experiment = Experiment::Inoculation;
        config.run.inoculation_rate = 0.5;
        let model = Model::from_seed(ring(10), config).unwrap();

        let inoculated = model.agents().iter().filter(|a| a.is_inoculated()).count();
        assert_eq!(inoculated, 5);
        assert!(!model.get_agent(model.left_bot()).unwrap().is_inoculated());
    }

    #[test]
    fn test_step_collects_before_updating() {
        let model_config = Config::default();
        let mut model = Model::from_seed(ring(10), model_config).unwrap();
        let initial_misinfo = crate::metrics::misinformation(model.agents(), 0.5);

        model.step();
        assert_eq!(model.step_index(), 1);
        let records = model.collector().model_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].step, 0);
        assert_eq!(records[0].misinformation, initial_misinfo);
    }

    #[test]
    fn test_banned_count_resets_on_read() {
        let mut config = Config::default();
        config.run.experiment = Experiment::Ban;
        config.run.bot_follower_percentage = 0.0;
        let mut model = Model::new(ring(4), params(4, 0.95), config).unwrap();

        model.step_with_order(&[AgentId(0), AgentId(1)]);
        assert_eq!(model.banned_count(), 2);
        assert_eq!(model.take_banned_count(), 2);
        assert_eq!(model.banned_count(), 0);
    }

    #[test]
    fn test_activation_delay_gates_moderation() {
        let mut config = Config::default();
        config.run.experiment = Experiment::Ban;
        config.run.activation_delay = 2;
        config.run.bot_follower_percentage = 0.0;
        let mut model = Model::new(ring(4), params(4, 0.95), config).unwrap();

        assert!(!model.moderation_active());
        model.step_with_order(&[AgentId(0)]);
        model.step_with_order(&[AgentId(0)]);
        assert_eq!(model.banned_count(), 0);
        assert!(model.moderation_active());
    }

    #[test]
    fn test_dot_export() {
        let mut config = Config::default();
        config.run.bot_follower_percentage = 0.2;
        let model = Model::from_seed(ring(5), config).unwrap();
        let dot = model.to_dot();

        assert!(dot.starts_with("graph Population {"));
        assert!(dot.contains("0 -- 1;"));
        assert!(dot.contains("style=dashed"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
