//! # MIM - Misinformation Model
//!
//! Agent-based simulation of belief dynamics on a social network, with
//! misinformation bots, bot followers and two platform interventions:
//! moderation (temporary bans) and inoculation (trust filtering).
//!
//! ## Features
//!
//! - **Beta beliefs**: every agent holds Beta shape parameters `(a, b)`; the
//!   opinion is the mean `a / (a + b)`
//! - **Social learning**: agents average their evidence with a random sample
//!   of neighbors and occasionally receive an unbiased truth signal
//! - **Bots**: two unconnected bots flood one side of the spectrum and reach
//!   the population through their followers
//! - **Moderation**: agents with extreme opinions are banned for a fixed
//!   number of activations and come back with a fresh moderate opinion
//! - **Inoculation**: a share of agents ignores peers outside a trusted band
//! - **Metrics**: polarization, misinformation and subpopulation averages
//!   recorded every step
//!
//! ## Model Overview
//!
//! Graph nodes `0..N` become agents with the same ids; the left bot is `N`
//! and the right bot `N + 1`. One step activates every agent exactly once in
//! a random order:
//!
//! ```text
//!  Scheduler ──> order ──> Agent::plan ──> Activation ──> Agent::apply
//!                              │
//!                              ├── bot:        flood (a or b += capacity)
//!                              ├── moderated:  ban state machine
//!                              └── otherwise:  sample neighbors, update
//! ```
//!
//! ### Ban State Machine
//!
//! ```text
//!                 extreme opinion
//!     [Active] ─────────────────────> [Banned(s - 1)]
//!        ^                                  │
//!        │ reinstate                        │ sleep
//!        │ (fresh opinion)                  v
//!        └──────────────────────── [Banned(0)] <── ...
//! ```
//!
//! Bots are never moderated. Banned agents are invisible to their neighbors
//! and keep their belief until reinstated.
//!
//! ### Experiments
//!
//! | Experiment            | Bans | Inoculation |
//! |-----------------------|------|-------------|
//! | `baseline`            | no   | no          |
//! | `ban`                 | yes  | no          |
//! | `inoculation`         | no   | yes         |
//! | `ban-and-inoculation` | yes  | yes         |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mim::{build_topology, Config, Model, SocialGraph, Topology};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut config = Config::default();
//! config.run.num_steps = 200;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(config.run.seed);
//! let graph = build_topology(Topology::SmallWorld, 100, 6, 0.1, &mut rng);
//! let graph = SocialGraph::from_petgraph(&graph).unwrap();
//!
//! let report = Model::from_seed(graph, config).unwrap().run_to_report();
//! println!("{}", report.to_json().unwrap());
//! ```
//!
//! ## Modules
//!
//! - [`belief`]: Beta belief states and mean/variance inversion
//! - [`agent`]: Agents, neighbor sampling and the ban state machine
//! - [`network`]: Social graph and synthetic topologies
//! - [`params`]: Initial parameter generation
//! - [`model`]: The simulation loop and scheduler
//! - [`metrics`]: Polarization, misinformation and data collection
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases
//!
//! ## Reproducibility
//!
//! A run draws every random number (parameter generation, follower and
//! inoculation assignment, activation order, neighbor sampling, truth
//! signals and reinstatement) from a single ChaCha8 stream seeded with
//! `run.seed`. The same graph, configuration and seed give identical records.

pub mod agent;
pub mod belief;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod network;
pub mod params;

// Re-exports for convenience
pub use agent::{Activation, Agent, AgentId, AgentParameter, AgentType, BanState};
pub use belief::{compute_ab, BeliefState, OpinionRange};
pub use config::{Config, Experiment, ModelConfig, RunConfig, UpdateMode};
pub use error::{MimError, Result};
pub use metrics::collector::{AgentRecord, DataCollector, ModelRecord, SimulationReport};
pub use metrics::{misinformation, polarization};
pub use model::{Model, Scheduler};
pub use network::{build_topology, SocialGraph, Topology};
pub use params::{generate_agent_params, PopulationParameters};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
