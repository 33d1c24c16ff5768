//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (for the `mim` binary)
//!
//! A [`Config`] is built once per run and handed to the
//! [`Model`](crate::model::Model), which threads it through agents and the
//! metrics engine. Nothing in the simulation reads global state.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::belief::{compute_ab, BeliefState, OpinionRange};
use crate::error::{MimError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Model constants shared by every agent
    #[serde(default)]
    pub model: ModelConfig,

    /// Per-run settings
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| MimError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| MimError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Run settings
        if let Some(seed) = env_parse("MIM_SEED") {
            config.run.seed = seed;
        }
        if let Some(experiment) = env_parse("MIM_EXPERIMENT") {
            config.run.experiment = experiment;
        }
        if let Some(steps) = env_parse("MIM_NUM_STEPS") {
            config.run.num_steps = steps;
        }
        if let Some(capacity) = env_parse("MIM_FLOODING_CAPACITY") {
            config.run.flooding_capacity = capacity;
        }
        if let Some(share) = env_parse("MIM_BOT_FOLLOWER_PERCENTAGE") {
            config.run.bot_follower_percentage = share;
        }

        // Model constants
        if let Some(truth) = env_parse("MIM_TRUTH") {
            config.model.truth = truth;
        }
        if let Some(speed) = env_parse("MIM_COMMUNICATION_SPEED") {
            config.model.communication_speed = speed;
        }

        config
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every constraint the simulation relies on
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.run.validate()
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Model constants, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Probability of attending to any one neighbor (and to a followed bot) per step
    pub communication_speed: f64,

    /// Ground truth of the world state
    pub truth: f64,

    /// Variance used when turning a belief mean into Beta parameters
    pub opinion_variance: f64,

    /// Weight of neighbor evidence against own evidence
    pub influence_of_friends: f64,

    /// Chance of receiving an unbiased signal each step
    pub truth_signal_probability: f64,

    /// Opinions strictly inside this band are never banned
    pub not_ban_range: OpinionRange,

    /// Ban length, in activations
    pub sleep_count: u32,

    /// Uniform range for a reinstated agent's fresh opinion
    pub reinstatement_range: OpinionRange,

    /// Number of bins for the polarization index
    pub polarization_groups: usize,

    /// Number of belief groups for generated initial parameters
    pub belief_groups: usize,

    /// Agent-level records are sampled every this many steps
    pub agent_sample_interval: u64,

    /// Whether neighbors are read live or from a step-start snapshot
    pub update_mode: UpdateMode,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            communication_speed: 0.5,
            truth: 0.5,
            opinion_variance: 0.01,
            influence_of_friends: 0.5,
            truth_signal_probability: 0.5,
            not_ban_range: OpinionRange::new(0.1, 0.9),
            sleep_count: 10,
            reinstatement_range: OpinionRange::new(0.2, 0.8),
            polarization_groups: 10,
            belief_groups: 7,
            agent_sample_interval: 100,
            update_mode: UpdateMode::Asynchronous,
        }
    }
}

impl ModelConfig {
    /// Evidence pair delivered by one unbiased signal.
    pub fn truth_evidence(&self) -> Result<BeliefState> {
        BeliefState::from_mean(self.truth, self.opinion_variance)
    }

    fn validate(&self) -> Result<()> {
        check_probability("communication_speed", self.communication_speed)?;
        check_probability("influence_of_friends", self.influence_of_friends)?;
        check_probability("truth_signal_probability", self.truth_signal_probability)?;

        if self.opinion_variance.is_nan() || self.opinion_variance <= 0.0 {
            return Err(MimError::Config(format!(
                "opinion_variance must be positive, got {}",
                self.opinion_variance
            )));
        }

        self.not_ban_range.validate("not_ban_range")?;
        self.reinstatement_range.validate("reinstatement_range")?;

        // Every mean the model inverts at runtime must be representable
        compute_ab(self.truth, self.opinion_variance)?;
        compute_ab(self.reinstatement_range.low, self.opinion_variance)?;
        compute_ab(self.reinstatement_range.high, self.opinion_variance)?;

        if self.polarization_groups == 0 {
            return Err(MimError::Config("polarization_groups must be at least 1".into()));
        }
        if self.belief_groups == 0 {
            return Err(MimError::Config("belief_groups must be at least 1".into()));
        }
        if self.agent_sample_interval == 0 {
            return Err(MimError::Config("agent_sample_interval must be at least 1".into()));
        }

        Ok(())
    }
}

/// Per-run settings supplied by the experiment driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed for the run's random stream
    pub seed: u64,

    /// Experiment selector
    pub experiment: Experiment,

    /// Evidence added by each bot per step
    pub flooding_capacity: f64,

    /// Share of graph agents that follow a bot
    pub bot_follower_percentage: f64,

    /// First step at which moderation applies
    pub activation_delay: u64,

    /// Share of agents inoculated (inoculation experiments only)
    pub inoculation_rate: f64,

    /// Trusted opinion band of inoculated agents
    pub inoculation_range: OpinionRange,

    /// Steps to run
    pub num_steps: u64,

    /// Record per-agent opinions
    pub collect_agent_data: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            experiment: Experiment::Baseline,
            flooding_capacity: 25.0,
            bot_follower_percentage: 0.1,
            activation_delay: 0,
            inoculation_rate: 0.2,
            inoculation_range: OpinionRange::new(0.2, 0.8),
            num_steps: 1000,
            collect_agent_data: false,
        }
    }
}

impl RunConfig {
    fn validate(&self) -> Result<()> {
        check_probability("bot_follower_percentage", self.bot_follower_percentage)?;
        check_probability("inoculation_rate", self.inoculation_rate)?;
        self.inoculation_range.validate("inoculation_range")?;

        if !self.flooding_capacity.is_finite() || self.flooding_capacity < 0.0 {
            return Err(MimError::Config(format!(
                "flooding_capacity must be finite and non-negative, got {}",
                self.flooding_capacity
            )));
        }

        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MimError::Config(format!("{name} must lie in [0, 1], got {value}")))
    }
}

/// Experiment selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Experiment {
    /// No intervention
    #[default]
    Baseline,
    /// Moderation bans extreme accounts
    Ban,
    /// A share of agents only listen inside a trusted band
    Inoculation,
    /// Both interventions
    BanAndInoculation,
}

impl Experiment {
    /// Whether the ban state machine runs
    pub fn moderates(self) -> bool {
        matches!(self, Self::Ban | Self::BanAndInoculation)
    }

    /// Whether agents get inoculated
    pub fn inoculates(self) -> bool {
        matches!(self, Self::Inoculation | Self::BanAndInoculation)
    }

    /// Get the experiment name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Ban => "ban",
            Self::Inoculation => "inoculation",
            Self::BanAndInoculation => "ban-and-inoculation",
        }
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Experiment {
    type Err = MimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "baseline" | "none" | "0" => Ok(Self::Baseline),
            "ban" | "1" => Ok(Self::Ban),
            "inoculation" | "2" => Ok(Self::Inoculation),
            "ban-and-inoculation" | "both" | "3" => Ok(Self::BanAndInoculation),
            _ => Err(MimError::Config(format!("Unknown experiment: {s}"))),
        }
    }
}

/// How agents read their neighbors within a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateMode {
    /// Read current values, including neighbors already updated this step
    #[default]
    Asynchronous,
    /// Read values as they were when the step began
    Synchronous,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.truth, 0.5);
        assert_eq!(config.run.experiment, Experiment::Baseline);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [model]
            truth = 0.3
            sleep_count = 4
            not_ban_range = { low = 0.05, high = 0.95 }
            update_mode = "synchronous"

            [run]
            seed = 42
            experiment = "ban-and-inoculation"
            flooding_capacity = 5.0
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.model.truth, 0.3);
        assert_eq!(config.model.sleep_count, 4);
        assert_eq!(config.model.not_ban_range, OpinionRange::new(0.05, 0.95));
        assert_eq!(config.model.update_mode, UpdateMode::Synchronous);
        // Untouched fields keep their defaults
        assert_eq!(config.model.communication_speed, 0.5);
        assert_eq!(config.run.seed, 42);
        assert_eq!(config.run.experiment, Experiment::BanAndInoculation);
        assert_eq!(config.run.flooding_capacity, 5.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.run.seed = 7;
        config.run.experiment = Experiment::Inoculation;

        let text = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mim.toml");
        std::fs::write(&path, "[run]\nnum_steps = 12\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.run.num_steps, 12);

        assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.model.communication_speed = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.opinion_variance = 0.0;
        assert!(config.validate().is_err());

        // Too wide for the reinstatement range endpoints
        let mut config = Config::default();
        config.model.opinion_variance = 0.2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.run.inoculation_range = OpinionRange::new(0.8, 0.2);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.run.flooding_capacity = -1.0;
        assert!(config.validate().is_err());

        for capacity in [f64::INFINITY, f64::NAN] {
            let mut config = Config::default();
            config.run.flooding_capacity = capacity;
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_experiment_flags() {
        assert!(!Experiment::Baseline.moderates());
        assert!(Experiment::Ban.moderates());
        assert!(!Experiment::Ban.inoculates());
        assert!(Experiment::BanAndInoculation.moderates());
        assert!(Experiment::BanAndInoculation.inoculates());
        assert_eq!("1".parse::<Experiment>().unwrap(), Experiment::Ban);
        assert!("bogus".parse::<Experiment>().is_err());
    }
}
