//! Per-step data collection and run reports.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    average_opinion, average_opinion_following, average_opinion_regular, count_population,
    misinformation, population_polarization,
};
use crate::agent::Agent;
use crate::config::Config;
use crate::error::Result;
use crate::model::Model;

/// Model-level metrics for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Step the snapshot was taken before
    pub step: u64,
    /// Esteban-Ray polarization
    pub polarization: f64,
    /// Mean squared distance from the truth
    pub misinformation: f64,
    /// Mean opinion over all agents
    pub average_opinion_all: f64,
    /// Mean opinion of left bot followers
    pub average_opinion_left: f64,
    /// Mean opinion of right bot followers
    pub average_opinion_right: f64,
    /// Mean opinion of regular agents
    pub average_opinion_reg: f64,
    /// Bans made since the previous record
    pub accounts_banned: usize,
    /// Followers of either bot
    pub num_bot_followers: usize,
    /// Left bot followers
    pub num_l_followers: usize,
    /// Right bot followers
    pub num_r_followers: usize,
    /// Regular agents
    pub num_regular_agents: usize,
}

impl ModelRecord {
    /// Snapshot the model's current state.
    pub fn capture(model: &Model, accounts_banned: usize) -> Self {
        let agents = model.agents();
        let config = &model.config().model;
        let counts = count_population(agents);

        Self {
            step: model.step_index(),
            polarization: population_polarization(agents, config.polarization_groups),
            misinformation: misinformation(agents, config.truth),
            average_opinion_all: average_opinion(agents),
            average_opinion_left: average_opinion_following(agents, model.left_bot()),
            average_opinion_right: average_opinion_following(agents, model.right_bot()),
            average_opinion_reg: average_opinion_regular(agents),
            accounts_banned,
            num_bot_followers: counts.num_bot_followers,
            num_l_followers: counts.num_l_followers,
            num_r_followers: counts.num_r_followers,
            num_regular_agents: counts.num_regular_agents,
        }
    }
}

/// One agent's opinion at one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Step the sample was taken before
    pub step: u64,
    /// Agent id
    pub unique_id: usize,
    /// Opinion at that step
    pub opinion: f64,
}

impl AgentRecord {
    /// Opinion of every agent at `step`
    pub fn capture(step: u64, agents: &[Agent]) -> Vec<Self> {
        agents
            .iter()
            .map(|agent| Self {
                step,
                unique_id: agent.unique_id().0,
                opinion: agent.opinion(),
            })
            .collect()
    }
}

/// Accumulates records over a run
#[derive(Debug, Clone, Default)]
pub struct DataCollector {
    model_records: Vec<ModelRecord>,
    agent_records: Vec<AgentRecord>,
}

impl DataCollector {
    /// Append one step's records
    pub fn push(&mut self, record: ModelRecord, agent_records: Vec<AgentRecord>) {
        self.model_records.push(record);
        self.agent_records.extend(agent_records);
    }

    /// Model records in step order
    pub fn model_records(&self) -> &[ModelRecord] {
        &self.model_records
    }

    /// Sampled agent records in step order
    pub fn agent_records(&self) -> &[AgentRecord] {
        &self.agent_records
    }

    /// Wrap the collected data with the run's configuration.
    pub fn into_report(self, config: Config) -> SimulationReport {
        SimulationReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            config,
            model_records: self.model_records,
            agent_records: self.agent_records,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// RFC 3339 creation time
    pub generated_at: String,
    /// Configuration the run used
    pub config: Config,
    /// One record per step
    pub model_records: Vec<ModelRecord>,
    /// Sampled agent opinions
    pub agent_records: Vec<AgentRecord>,
}

impl SimulationReport {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentId, AgentParameter, AgentType};

    fn record(step: u64) -> ModelRecord {
        ModelRecord {
            step,
            polarization: 0.0,
            misinformation: 0.0,
            average_opinion_all: 0.5,
            average_opinion_left: 0.0,
            average_opinion_right: 0.0,
            average_opinion_reg: 0.5,
            accounts_banned: 0,
            num_bot_followers: 0,
            num_l_followers: 0,
            num_r_followers: 0,
            num_regular_agents: 2,
        }
    }

    #[test]
    fn test_agent_records_cover_population() {
        let param = AgentParameter::new(1.0, 3.0);
        let agents: Vec<Agent> = (0..3)
            .map(|i| Agent::new(AgentId(i), AgentType::Regular, &param, 0.5, 3))
            .collect();

        let records = AgentRecord::capture(7, &agents);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.step == 7 && r.opinion == 0.25));
        assert_eq!(records[2].unique_id, 2);
    }

    #[test]
    fn test_collector_accumulates() {
        let mut collector = DataCollector::default();
        collector.push(record(0), Vec::new());
        collector.push(
            record(1),
            vec![AgentRecord {
                step: 1,
                unique_id: 0,
                opinion: 0.5,
            }],
        );

        assert_eq!(collector.model_records().len(), 2);
        assert_eq!(collector.agent_records().len(), 1);
        assert_eq!(collector.model_records()[1].step, 1);
    }

    #[test]
    fn test_report_json() {
        let mut collector = DataCollector::default();
        collector.push(record(0), Vec::new());
        let report = collector.into_report(Config::default());

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["model_records"][0]["num_regular_agents"], 2);
        assert!(value["generated_at"].as_str().is_some());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_json(&path).unwrap();
        let read: SimulationReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read.model_records, report.model_records);
    }
}
