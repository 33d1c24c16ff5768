//! Neighbor sampling.
//!
//! Agents pay limited attention: every step each graph neighbor is heard with
//! probability `communication_speed`, banned accounts are never heard, and bot
//! followers additionally catch their bot's output with the same probability.
//! Inoculated agents then drop every source whose opinion lies outside their
//! trusted band.

use rand::Rng;

use super::{Agent, AgentId};
use crate::belief::BeliefState;
use crate::network::SocialGraph;

/// What a sampling agent can see of another agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerState {
    /// Peer belief
    pub belief: BeliefState,
    /// Peer is banned
    pub banned: bool,
}

/// Read access to other agents' states.
///
/// Implemented for the live population (asynchronous updates) and for a
/// snapshot taken at the start of a step (synchronous updates).
pub trait PeerView {
    /// State of agent `id`, or `None` if no such agent exists
    fn peer(&self, id: AgentId) -> Option<PeerState>;
}

impl PeerView for [Agent] {
    fn peer(&self, id: AgentId) -> Option<PeerState> {
        self.get(id.index()).map(Agent::peer_state)
    }
}

impl PeerView for [PeerState] {
    fn peer(&self, id: AgentId) -> Option<PeerState> {
        self.get(id.index()).copied()
    }
}

/// A sampled neighbor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Neighbor identity
    pub id: AgentId,
    /// Neighbor belief at sampling time
    pub belief: BeliefState,
}

/// Sample the neighbors `agent` listens to this step.
///
/// Random draws happen in a fixed order (graph neighbors in adjacency order,
/// then followed bots) so the result is reproducible under a seed.
pub fn sample_neighbors<P, R>(
    agent: &Agent,
    graph: &SocialGraph,
    peers: &P,
    communication_speed: f64,
    rng: &mut R,
) -> Vec<Neighbor>
where
    P: PeerView + ?Sized,
    R: Rng + ?Sized,
{
    let mut neighbors: Vec<Neighbor> = graph
        .neighbors(agent.unique_id())
        .iter()
        .filter(|_| rng.gen_bool(communication_speed))
        .filter_map(|&id| {
            peers
                .peer(id)
                .filter(|peer| !peer.banned)
                .map(|peer| Neighbor {
                    id,
                    belief: peer.belief,
                })
        })
        .collect();

    if agent.agent_type().follows_bot() {
        for &bot in agent.bot_followed() {
            if rng.gen_bool(communication_speed) {
                if let Some(peer) = peers.peer(bot) {
                    neighbors.push(Neighbor {
                        id: bot,
                        belief: peer.belief,
                    });
                }
            }
        }
    }

    if agent.is_inoculated() {
        let range = agent.inoculation_range();
        neighbors.retain(|n| range.contains_strict(n.belief.opinion()));
    }

    neighbors
}
