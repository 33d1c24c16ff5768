//! Ban state machine.
//!
//! ```text
//!                 extreme opinion
//!     [Active] ──────────────────────> [Banned(sleep_count)]
//!        ^                                   │
//!        │ sleep_count == 0                  │ sleep_count > 0
//!        │ (fresh opinion drawn)             │ (countdown, belief frozen)
//!        └───────────────────────────────────┘
//! ```
//!
//! Entering the ban already consumes one unit of the countdown, so an agent
//! banned with a configured length of `n` is reinstated on its `n`-th
//! activation after the one that banned it.

use serde::Serialize;

/// Moderation state of one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BanState {
    /// Visible to others, updating normally
    Active,
    /// Suspended with this many countdown activations left
    Banned {
        /// Remaining activations before reinstatement
        remaining: u32,
    },
}

/// What one moderated activation should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationStep {
    /// Run the regular belief update
    Update,
    /// Ban now; belief frozen
    Ban,
    /// Still banned; belief frozen
    Sleep,
    /// Countdown finished; draw a fresh opinion
    Reinstate,
}

/// Per-agent ban bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Moderation {
    banned: bool,
    sleep_count: u32,
    default_sleep_count: u32,
}

impl Moderation {
    /// Create moderation state with the configured ban length
    pub fn new(sleep_count: u32) -> Self {
        Self {
            banned: false,
            sleep_count,
            default_sleep_count: sleep_count,
        }
    }

    /// Currently banned
    pub fn is_banned(&self) -> bool {
        self.banned
    }

    /// Remaining countdown
    pub fn sleep_count(&self) -> u32 {
        self.sleep_count
    }

    /// Current state
    pub fn state(&self) -> BanState {
        if self.banned {
            BanState::Banned {
                remaining: self.sleep_count,
            }
        } else {
            BanState::Active
        }
    }

    /// Decide what this activation does, without changing state.
    pub fn plan(&self, extreme: bool) -> ModerationStep {
        match (self.banned, self.sleep_count) {
            (false, _) if extreme => ModerationStep::Ban,
            (false, _) => ModerationStep::Update,
            (true, 0) => ModerationStep::Reinstate,
            (true, _) => ModerationStep::Sleep,
        }
    }

    /// Apply a planned step.
    pub fn apply(&mut self, step: ModerationStep) {
        match step {
            ModerationStep::Update => {},
            ModerationStep::Ban => {
                self.banned = true;
                self.sleep_count = self.sleep_count.saturating_sub(1);
            },
            ModerationStep::Sleep => {
                self.sleep_count = self.sleep_count.saturating_sub(1);
            },
            ModerationStep::Reinstate => {
                self.banned = false;
                self.sleep_count = self.default_sleep_count;
            },
        }
    }
}
