//! Dialog state: which step a user is on and what has been collected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The steps of the registration dialog.
///
/// Progresses linearly: AwaitingName → AwaitingPhone → (session removed).
/// Having no session at all is the implicit start/end state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AwaitingName,
    AwaitingPhone,
}

impl Stage {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        matches!((self, target), (Stage::AwaitingName, Stage::AwaitingPhone))
    }

    /// The next stage, or `None` when this stage finishes the dialog.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::AwaitingName => Some(Stage::AwaitingPhone),
            Stage::AwaitingPhone => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingPhone => "awaiting_phone",
        };
        write!(f, "{s}")
    }
}

/// Fields gathered so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collected {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Transient, process-local progress of one user through the dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub stage: Stage,
    pub collected: Collected,
    pub started_at: DateTime<Utc>,
    /// Last time the session was mutated. Used for idle pruning.
    pub updated_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session waiting for the user's name.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            stage: Stage::AwaitingName,
            collected: Collected::default(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Whether `collected` matches what `stage` implies.
    ///
    /// A waiting-for-name session holds nothing; a waiting-for-phone session
    /// holds exactly the name. The phone never lives in a session because
    /// the session is removed as soon as the phone arrives.
    pub fn is_consistent(&self) -> bool {
        match self.stage {
            Stage::AwaitingName => self.collected.name.is_none() && self.collected.phone.is_none(),
            Stage::AwaitingPhone => self.collected.name.is_some() && self.collected.phone.is_none(),
        }
    }

    /// Store the name and advance to the phone step.
    pub fn record_name(&mut self, name: String) -> Result<Stage, String> {
        let next = self
            .stage
            .next()
            .ok_or_else(|| format!("Cannot record a name while {}", self.stage))?;
        if !self.stage.can_transition_to(next) {
            return Err(format!("Cannot transition from {} to {}", self.stage, next));
        }
        self.collected.name = Some(name);
        self.stage = next;
        self.updated_at = Utc::now();
        Ok(next)
    }
}
