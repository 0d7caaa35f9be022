use crate::job::{JobState, Verb};
use serde::Deserialize;

fn default_true() -> bool {
    true
}

/// Which outcomes show up in reports. Corresponds to the [display] section
/// in the TOML config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplayPolicy {
    #[serde(default = "default_true")]
    pub new: bool,

    #[serde(default = "default_true")]
    pub error: bool,

    #[serde(default)]
    pub unchanged: bool,

    // Keep `changed` states whose diff renders empty.
    #[serde(default = "default_true", rename = "empty-diff")]
    pub empty_diff: bool,
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        Self {
            new: true,
            error: true,
            unchanged: false,
            empty_diff: true,
        }
    }
}

impl DisplayPolicy {
    /// Whether a single state survives the policy.
    pub fn keep(&self, state: &JobState) -> bool {
        match state.verb() {
            Verb::New => self.new,
            Verb::Error => self.error,
            Verb::Unchanged => self.unchanged,
            Verb::Changed => self.empty_diff || !state.diff().is_empty(),
            Verb::Unmodified => true,
        }
    }

    /// Filters `states`, keeping the survivors in their original order.
    pub fn select<'a, I>(&self, states: I) -> Vec<&'a JobState>
    where
        I: IntoIterator<Item = &'a JobState>,
    {
        states.into_iter().filter(|state| self.keep(state)).collect()
    }
}
