//! Greedy policies derived from solved tables, and the executor that steps a
//! live environment with them.

pub mod executor;
pub mod greedy;

use crate::dynamic::{QTable, ValueTable};
use crate::error::{ActError, Error, Result};
use crate::mdp::{Environment, LiveEnvironment};

pub use executor::PolicyExecutor;
pub use greedy::{greedy_action, greedy_action_index, greedy_policy, rollout};

/// What the greedy policy consults when choosing an action.
#[derive(Debug, Clone, Copy)]
pub enum Guide<'a> {
    /// One-step lookahead against the environment's model with the table's gamma.
    Value(&'a ValueTable),
    /// Row lookup, no model queries needed.
    ActionValue(&'a QTable),
    /// No table: every action is chosen by hand.
    Manual,
}

impl<'a> From<&'a ValueTable> for Guide<'a> {
    fn from(table: &'a ValueTable) -> Self {
        Guide::Value(table)
    }
}

impl<'a> From<&'a QTable> for Guide<'a> {
    fn from(table: &'a QTable) -> Self {
        Guide::ActionValue(table)
    }
}

impl Guide<'_> {
    pub fn is_manual(&self) -> bool {
        matches!(self, Guide::Manual)
    }

    /// Checks the table was built for an environment of this shape.
    pub fn check_fits<E: Environment>(&self, env: &E) -> Result<()> {
        let fits = match self {
            Guide::Value(v) => v.len() == env.n_states(),
            Guide::ActionValue(q) => {
                q.n_states() == env.n_states() && q.n_actions() == env.n_actions()
            }
            Guide::Manual => true,
        };
        if fits {
            Ok(())
        } else {
            Err(Error::InvalidEnvironment(format!(
                "table does not match an environment with {} states and {} actions",
                env.n_states(),
                env.n_actions()
            )))
        }
    }
}

/// Looks up an action by its display name, ignoring case and surrounding whitespace.
pub fn parse_action<E: Environment>(env: &E, name: &str) -> Result<E::Action> {
    let name = name.trim();
    env.actions()
        .iter()
        .find(|a| a.to_string().eq_ignore_ascii_case(name))
        .cloned()
        .ok_or_else(|| Error::UnknownAction(name.to_string()))
}

/// Applies `action`, separating rejected selections from environment faults.
pub fn apply_action<E: LiveEnvironment>(env: &mut E, action: &E::Action) -> Result<()> {
    env.act(action).map_err(|e| match e {
        ActError::Inapplicable(reason) => Error::ActionRejected {
            action: action.to_string(),
            reason,
        },
        ActError::Fault(message) => Error::EnvironmentFault(message),
    })
}

pub(crate) fn action_list<E: Environment>(env: &E) -> String {
    let names: Vec<String> = env.actions().iter().map(ToString::to_string).collect();
    format!("[{}]", names.join(", "))
}
