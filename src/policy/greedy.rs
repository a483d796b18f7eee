//! Greedy action selection from a value or action-value table.

use log::debug;

use crate::dynamic::argmax_first;
use crate::error::{Error, Result};
use crate::mdp::{Environment, LiveEnvironment};
use crate::policy::{apply_action, Guide};

/// Index (into `env.actions()`) of the greedy action in `state`.
///
/// - [`Guide::Value`]: evaluates `r(s, a) + gamma * V(s')` for every action and keeps
///   the first one with the strictly greatest value.
/// - [`Guide::ActionValue`]: index of the first maximal entry of the row for `state`.
/// - [`Guide::Manual`]: `None`.
pub fn greedy_action_index<E: Environment>(
    env: &E,
    guide: Guide<'_>,
    state: usize,
) -> Result<Option<usize>> {
    match guide {
        Guide::Value(v) => {
            let mut lookahead = Vec::with_capacity(env.n_actions());
            for action in env.actions() {
                lookahead.push(v.lookahead(env, state, action)?);
            }
            Ok(Some(argmax_first(lookahead)))
        }
        Guide::ActionValue(q) => q.best_action_index(state).map(Some).ok_or_else(|| {
            Error::InvalidEnvironment(format!("state {state} is not in the Q-table"))
        }),
        Guide::Manual => Ok(None),
    }
}

/// The greedy action in `state`, or `None` when the guide is manual.
pub fn greedy_action<E: Environment>(
    env: &E,
    guide: Guide<'_>,
    state: usize,
) -> Result<Option<E::Action>> {
    let Some(index) = greedy_action_index(env, guide, state)? else {
        return Ok(None);
    };
    env.actions()
        .get(index)
        .cloned()
        .map(Some)
        .ok_or_else(|| Error::InvalidEnvironment(format!("no action at index {index}")))
}

/// Greedy action index for every state; terminal states map to `None`.
pub fn greedy_policy<E: Environment>(env: &E, guide: Guide<'_>) -> Result<Vec<Option<usize>>> {
    guide.check_fits(env)?;
    env.states()
        .map(|s| {
            if env.is_terminal_state(s) {
                Ok(None)
            } else {
                greedy_action_index(env, guide, s)
            }
        })
        .collect()
}

/// Resets `env` and follows the greedy policy without prompting until the session
/// is terminal. Returns the executed actions.
///
/// # Errors
///
/// - [`Error::InvalidConfig`] for a manual guide.
/// - [`Error::StepLimit`] if no terminal state is reached within `max_steps`.
/// - Rejections and faults from the environment are returned as-is; there is no
///   operator to retry with.
pub fn rollout<E: LiveEnvironment>(
    env: &mut E,
    guide: Guide<'_>,
    max_steps: usize,
) -> Result<Vec<E::Action>> {
    if guide.is_manual() {
        return Err(Error::InvalidConfig(
            "a rollout needs a value or action-value table".to_string(),
        ));
    }
    guide.check_fits(env)?;

    env.reset_agent();
    let mut trajectory = Vec::new();
    while !env.is_terminal() {
        if trajectory.len() >= max_steps {
            return Err(Error::StepLimit { steps: max_steps });
        }
        let state = env.current_state();
        let Some(action) = greedy_action(env, guide, state)? else {
            break;
        };
        debug!("rollout: state {state} -> {action}");
        apply_action(env, &action)?;
        trajectory.push(action);
    }
    Ok(trajectory)
}
