//! Q-value iteration over the (state, action) table:
//!
//! `Q(s, a) = r(s, a) + gamma * max_a' Q(next(s, a), a')`
//!
//! The larger table lets a greedy policy pick actions by a row lookup instead of
//! querying the environment's model again.

use log::info;
use ndarray::Array2;

use crate::dynamic::{
    check_environment, checked_transition, row_max, sweep_until_converged, QTable, SolverConfig,
};
use crate::error::Result;
use crate::mdp::Environment;

/// Runs Q-value iteration on `env` and returns the converged action-value table.
///
/// Sweeps visit states in enumeration order and, within a state, actions in the
/// environment's action order. The successor row read by each update may already
/// hold values written earlier in the same sweep. Rows of terminal states stay zero.
///
/// # Errors
///
/// Same as [`value_iteration`](crate::dynamic::value_iteration).
///
/// # Examples
///
/// ```
/// use mdp_solvers::dynamic::{q_value_iteration, SolverConfig};
/// use mdp_solvers::world::GridWorld;
///
/// let world = GridWorld::parse("S.G").unwrap();
/// let q = q_value_iteration(&world, &SolverConfig::default()).unwrap();
///
/// assert_eq!(q.state_value(0), Some(9.0));
/// assert_eq!(q.n_actions(), 4);
/// ```
pub fn q_value_iteration<E: Environment>(env: &E, config: &SolverConfig) -> Result<QTable> {
    config.validate()?;
    check_environment(env)?;
    info!(
        "starting Q-value iteration: {} states, {} actions, gamma {}, theta {}",
        env.n_states(),
        env.n_actions(),
        config.gamma,
        config.theta
    );

    let actions = env.actions();
    let mut q = Array2::<f64>::zeros((env.n_states(), actions.len()));
    let sweeps = sweep_until_converged(config, "Q-value iteration", || {
        let mut delta = 0.0_f64;
        for s in env.states() {
            if env.is_terminal_state(s) {
                continue;
            }
            for (i, action) in actions.iter().enumerate() {
                let old = q[[s, i]];
                let (next, reward) = checked_transition(env, s, action)?;
                let new = reward + config.gamma * row_max(q.row(next));
                q[[s, i]] = new;
                delta = delta.max((new - old).abs());
            }
        }
        Ok(delta)
    })?;

    Ok(QTable::new(q, config.gamma, sweeps))
}
