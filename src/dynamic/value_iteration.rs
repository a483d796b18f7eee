//! Value iteration: solves the Bellman optimality equation for state values
//!
//! `V(s) = max_a [ r(s, a) + gamma * V(next(s, a)) ]`
//!
//! with in-place sweeps over the states.

use log::info;
use ndarray::Array1;

use crate::dynamic::{
    best_backup, check_environment, sweep_until_converged, SolverConfig, ValueTable,
};
use crate::error::Result;
use crate::mdp::Environment;

/// Runs value iteration on `env` and returns the converged state-value table.
///
/// Terminal states keep a value of zero and are skipped by every sweep.
///
/// # Errors
///
/// - [`Error::InvalidConfig`](crate::Error::InvalidConfig) or
///   [`Error::InvalidEnvironment`](crate::Error::InvalidEnvironment) before any sweep.
/// - [`Error::StateOutOfRange`](crate::Error::StateOutOfRange) if a transition leaves the state space.
/// - [`Error::NotConverged`](crate::Error::NotConverged) once `config.max_sweeps` is used up.
///
/// # Examples
///
/// ```
/// use mdp_solvers::dynamic::{value_iteration, SolverConfig};
/// use mdp_solvers::world::GridWorld;
///
/// let world = GridWorld::parse("S.G").unwrap();
/// let v = value_iteration(&world, &SolverConfig::default()).unwrap();
///
/// // One step at -1, then +10 for stepping onto the goal.
/// assert_eq!(v.get(0), Some(9.0));
/// ```
pub fn value_iteration<E: Environment>(env: &E, config: &SolverConfig) -> Result<ValueTable> {
    config.validate()?;
    check_environment(env)?;
    info!(
        "starting value iteration: {} states, {} actions, gamma {}, theta {}",
        env.n_states(),
        env.n_actions(),
        config.gamma,
        config.theta
    );

    let mut v = Array1::<f64>::zeros(env.n_states());
    let sweeps = sweep_until_converged(config, "value iteration", || {
        let mut delta = 0.0_f64;
        for s in env.states() {
            if env.is_terminal_state(s) {
                continue;
            }
            let old = v[s];
            let new = best_backup(env, v.view(), config.gamma, s)?;
            v[s] = new;
            delta = delta.max((new - old).abs());
        }
        Ok(delta)
    })?;

    Ok(ValueTable::new(v, config.gamma, sweeps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mdp::testing::TableEnv;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_chain_converges_in_three_sweeps() {
        let env = TableEnv::chain();
        let v = value_iteration(&env, &SolverConfig::default()).unwrap();
        assert_eq!(v.values().to_vec(), vec![1.0, 1.0, 0.0]);
        assert!(v.sweeps() <= 3);
        assert_eq!(v.gamma(), 1.0);
    }

    #[test]
    fn test_in_place_sweep_propagates_within_one_sweep() {
        // 1 -> 0 -> 2 (terminal), reward 1 on 0 -> 2. State 0 is swept first, so
        // state 1 already sees the new V(0) in the same sweep.
        let env = TableEnv::new(
            &["go"],
            vec![vec![(2, 1.0)], vec![(0, 0.0)], vec![(2, 0.0)]],
        )
        .with_terminal(2);
        let v = value_iteration(&env, &SolverConfig::default()).unwrap();
        assert_eq!(v.values().to_vec(), vec![1.0, 1.0, 0.0]);
        assert_eq!(v.sweeps(), 2);
    }

    #[test]
    fn test_discounted_two_state_loop() {
        // state 0: stay (+1) or move to 1 (0); state 1: move to 0 (0) or stay (+2)
        let env = TableEnv::new(
            &["left", "right"],
            vec![vec![(0, 1.0), (1, 0.0)], vec![(0, 0.0), (1, 2.0)]],
        );
        let v = value_iteration(&env, &SolverConfig::new(0.9, 1e-9)).unwrap();
        assert_abs_diff_eq!(v.get(1).unwrap(), 20.0, epsilon = 1e-6);
        assert_abs_diff_eq!(v.get(0).unwrap(), 18.0, epsilon = 1e-6);
    }

    #[test]
    fn test_undiscounted_cycle_hits_sweep_ceiling() {
        let env = TableEnv::new(&["loop"], vec![vec![(0, 1.0)]]);
        let config = SolverConfig::default().with_max_sweeps(50);
        match value_iteration(&env, &config) {
            Err(Error::NotConverged { sweeps, delta }) => {
                assert_eq!(sweeps, 50);
                assert_eq!(delta, 1.0);
            }
            other => panic!("expected NotConverged, got {other:?}"),
        }
    }

    #[test]
    fn test_tied_actions_share_value() {
        let env = TableEnv::new(
            &["a", "b"],
            vec![vec![(1, 1.0), (1, 1.0)], vec![(1, 0.0), (1, 0.0)]],
        )
        .with_terminal(1);
        let v = value_iteration(&env, &SolverConfig::default()).unwrap();
        assert_eq!(v.get(0), Some(1.0));
        assert_eq!(v.get(1), Some(0.0));
    }
}
