//! Dynamic programming solvers for finite deterministic MDPs.
//!
//! Both solvers perform in-place (Gauss-Seidel) sweeps over the states in the
//! environment's enumeration order: an update to one state is visible to every
//! later state in the same sweep. They stop after the first sweep whose largest
//! absolute change is below `theta`, or fail with [`Error::NotConverged`] once
//! `max_sweeps` is exhausted.

pub mod q_value_iteration;
pub mod value_iteration;

use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{Error, Result};
use crate::mdp::Environment;

pub use q_value_iteration::q_value_iteration;
pub use value_iteration::value_iteration;

/// Configuration options for the sweep solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Discount factor, in (0, 1]
    pub gamma: f64,
    /// Convergence threshold on the largest per-sweep change
    pub theta: f64,
    /// Sweep ceiling. `None` keeps sweeping until convergence, however long that takes.
    pub max_sweeps: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            theta: 0.001,
            max_sweeps: Some(10_000),
        }
    }
}

impl SolverConfig {
    pub fn new(gamma: f64, theta: f64) -> Self {
        Self {
            gamma,
            theta,
            ..Self::default()
        }
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = Some(max_sweeps);
        self
    }

    /// Drop the sweep ceiling. With `gamma == 1` on a non-terminating task this never returns.
    pub fn unbounded(mut self) -> Self {
        self.max_sweeps = None;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "gamma must be in (0, 1], got {}",
                self.gamma
            )));
        }
        if !(self.theta > 0.0 && self.theta.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "theta must be positive and finite, got {}",
                self.theta
            )));
        }
        if self.max_sweeps == Some(0) {
            return Err(Error::InvalidConfig(
                "max_sweeps must allow at least one sweep".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optimal state values `V(s)` produced by [`value_iteration`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    values: Array1<f64>,
    gamma: f64,
    sweeps: usize,
}

impl ValueTable {
    pub(crate) fn new(values: Array1<f64>, gamma: f64, sweeps: usize) -> Self {
        Self {
            values,
            gamma,
            sweeps,
        }
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    pub fn get(&self, state: usize) -> Option<f64> {
        self.values.get(state).copied()
    }

    /// Discount factor the table was solved with; greedy lookahead reuses it.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One-step lookahead `r(s, a) + gamma * V(s')`.
    pub fn lookahead<E: Environment>(
        &self,
        env: &E,
        state: usize,
        action: &E::Action,
    ) -> Result<f64> {
        let (next, reward) = checked_transition(env, state, action)?;
        let successor = self
            .values
            .get(next)
            .copied()
            .ok_or_else(|| table_mismatch(next, self.values.len()))?;
        Ok(reward + self.gamma * successor)
    }

    /// Largest `|V(s) - max_a (r + gamma * V(s'))|` over the non-terminal states.
    pub fn bellman_residual<E: Environment>(&self, env: &E) -> Result<f64> {
        if env.n_states() != self.values.len() {
            return Err(table_mismatch(env.n_states(), self.values.len()));
        }
        let mut residual = 0.0_f64;
        for s in env.states() {
            if env.is_terminal_state(s) {
                continue;
            }
            let backup = best_backup(env, self.values.view(), self.gamma, s)?;
            residual = residual.max((self.values[s] - backup).abs());
        }
        Ok(residual)
    }
}

/// Optimal action values `Q(s, a)` produced by [`q_value_iteration`].
///
/// Rows are states, columns follow the environment's action order.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    values: Array2<f64>,
    gamma: f64,
    sweeps: usize,
}

impl QTable {
    pub(crate) fn new(values: Array2<f64>, gamma: f64, sweeps: usize) -> Self {
        Self {
            values,
            gamma,
            sweeps,
        }
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn get(&self, state: usize, action: usize) -> Option<f64> {
        self.values.get((state, action)).copied()
    }

    pub fn row(&self, state: usize) -> Option<ArrayView1<'_, f64>> {
        (state < self.n_states()).then(|| self.values.row(state))
    }

    /// `max_a Q(s, a)`.
    pub fn state_value(&self, state: usize) -> Option<f64> {
        self.row(state).map(row_max)
    }

    /// Index of the first maximal entry in the row for `state`.
    pub fn best_action_index(&self, state: usize) -> Option<usize> {
        self.row(state).map(|row| argmax_first(row.iter().copied()))
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn n_states(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_actions(&self) -> usize {
        self.values.ncols()
    }
}

/// Maximum of a row; an empty row counts as zero.
pub(crate) fn row_max(row: ArrayView1<'_, f64>) -> f64 {
    if row.is_empty() {
        return 0.0;
    }
    row.iter().fold(f64::NEG_INFINITY, |acc, &x| acc.max(x))
}

/// Index of the first maximal value; later ties never replace it.
pub(crate) fn argmax_first(values: impl IntoIterator<Item = f64>) -> usize {
    let mut best_index = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.into_iter().enumerate() {
        if v > best_value {
            best_value = v;
            best_index = i;
        }
    }
    best_index
}

/// `max_a (r(s, a) + gamma * V(s'))` against whatever `values` currently holds.
pub(crate) fn best_backup<E: Environment>(
    env: &E,
    values: ArrayView1<'_, f64>,
    gamma: f64,
    state: usize,
) -> Result<f64> {
    let mut best = f64::NEG_INFINITY;
    for action in env.actions() {
        let (next, reward) = checked_transition(env, state, action)?;
        let value = reward + gamma * values[next];
        if value > best {
            best = value;
        }
    }
    Ok(best)
}

pub(crate) fn check_environment<E: Environment>(env: &E) -> Result<()> {
    if env.n_states() == 0 {
        return Err(Error::InvalidEnvironment("no states".to_string()));
    }
    if env.n_actions() == 0 || env.actions().is_empty() {
        return Err(Error::InvalidEnvironment("no actions".to_string()));
    }
    Ok(())
}

pub(crate) fn checked_transition<E: Environment>(
    env: &E,
    state: usize,
    action: &E::Action,
) -> Result<(usize, f64)> {
    let (next, reward) = env.transition(state, action);
    if next >= env.n_states() {
        return Err(Error::StateOutOfRange {
            state,
            action: action.to_string(),
            next_state: next,
            n_states: env.n_states(),
        });
    }
    if !reward.is_finite() {
        return Err(Error::InvalidEnvironment(format!(
            "transition from state {state} under action {action} has non-finite reward {reward}"
        )));
    }
    Ok((next, reward))
}

fn table_mismatch(state: usize, len: usize) -> Error {
    Error::InvalidEnvironment(format!(
        "state {state} does not fit a table of {len} entries"
    ))
}

/// Repeats `sweep` until it reports a delta below `theta` and returns the number of sweeps run.
pub(crate) fn sweep_until_converged<F>(
    config: &SolverConfig,
    name: &str,
    mut sweep: F,
) -> Result<usize>
where
    F: FnMut() -> Result<f64>,
{
    let mut sweeps = 0;
    let mut delta = f64::INFINITY;
    loop {
        if let Some(max) = config.max_sweeps {
            if sweeps >= max {
                warn!("{name}: no convergence after {sweeps} sweeps, last delta {delta}");
                return Err(Error::NotConverged { sweeps, delta });
            }
        }
        delta = sweep()?;
        sweeps += 1;
        debug!("{name}: sweep {sweeps} delta {delta}");
        if delta < config.theta {
            info!("{name}: converged after {sweeps} sweeps (delta {delta})");
            return Ok(sweeps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::testing::TableEnv;
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Random deterministic MDP with continuous rewards in [-1, 1].
    fn random_env(rng: &mut ChaCha8Rng, n_states: usize, n_actions: usize) -> TableEnv {
        let names: Vec<String> = (0..n_actions).map(|a| format!("a{a}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let table = (0..n_states)
            .map(|_| {
                (0..n_actions)
                    .map(|_| (rng.gen_range(0..n_states), rng.gen_range(-1.0..1.0)))
                    .collect()
            })
            .collect();
        TableEnv::new(&refs, table)
    }

    #[test]
    fn test_default_config() {
        let config = SolverConfig::default();
        assert_eq!(config.gamma, 1.0);
        assert_eq!(config.theta, 0.001);
        assert_eq!(config.max_sweeps, Some(10_000));
        assert!(config.validate().is_ok());
        assert_eq!(config.unbounded().max_sweeps, None);
    }

    #[test]
    fn test_config_validation() {
        assert!(SolverConfig::new(0.0, 0.001).validate().is_err());
        assert!(SolverConfig::new(1.5, 0.001).validate().is_err());
        assert!(SolverConfig::new(f64::NAN, 0.001).validate().is_err());
        assert!(SolverConfig::new(0.9, 0.0).validate().is_err());
        assert!(SolverConfig::new(0.9, f64::INFINITY).validate().is_err());
        assert!(SolverConfig::new(0.9, 0.1)
            .with_max_sweeps(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_argmax_first_keeps_earliest_tie() {
        assert_eq!(argmax_first([1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(argmax_first([5.0, 5.0]), 0);
        assert_eq!(argmax_first([-2.0, -1.0]), 1);
    }

    #[test]
    fn test_random_mdps_converge_with_small_residual() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let config = SolverConfig::new(0.9, 1e-6);
        for _ in 0..20 {
            let env = random_env(&mut rng, 12, 3);
            let v = value_iteration(&env, &config).unwrap();
            assert!(v.bellman_residual(&env).unwrap() < config.theta);
        }
    }

    #[test]
    fn test_value_and_q_tables_agree() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let config = SolverConfig::new(0.9, 1e-8);
        for _ in 0..20 {
            let env = random_env(&mut rng, 10, 4);
            let v = value_iteration(&env, &config).unwrap();
            let q = q_value_iteration(&env, &config).unwrap();
            for s in env.states() {
                assert_abs_diff_eq!(
                    v.get(s).unwrap(),
                    q.state_value(s).unwrap(),
                    epsilon = 100.0 * config.theta
                );
            }
        }
    }

    #[test]
    fn test_greedy_choices_agree_away_from_ties() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let config = SolverConfig::new(0.8, 1e-9);
        for _ in 0..20 {
            let env = random_env(&mut rng, 8, 3);
            let v = value_iteration(&env, &config).unwrap();
            let q = q_value_iteration(&env, &config).unwrap();
            for s in env.states() {
                let mut lookahead: Vec<f64> = env
                    .actions()
                    .iter()
                    .map(|a| v.lookahead(&env, s, a).unwrap())
                    .collect();
                let from_v = argmax_first(lookahead.iter().copied());
                lookahead.sort_by(|a, b| b.total_cmp(a));
                if lookahead[0] - lookahead[1] < 1e-4 {
                    continue;
                }
                assert_eq!(Some(from_v), q.best_action_index(s));
            }
        }
    }

    #[test]
    fn test_solvers_are_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let env = random_env(&mut rng, 15, 4);
        let config = SolverConfig::new(0.95, 1e-5);
        assert_eq!(
            value_iteration(&env, &config).unwrap(),
            value_iteration(&env, &config).unwrap()
        );
        assert_eq!(
            q_value_iteration(&env, &config).unwrap(),
            q_value_iteration(&env, &config).unwrap()
        );
    }

    #[test]
    fn test_out_of_range_transition_is_reported() {
        let env = TableEnv::new(&["go"], vec![vec![(5, 1.0)]]);
        let config = SolverConfig::new(0.9, 0.01);
        assert!(matches!(
            value_iteration(&env, &config),
            Err(Error::StateOutOfRange { next_state: 5, .. })
        ));
        assert!(matches!(
            q_value_iteration(&env, &config),
            Err(Error::StateOutOfRange { next_state: 5, .. })
        ));
    }

    #[test]
    fn test_non_finite_rewards_are_rejected() {
        let config = SolverConfig::default();
        for reward in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let env = TableEnv::new(&["go"], vec![vec![(1, reward)], vec![(1, 0.0)]])
                .with_terminal(1);
            assert!(matches!(
                value_iteration(&env, &config),
                Err(Error::InvalidEnvironment(_))
            ));
            assert!(matches!(
                q_value_iteration(&env, &config),
                Err(Error::InvalidEnvironment(_))
            ));
        }
    }

    #[test]
    fn test_empty_environment_is_rejected() {
        let env = TableEnv::new(&["go"], vec![]);
        assert!(matches!(
            value_iteration(&env, &SolverConfig::default()),
            Err(Error::InvalidEnvironment(_))
        ));
        let env = TableEnv::new(&[], vec![vec![]]);
        assert!(matches!(
            q_value_iteration(&env, &SolverConfig::default()),
            Err(Error::InvalidEnvironment(_))
        ));
    }
}
