//! Environment contracts consumed by the solvers and the policy executor.
//!
//! [`Environment`] is the read-only model the dynamic programming solvers sweep
//! over. [`LiveEnvironment`] adds a mutable session that the executor drives one
//! action at a time.

use std::fmt::Display;
use std::io::Write;
use std::ops::Range;

use crate::error::ActError;

/// A finite, deterministic Markov Decision Process.
///
/// States are the indices `0..n_states()`. Every action is assumed available in
/// every state, and `transition` must be total over all (state, action) pairs.
pub trait Environment {
    type Action: Clone + PartialEq + Display;

    fn n_states(&self) -> usize;

    /// All actions, in the fixed order used for sweeps and tie-breaking.
    fn actions(&self) -> &[Self::Action];

    fn n_actions(&self) -> usize {
        self.actions().len()
    }

    /// States in sweep order. Ascending index order keeps in-place sweeps reproducible.
    fn states(&self) -> Range<usize> {
        0..self.n_states()
    }

    /// Deterministic one-step model: `(next_state, reward)`.
    fn transition(&self, state: usize, action: &Self::Action) -> (usize, f64);

    /// Absorbing states. Their value is fixed at zero and solvers never update them.
    fn is_terminal_state(&self, _state: usize) -> bool {
        false
    }
}

/// An [`Environment`] that also carries a live session an agent can act in.
pub trait LiveEnvironment: Environment {
    /// True once the session has reached an absorbing configuration.
    fn is_terminal(&self) -> bool;

    /// Put the session back into its fixed start configuration.
    fn reset_agent(&mut self);

    fn current_state(&self) -> usize;

    /// Apply `action` to the session. On error the session must be left unchanged.
    fn act(&mut self, action: &Self::Action) -> Result<(), ActError>;

    /// Render the session for a human observer.
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Small hand-built environments shared by the unit tests.

    use super::*;

    /// Table-driven environment: `table[s][a] = (next_state, reward)`.
    pub struct TableEnv {
        pub actions: Vec<String>,
        pub table: Vec<Vec<(usize, f64)>>,
        pub terminal: Vec<bool>,
        pub start: usize,
        pub current: usize,
        pub rejected: Vec<(usize, String)>,
        pub faults: Vec<(usize, String)>,
    }

    impl TableEnv {
        pub fn new(actions: &[&str], table: Vec<Vec<(usize, f64)>>) -> Self {
            let n = table.len();
            Self {
                actions: actions.iter().map(|a| a.to_string()).collect(),
                table,
                terminal: vec![false; n],
                start: 0,
                current: 0,
                rejected: Vec::new(),
                faults: Vec::new(),
            }
        }

        pub fn with_terminal(mut self, state: usize) -> Self {
            self.terminal[state] = true;
            self
        }

        /// Make `action` inapplicable in `state` for the live session.
        pub fn reject(mut self, state: usize, action: &str) -> Self {
            self.rejected.push((state, action.to_string()));
            self
        }

        /// Make `action` fail with an environment fault in `state`.
        pub fn fault(mut self, state: usize, action: &str) -> Self {
            self.faults.push((state, action.to_string()));
            self
        }

        /// 0 -> 1 -> 2 (terminal), single action, reward 1 for entering state 2.
        pub fn chain() -> Self {
            TableEnv::new(
                &["forward"],
                vec![vec![(1, 0.0)], vec![(2, 1.0)], vec![(2, 0.0)]],
            )
            .with_terminal(2)
        }
    }

    impl Environment for TableEnv {
        type Action = String;

        fn n_states(&self) -> usize {
            self.table.len()
        }

        fn actions(&self) -> &[String] {
            &self.actions
        }

        fn transition(&self, state: usize, action: &String) -> (usize, f64) {
            let a = self
                .actions
                .iter()
                .position(|x| x == action)
                .unwrap_or_else(|| panic!("unknown action {action}"));
            self.table[state][a]
        }

        fn is_terminal_state(&self, state: usize) -> bool {
            self.terminal[state]
        }
    }

    impl LiveEnvironment for TableEnv {
        fn is_terminal(&self) -> bool {
            self.terminal[self.current]
        }

        fn reset_agent(&mut self) {
            self.current = self.start;
        }

        fn current_state(&self) -> usize {
            self.current
        }

        fn act(&mut self, action: &String) -> Result<(), ActError> {
            if self
                .rejected
                .iter()
                .any(|(s, a)| *s == self.current && a == action)
            {
                return Err(ActError::Inapplicable(format!(
                    "{action} is blocked in state {}",
                    self.current
                )));
            }
            if self
                .faults
                .iter()
                .any(|(s, a)| *s == self.current && a == action)
            {
                return Err(ActError::Fault("actuator offline".to_string()));
            }
            let (next, _) = self.transition(self.current, action);
            self.current = next;
            Ok(())
        }

        fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
            writeln!(out, "[state {}]", self.current)
        }
    }
}
