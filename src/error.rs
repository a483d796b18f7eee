use thiserror::Error;

/// Errors produced by the solvers, the policy executor and the bundled grid world.
#[derive(Debug, Error)]
pub enum Error {
    /// Gamma, theta or the sweep ceiling is out of range.
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    /// The environment or table cannot be solved or used as given.
    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    /// A transition names a successor outside `0..n_states`.
    #[error(
        "transition from state {state} under action {action} leads to state {next_state}, \
         but the environment only has {n_states} states"
    )]
    StateOutOfRange {
        state: usize,
        action: String,
        next_state: usize,
        n_states: usize,
    },

    /// The sweep ceiling was hit before a sweep changed every entry by less than theta.
    #[error("did not converge after {sweeps} sweeps (last delta {delta})")]
    NotConverged { sweeps: usize, delta: f64 },

    /// Typed input matches no action name.
    #[error("{0} is not a known action")]
    UnknownAction(String),

    /// The live session refused an otherwise valid action.
    #[error("action {action} was rejected: {reason}")]
    ActionRejected { action: String, reason: String },

    /// The live session failed for a reason other than rejecting the action.
    #[error("environment fault: {0}")]
    EnvironmentFault(String),

    /// The operator's input ended mid-session.
    #[error("input closed before the session reached a terminal state")]
    InputClosed,

    /// A rollout ran out of steps before reaching a terminal state.
    #[error("no terminal state reached within {steps} steps")]
    StepLimit { steps: usize },

    /// A grid world map could not be parsed.
    #[error("map line {line}: {message}")]
    MapParse { line: usize, message: String },

    /// Reading input, writing output or loading a map failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by [`LiveEnvironment::act`](crate::mdp::LiveEnvironment::act).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActError {
    /// The action exists but cannot be executed from the current configuration.
    #[error("not executable here: {0}")]
    Inapplicable(String),
    /// Anything else that went wrong while acting.
    #[error("{0}")]
    Fault(String),
}

impl Error {
    /// True for the selection errors the interactive executor recovers from by re-prompting.
    pub fn is_recoverable_selection(&self) -> bool {
        matches!(self, Error::UnknownAction(_) | Error::ActionRejected { .. })
    }
}
