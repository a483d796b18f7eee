pub mod dynamic;
pub mod error;
pub mod mdp;
pub mod policy;
pub mod world;

pub use dynamic::{q_value_iteration, value_iteration, QTable, SolverConfig, ValueTable};
pub use error::{ActError, Error, Result};
pub use mdp::{Environment, LiveEnvironment};
pub use policy::{Guide, PolicyExecutor};
