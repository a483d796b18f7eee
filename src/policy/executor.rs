//! Interactive, step-by-step execution of a greedy policy.
//!
//! Each step shows the greedy suggestion (if the guide has a table), waits for the
//! operator, and applies either the suggestion (empty line) or the action typed in.
//! Unknown names and actions the environment rejects are reported and the step is
//! retried without touching the environment.

use std::io::{BufRead, Write};

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mdp::LiveEnvironment;
use crate::policy::{action_list, apply_action, greedy_action, parse_action, Guide};

const RULE: &str = "--------------------------------------";

/// Drives a [`LiveEnvironment`] to a terminal state, reading operator decisions
/// from `input` and writing prompts and maps to `output`.
pub struct PolicyExecutor<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PolicyExecutor<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    /// Resets `env`, then steps it until it reports a terminal state.
    ///
    /// Returns the number of actions applied.
    ///
    /// # Errors
    ///
    /// - [`Error::InputClosed`] if the input ends mid-session.
    /// - [`Error::EnvironmentFault`] for failures other than a rejected action.
    /// - [`Error::InvalidEnvironment`] if the guide's table does not fit `env`.
    pub fn run<E: LiveEnvironment>(&mut self, env: &mut E, guide: Guide<'_>) -> Result<usize> {
        guide.check_fits(env)?;
        env.reset_agent();
        writeln!(self.output, "Start executing. Current map:")?;
        env.render(&mut self.output)?;
        if guide.is_manual() {
            writeln!(
                self.output,
                "No optimal value table was detected. Only manual execution possible."
            )?;
        }

        let mut steps = 0;
        while !env.is_terminal() {
            let state = env.current_state();
            let greedy = greedy_action(env, guide, state)?;
            let executed = self.step(env, greedy.as_ref())?;
            steps += 1;
            debug!("step {steps}: state {state} -> {executed}");

            writeln!(self.output, "Executed action: {executed}")?;
            writeln!(self.output, "{RULE}")?;
            writeln!(self.output, "New map:")?;
            env.render(&mut self.output)?;
        }

        writeln!(self.output, "Found the goal! Exiting")?;
        info!("policy execution reached a terminal state after {steps} steps");
        Ok(steps)
    }

    /// Prompts until one action has been applied successfully and returns it.
    fn step<E: LiveEnvironment>(
        &mut self,
        env: &mut E,
        greedy: Option<&E::Action>,
    ) -> Result<E::Action> {
        loop {
            let choice = self.prompt(env, greedy)?;
            let action = if choice.is_empty() {
                match greedy {
                    Some(action) => action.clone(),
                    None => {
                        writeln!(
                            self.output,
                            "No greedy action available. Available actions are {}. Try again",
                            action_list(env)
                        )?;
                        continue;
                    }
                }
            } else {
                match parse_action(env, &choice) {
                    Ok(action) => action,
                    Err(Error::UnknownAction(name)) => {
                        warn!("unknown action {name:?}");
                        writeln!(
                            self.output,
                            "{name} is not a valid action. Available actions are {}. Try again",
                            action_list(env)
                        )?;
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            };

            match apply_action(env, &action) {
                Ok(()) => return Ok(action),
                Err(e) if e.is_recoverable_selection() => {
                    warn!("{e}");
                    writeln!(self.output, "{e}. Try again")?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn prompt<E: LiveEnvironment>(
        &mut self,
        env: &E,
        greedy: Option<&E::Action>,
    ) -> Result<String> {
        match greedy {
            Some(action) => {
                writeln!(self.output, "Greedy action= {action}")?;
                write!(
                    self.output,
                    "Choose an action by typing it in full, then hit enter. \
                     Just hit enter to execute the greedy action: "
                )?;
            }
            None => write!(
                self.output,
                "Choose an action by typing it in full, then hit enter. Available are {}: ",
                action_list(env)
            )?,
        }
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Error::InputClosed);
        }
        Ok(line.trim().to_string())
    }
}
