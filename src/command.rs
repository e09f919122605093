//! Shell command actions
//!
//! `run` entries from the build file are expanded and handed to the
//! configured shell one at a time. A non-zero exit fails the task.

use std::process::Command;

use tracing::info;

use crate::args::TaskArguments;
use crate::error::{JakeError, Result};
use crate::task::{action, Action, Task};

/// Expand `${var}` and `$var` in `command`.
///
/// Variables resolve from the task's own arguments, then `name`,
/// `source` (first prerequisite) and `sources` (all prerequisites). A
/// declared argument name left unbound falls back through the usual
/// argument lookup; any other variable is taken from the environment by
/// its exact name. Everything else is left for the shell.
pub fn expand(command: &str, task: &Task, args: &TaskArguments) -> String {
    shellexpand::env_with_context_no_errors(command, |var| {
        if let Some(value) = args.get(var) {
            return Some(value.to_string());
        }
        match var {
            "name" => Some(task.name().to_string()),
            "source" => task.prerequisites().first().cloned(),
            "sources" => Some(task.prerequisites().join(" ")),
            _ if is_declared(var, task, args) => args.lookup(var),
            _ => std::env::var(var).ok(),
        }
    })
    .into_owned()
}

fn is_declared(var: &str, task: &Task, args: &TaskArguments) -> bool {
    task.argument_names().iter().any(|name| name == var) || args.declares(var)
}

/// Run one command through `shell -c`
pub fn run_shell(shell: &str, command: &str) -> Result<()> {
    info!("{}", command);

    let status = Command::new(shell).arg("-c").arg(command).status()?;

    if !status.success() {
        return Err(JakeError::CommandFailed {
            command: command.to_string(),
            code: status.code().unwrap_or(1),
        });
    }

    Ok(())
}

/// An action running `commands` in order, stopping at the first failure
pub fn command_action(shell: &str, commands: &[String]) -> Action {
    let shell = shell.to_string();
    let commands = commands.to_vec();

    action(move |task, args| {
        for command in &commands {
            let command = expand(command, task, args);
            eprintln!("{}", console::style(&command).dim());
            run_shell(&shell, &command)?;
        }
        Ok(())
    })
}
