//! cd builtin
//!
//! Mutates the parent shell environment's working directory. Always
//! succeeds; a missing directory surfaces when the next command spawns.

use crate::ast::types::Pipeline;
use crate::interpreter::errors::ShellError;
use crate::shell::environment::ShellEnvironment;

/// `cd` must be the sole command of its pipeline and takes exactly one
/// argument.
pub fn execute_builtin_cd(
    pipeline: &Pipeline,
    shenv: &mut ShellEnvironment,
) -> Result<i32, ShellError> {
    if pipeline.commands.len() != 1 {
        return Err(ShellError::Value(
            "'cd' cannot be part of a pipeline".to_string(),
        ));
    }
    let command = &pipeline.commands[0];
    if command.args.len() != 2 {
        return Err(ShellError::Value(
            "'cd' supports only one argument".to_string(),
        ));
    }
    shenv.set_cwd(command.args[1].text());
    Ok(0)
}
