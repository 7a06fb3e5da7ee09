mod keybox;

use crate::app::AppContext;
use crate::cli;
use std::process::ExitCode;

pub fn dispatch(command: cli::Commands, ctx: &AppContext) -> ExitCode {
    keybox::run(command, ctx)
}
