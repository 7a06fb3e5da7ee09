mod app;
mod cli;
mod commands;
mod config;
mod exit_codes;
mod keybox;
mod output;

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    app::run()
}
