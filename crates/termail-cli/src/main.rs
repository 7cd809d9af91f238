mod cli;
mod commands;
mod context;
mod logging;
mod output;
mod prompt;

use std::process::ExitCode;

use clap::Parser;
use termail_core::TermailError;

use crate::cli::Cli;
use crate::context::Context;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => return report(err.into()),
    };
    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(err),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut ctx = Context::open(&cli).await?;
    commands::run(&mut ctx, cli.command).await
}

/// Known failures print their message and exit 1, anything else exits 2.
fn report(err: anyhow::Error) -> ExitCode {
    if let Some(err) = err.downcast_ref::<TermailError>() {
        if matches!(err, TermailError::Cancelled) {
            return ExitCode::from(1);
        }
        if err.is_user_facing() {
            output::err(&err.to_string());
            return ExitCode::from(1);
        }
    }
    if let Some(err) = err.downcast_ref::<output::UserError>() {
        output::err(&err.to_string());
        return ExitCode::from(1);
    }
    output::err(&format!("internal error: {:#}", err));
    ExitCode::from(2)
}
