use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sgassign::command;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Count(command::CountCMD),
    Annotate(command::AnnotateCMD),
    Select(command::SelectCMD),
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Count(mut cmd) => cmd.try_execute(),
        Commands::Annotate(mut cmd) => cmd.try_execute(),
        Commands::Select(mut cmd) => cmd.try_execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    return ExitCode::SUCCESS;
}
