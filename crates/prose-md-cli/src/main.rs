mod cli;

use clap::Parser;
use std::process::ExitCode;

fn main() -> miette::Result<ExitCode> {
    match cli::Cli::try_parse() {
        Ok(cli) => cli.run(),
        Err(e) => {
            let _ = e.print();
            Ok(if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
