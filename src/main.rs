use clap::{Parser, Subcommand};

mod commands;
mod output;
mod tty;

use commands::{automatic, manual, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "symshield")]
#[command(version = VERSION)]
#[command(about = "Rename Swift identifiers to random names, keeping a conversion map")]
struct Cli {
    /// Configuration file (default: <base>/symshield.json when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a scheme, index it and rename every declaration it defines
    Automatic(automatic::AutomaticArgs),
    /// Rename every identifier that starts with the tag
    Manual(manual::ManualArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs { config: cli.config };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
