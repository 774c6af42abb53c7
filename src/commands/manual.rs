use clap::Args;

use symshield::config;
use symshield::obfuscate::NameTable;
use symshield::protect::{self, ManualOptions, ProtectReport, RunStatus};

use super::{expand_path, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ManualArgs {
    /// Directory to scan
    #[arg(long)]
    path: String,
    /// Prefix marking identifiers to rename (default: __s)
    #[arg(long)]
    tag: Option<String>,
    /// Length of generated names
    #[arg(long)]
    name_length: Option<usize>,
    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,
}

pub fn run(args: ManualArgs, global: &GlobalArgs) -> CmdResult<ProtectReport> {
    let base_path = expand_path(&args.path);

    let mut config = config::load_config(global.config_path().as_deref(), &base_path)?;
    if let Some(tag) = args.tag {
        config.tag = tag;
    }
    if let Some(length) = args.name_length {
        config.name_length = length;
    }

    let opts = ManualOptions {
        base_path,
        dry_run: args.dry_run,
    };
    let mut table = NameTable::with_length(config.name_length);

    let report = protect::run_manual(&opts, &config, &mut table)?;

    let exit_code = if report.status == RunStatus::NothingFound {
        1
    } else {
        0
    };

    Ok((report, exit_code))
}
