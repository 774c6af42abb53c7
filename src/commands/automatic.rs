use clap::Args;

use symshield::build_log::XcodebuildIntrospector;
use symshield::config::{self, ShieldConfig};
use symshield::indexer::SourceKittenIndexer;
use symshield::obfuscate::NameTable;
use symshield::protect::{self, AutomaticOptions, ProtectReport, RunStatus};

use super::{expand_path, parent_dir, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct AutomaticArgs {
    /// Path to the .xcodeproj or .xcworkspace to build
    #[arg(long)]
    project_file: String,
    /// Scheme to build
    #[arg(long)]
    scheme: String,
    /// Root directory for documents, project tagging and the map
    /// (default: the project file's directory)
    #[arg(long)]
    path: Option<String>,
    /// Modules to leave untouched (comma-separated)
    #[arg(long, value_delimiter = ',')]
    ignore_modules: Vec<String>,
    /// Length of generated names
    #[arg(long)]
    name_length: Option<usize>,
    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,
}

fn apply_overrides(config: &mut ShieldConfig, args: &AutomaticArgs) {
    for module in &args.ignore_modules {
        if !config.ignore_modules.contains(module) {
            config.ignore_modules.push(module.clone());
        }
    }
    if let Some(length) = args.name_length {
        config.name_length = length;
    }
}

pub fn run(args: AutomaticArgs, global: &GlobalArgs) -> CmdResult<ProtectReport> {
    let project_file = expand_path(&args.project_file);
    let base_path = match args.path.as_deref() {
        Some(path) => expand_path(path),
        None => parent_dir(&project_file),
    };

    let mut config = config::load_config(global.config_path().as_deref(), &base_path)?;
    apply_overrides(&mut config, &args);

    let opts = AutomaticOptions {
        project_file,
        scheme: args.scheme.clone(),
        base_path,
        dry_run: args.dry_run,
    };

    let introspector = XcodebuildIntrospector::new(config.build_program.clone());
    let indexer = SourceKittenIndexer::new(config.indexer_program.clone());
    let mut table = NameTable::with_length(config.name_length);

    let report = protect::run_automatic(&opts, &config, &introspector, &indexer, &mut table)?;

    let exit_code = if report.status == RunStatus::NothingFound {
        1
    } else {
        0
    };

    Ok((report, exit_code))
}
