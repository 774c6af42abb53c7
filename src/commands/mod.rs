use std::path::{Path, PathBuf};

pub type CmdResult<T> = symshield::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    pub config: Option<String>,
}

impl GlobalArgs {
    /// Explicit `--config` path, tilde-expanded.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.as_deref().map(expand_path)
    }
}

/// Expand a leading `~` in a path argument.
pub(crate) fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

/// Directory containing `file`, or the current directory for a bare file name.
pub(crate) fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub mod automatic;
pub mod manual;

macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (symshield::Result<serde_json::Value>, i32) {
    crate::tty::status("symshield is working...");

    match command {
        crate::Commands::Automatic(args) => dispatch!(args, global, automatic),
        crate::Commands::Manual(args) => dispatch!(args, global, manual),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_of_bare_file_is_current_dir() {
        assert_eq!(parent_dir(Path::new("App.xcodeproj")), PathBuf::from("."));
        assert_eq!(
            parent_dir(Path::new("/work/App/App.xcodeproj")),
            PathBuf::from("/work/App")
        );
    }

    #[test]
    fn expand_path_leaves_absolute_paths_alone() {
        assert_eq!(expand_path("/tmp/x"), PathBuf::from("/tmp/x"));
    }
}
