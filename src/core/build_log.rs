//! Module discovery from the build tool's log.
//!
//! `xcodebuild` is run once and its textual output is scraped for the
//! `swiftc` driver invocation of every module (source files and compiler
//! arguments) and the `ibtool` invocations (storyboards and xibs). The
//! markers are those of the current Xcode log format.

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::utils::command;

/// A compilation unit as seen by the build tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Module {
    pub name: String,
    pub source_files: Vec<PathBuf>,
    /// Interface Builder documents compiled into this module.
    pub documents: Vec<PathBuf>,
    pub compiler_arguments: Vec<String>,
}

pub trait BuildIntrospector {
    fn discover_modules(&self, project: &Path, scheme: &str) -> Result<Vec<Module>>;
}

/// Runs `xcodebuild clean build` and parses the log.
#[derive(Debug, Clone)]
pub struct XcodebuildIntrospector {
    program: String,
}

impl XcodebuildIntrospector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

pub fn is_workspace(project: &Path) -> bool {
    project.extension().and_then(|e| e.to_str()) == Some("xcworkspace")
}

impl BuildIntrospector for XcodebuildIntrospector {
    fn discover_modules(&self, project: &Path, scheme: &str) -> Result<Vec<Module>> {
        let project_flag = if is_workspace(project) {
            "-workspace"
        } else {
            "-project"
        };
        let args: Vec<String> = vec![
            "clean".to_string(),
            "build".to_string(),
            project_flag.to_string(),
            project.to_string_lossy().to_string(),
            "-scheme".to_string(),
            scheme.to_string(),
            "CODE_SIGN_IDENTITY=".to_string(),
            "CODE_SIGNING_REQUIRED=NO".to_string(),
        ];

        log_status!("build", "Building {} to gather modules and compiler arguments", scheme);
        let (output, success) = command::run_captured(&self.program, &args, "xcodebuild")?;
        if !success {
            log_status!("build", "Build exited with failure; parsing the log anyway");
        }

        let modules = parse_build_log(&output.combined())?;
        if modules.is_empty() {
            return Err(Error::build_log_unparsable(
                "no modules found in the build log",
                None,
                None,
            )
            .with_hint("Make sure the scheme builds from the command line"));
        }
        Ok(modules)
    }
}

// ============================================================================
// Log parsing
// ============================================================================

static MODULE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-module-name (\S+) ").unwrap());

static IBTOOL_MODULE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--module (\S+) ").unwrap());

/// Stand-in for `\ ` while a line is split on spaces.
const ESCAPED_SPACE: &str = "\u{1}";

const DROPPED_ARGUMENTS: &[&str] = &[
    "-parseable-output",
    "-incremental",
    "-serialize-diagnostics",
    "-emit-dependencies",
];

const DOCUMENT_SUFFIXES: &[&str] = &[".xib", ".storyboard"];

fn protect_escaped_spaces(line: &str) -> String {
    line.replace("\\ ", ESCAPED_SPACE)
}

fn restore_escaped_spaces(arg: &str) -> String {
    arg.replace(ESCAPED_SPACE, " ")
}

/// Parse a full `xcodebuild` log into modules, in discovery order.
pub fn parse_build_log(log: &str) -> Result<Vec<Module>> {
    let mut modules: Vec<Module> = Vec::new();

    for line in log.lines() {
        if let Some(caps) = MODULE_NAME_PATTERN.captures(line) {
            let name = caps[1].to_string();
            parse_swiftc_invocation(line, &name, &mut modules)?;
        } else if let Some(caps) = IBTOOL_MODULE_PATTERN.captures(line) {
            let name = caps[1].to_string();
            parse_ibtool_invocation(line, &name, &mut modules);
        }
    }

    Ok(modules)
}

fn module_entry<'a>(modules: &'a mut Vec<Module>, name: &str) -> &'a mut Module {
    if let Some(index) = modules.iter().position(|m| m.name == name) {
        return &mut modules[index];
    }
    log_status!("build", "Found module {}", name);
    modules.push(Module {
        name: name.to_string(),
        ..Module::default()
    });
    let last = modules.len() - 1;
    &mut modules[last]
}

fn parse_swiftc_invocation(line: &str, name: &str, modules: &mut Vec<Module>) -> Result<()> {
    if modules
        .iter()
        .any(|m| m.name == name && !m.compiler_arguments.is_empty())
    {
        return Ok(());
    }

    let protected = protect_escaped_spaces(line);
    let parts: Vec<&str> = protected.split(' ').filter(|p| !p.is_empty()).collect();
    let module_flag = parts
        .iter()
        .position(|p| *p == "-module-name")
        .unwrap_or(parts.len());
    // The compiler must be invoked before the module is named.
    let Some(start) = parts[..module_flag]
        .iter()
        .position(|p| *p == "swiftc" || p.ends_with("/swiftc"))
    else {
        return Err(Error::build_log_unparsable(
            format!("failed to retrieve {} compiler arguments", name),
            Some(name.to_string()),
            Some(line.chars().take(500).collect()),
        ));
    };

    let invocation: Vec<String> = parts[start..]
        .iter()
        .map(|p| restore_escaped_spaces(p))
        .collect();

    let files = parse_module_files(&invocation);
    let arguments = parse_compiler_arguments(&invocation);

    let module = module_entry(modules, name);
    module.source_files = files;
    module.compiler_arguments = arguments;
    Ok(())
}

/// Absolute paths following `-c`, up to the next flag.
fn parse_module_files(invocation: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut in_files = false;

    for arg in invocation {
        if in_files {
            if arg.starts_with('/') {
                files.push(PathBuf::from(arg));
            }
            in_files = !arg.starts_with('-') || files.is_empty();
        } else {
            in_files = arg == "-c";
        }
    }

    files
}

/// The driver invocation minus the driver path, with build-only flags
/// removed and optimization turned off so the indexer sees every symbol.
fn parse_compiler_arguments(invocation: &[String]) -> Vec<String> {
    let mut args = Vec::new();
    let mut skip_next = false;

    for arg in invocation.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        match arg.as_str() {
            "-output-file-map" => skip_next = true,
            a if DROPPED_ARGUMENTS.contains(&a) => {}
            "-O" => args.push("-Onone".to_string()),
            "-DNDEBUG=1" => args.push("-DDEBUG=1".to_string()),
            _ => args.push(arg.clone()),
        }
    }

    args.push("-D".to_string());
    args.push("DEBUG".to_string());
    args
}

fn parse_ibtool_invocation(line: &str, name: &str, modules: &mut Vec<Module>) {
    let protected = protect_escaped_spaces(line.trim_end());
    let Some(last) = protected.rsplit(' ').next() else {
        return;
    };
    if !DOCUMENT_SUFFIXES.iter().any(|s| last.ends_with(s)) {
        return;
    }
    let path = PathBuf::from(restore_escaped_spaces(last));
    let module = module_entry(modules, name);
    if !module.documents.contains(&path) {
        module.documents.push(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
CompileSwiftSources normal x86_64 com.apple.xcode.tools.swift.compiler (in target 'App' from project 'App')
    cd /Users/dev/App
    /Applications/Xcode.app/Contents/Developer/Toolchains/XcodeDefault.xctoolchain/usr/bin/swiftc -incremental -module-name App -O -DNDEBUG=1 -sdk /SDKs/iPhoneSimulator.sdk -target x86_64-apple-ios12.0-simulator -c -j8 /Users/dev/App/AppDelegate.swift /Users/dev/My\\ App/ViewController.swift -output-file-map /tmp/App-OutputFileMap.json -parseable-output -serialize-diagnostics -emit-dependencies -emit-module -emit-module-path /tmp/App.swiftmodule
CompileStoryboard /Users/dev/App/Base.lproj/Main.storyboard (in target 'App' from project 'App')
    /Applications/Xcode.app/Contents/Developer/usr/bin/ibtool --errors --warnings --module App --target-device iphone /Users/dev/App/Base.lproj/Main.storyboard
    /Applications/Xcode.app/Contents/Developer/usr/bin/ibtool --errors --module Kit --target-device iphone /Users/dev/Kit/Cell.xib
    /Applications/Xcode.app/Contents/Developer/usr/bin/ibtool --errors --module Kit --target-device iphone /Users/dev/Kit/Assets.car
";

    #[test]
    fn parses_modules_in_discovery_order() {
        let modules = parse_build_log(LOG).unwrap();
        let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["App", "Kit"]);
    }

    #[test]
    fn extracts_source_files_after_dash_c() {
        let modules = parse_build_log(LOG).unwrap();
        assert_eq!(
            modules[0].source_files,
            vec![
                PathBuf::from("/Users/dev/App/AppDelegate.swift"),
                PathBuf::from("/Users/dev/My App/ViewController.swift"),
            ]
        );
    }

    #[test]
    fn rewrites_compiler_arguments_for_indexing() {
        let modules = parse_build_log(LOG).unwrap();
        let args = &modules[0].compiler_arguments;
        assert_eq!(args[0], "-module-name");
        assert!(args.contains(&"-Onone".to_string()));
        assert!(args.contains(&"-DDEBUG=1".to_string()));
        assert!(!args.contains(&"-O".to_string()));
        assert!(!args.contains(&"-incremental".to_string()));
        assert!(!args.contains(&"-parseable-output".to_string()));
        assert!(!args.contains(&"-output-file-map".to_string()));
        assert!(!args.contains(&"/tmp/App-OutputFileMap.json".to_string()));
        assert_eq!(&args[args.len() - 2..], &["-D".to_string(), "DEBUG".to_string()]);
    }

    #[test]
    fn collects_interface_builder_documents() {
        let modules = parse_build_log(LOG).unwrap();
        assert_eq!(
            modules[0].documents,
            vec![PathBuf::from("/Users/dev/App/Base.lproj/Main.storyboard")]
        );
        assert_eq!(modules[1].documents, vec![PathBuf::from("/Users/dev/Kit/Cell.xib")]);
        assert!(modules[1].compiler_arguments.is_empty());
    }

    #[test]
    fn first_invocation_per_module_wins() {
        let log = "\
/usr/bin/swiftc -module-name App -c /a/First.swift -emit-module
/usr/bin/swiftc -module-name App -c /a/Second.swift -emit-module
";
        let modules = parse_build_log(log).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].source_files, vec![PathBuf::from("/a/First.swift")]);
    }

    #[test]
    fn module_name_without_swiftc_is_an_error() {
        let err = parse_build_log("swift-frontend -module-name App -c /a/A.swift\n").unwrap_err();
        assert_eq!(err.code.as_str(), "build.log_unparsable");
        assert_eq!(err.details["module"], "App");
    }

    #[test]
    fn swiftc_after_module_name_is_an_error() {
        let line = "swift-frontend -module-name App -c /a/A.swift -o /usr/bin/swiftc\n";
        let err = parse_build_log(line).unwrap_err();
        assert_eq!(err.code.as_str(), "build.log_unparsable");
    }

    #[test]
    fn workspace_detection_uses_extension() {
        assert!(is_workspace(Path::new("/p/App.xcworkspace")));
        assert!(!is_workspace(Path::new("/p/App.xcodeproj")));
    }
}
