//! Automatic and manual protection runs.
//!
//! Both modes follow the same shape: fill the `NameTable`, rewrite sources
//! and Interface Builder documents in memory, then commit every staged file,
//! tag the Xcode projects and write the conversion map. Nothing is written
//! until every rewrite has succeeded, and nothing at all when no name was
//! found.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::build_log::{BuildIntrospector, Module};
use crate::config::ShieldConfig;
use crate::error::{Error, Result};
use crate::files;
use crate::indexer::Indexer;
use crate::obfuscate::{
    self, DocumentSubstitution, KindMatcher, NameTable, ReferenceCollector, SkippedReference,
    TagScanner, TargetIndex,
};
use crate::project_tag;
use crate::utils::io;

#[derive(Debug, Clone)]
pub struct AutomaticOptions {
    /// `.xcodeproj` or `.xcworkspace` to build.
    pub project_file: PathBuf,
    pub scheme: String,
    /// Root for documents, project tagging and the conversion map.
    pub base_path: PathBuf,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct ManualOptions {
    pub base_path: PathBuf,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Protected,
    /// No name qualified for protection. Nothing was written.
    NothingFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub source_files: usize,
    pub documents: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub substitutions: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedReference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub file: String,
    pub substitutions: Vec<DocumentSubstitution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtectReport {
    pub mode: Mode,
    pub status: RunStatus,
    pub base_path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_modules: Vec<String>,
    pub protected_names: usize,
    pub references: usize,
    pub dropped_nodes: usize,
    pub files: Vec<FileSummary>,
    pub documents: Vec<DocumentSummary>,
    pub tagged_projects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_path: Option<String>,
    pub dry_run: bool,
    pub generated_at: String,
}

impl ProtectReport {
    fn new(mode: Mode, base_path: &Path, dry_run: bool) -> Self {
        Self {
            mode,
            status: RunStatus::NothingFound,
            base_path: base_path.display().to_string(),
            modules: Vec::new(),
            ignored_modules: Vec::new(),
            protected_names: 0,
            references: 0,
            dropped_nodes: 0,
            files: Vec::new(),
            documents: Vec::new(),
            tagged_projects: Vec::new(),
            map_path: None,
            dry_run,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.files.iter().map(|f| f.skipped.len()).sum()
    }
}

/// A rewritten file waiting to be committed.
struct StagedWrite {
    path: PathBuf,
    content: String,
}

// ============================================================================
// Validation
// ============================================================================

const PROJECT_EXTENSIONS: &[&str] = &["xcodeproj", "xcworkspace"];

fn validate_base_path(base_path: &Path) -> Result<()> {
    if !base_path.is_dir() {
        return Err(Error::validation_invalid_argument(
            "path",
            format!("{} is not a directory", base_path.display()),
            None,
            None,
        ));
    }
    Ok(())
}

fn validate_automatic(opts: &AutomaticOptions, config: &ShieldConfig) -> Result<()> {
    let extension = opts
        .project_file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    if !PROJECT_EXTENSIONS.contains(&extension) {
        return Err(Error::validation_invalid_argument(
            "project-file",
            "must be an .xcodeproj or .xcworkspace",
            Some(opts.project_file.display().to_string()),
            None,
        ));
    }
    if opts.scheme.trim().is_empty() {
        return Err(Error::validation_missing_argument(vec!["scheme".to_string()]));
    }
    validate_base_path(&opts.base_path)?;
    config.validate()
}

// ============================================================================
// Automatic mode
// ============================================================================

/// Drop modules listed in `ignore`. Returns kept modules and the names dropped.
fn filter_modules(modules: Vec<Module>, ignore: &[String]) -> (Vec<Module>, Vec<String>) {
    let (ignored, kept): (Vec<Module>, Vec<Module>) =
        modules.into_iter().partition(|m| ignore.contains(&m.name));
    for module in &ignored {
        log_status!("build", "Ignoring module {}", module.name);
    }
    (kept, ignored.into_iter().map(|m| m.name).collect())
}

/// Build, index, rewrite. Indexer-driven renaming of every declaration in
/// the scheme's modules.
pub fn run_automatic(
    opts: &AutomaticOptions,
    config: &ShieldConfig,
    introspector: &dyn BuildIntrospector,
    indexer: &dyn Indexer,
    table: &mut NameTable,
) -> Result<ProtectReport> {
    validate_automatic(opts, config)?;

    let mut report = ProtectReport::new(Mode::Automatic, &opts.base_path, opts.dry_run);

    let modules = introspector.discover_modules(&opts.project_file, &opts.scheme)?;
    let (modules, ignored) = filter_modules(modules, &config.ignore_modules);
    report.ignored_modules = ignored;
    report.modules = modules
        .iter()
        .map(|m| ModuleSummary {
            name: m.name.clone(),
            source_files: m.source_files.len(),
            documents: m.documents.len(),
        })
        .collect();

    // Declarations, every file of every module, before any reference.
    let mut collector = ReferenceCollector::new(KindMatcher::from_config(&config.kinds));
    for module in &modules {
        for file in &module.source_files {
            log_status!("index", "Indexing {}", file.display());
            let entities = indexer.index(file, &module.compiler_arguments)?;
            collector.collect_declarations(file.clone(), entities, table)?;
        }
    }

    if table.is_empty() {
        log_status!("index", "No declarations to protect");
        return Ok(report);
    }

    let collected = collector.into_references();
    report.references = collected.total();
    report.dropped_nodes = collected.dropped;

    let mut staged = Vec::new();
    for (file, references) in &collected.by_file {
        let content = io::read_file(file, "read source file")?;
        let outcome = obfuscate::rewrite(&content, references, table);
        for skip in &outcome.skipped {
            log_status!(
                "rewrite",
                "Skipped {} at {}:{}:{} ({:?})",
                skip.name,
                file.display(),
                skip.line,
                skip.column,
                skip.reason
            );
        }
        report.files.push(FileSummary {
            file: file.display().to_string(),
            substitutions: outcome.substitutions,
            skipped: outcome.skipped,
        });
        if outcome.substitutions > 0 {
            staged.push(StagedWrite {
                path: file.clone(),
                content: outcome.content,
            });
        }
    }

    let module_names: BTreeSet<String> = modules.iter().map(|m| m.name.clone()).collect();
    let documents = automatic_documents(&modules, &opts.base_path, config);
    report.documents = stage_documents(
        &documents,
        table,
        Some(&module_names),
        config.target_index,
        &mut staged,
    )?;

    finish(&mut report, staged, table, config, &opts.base_path, opts.dry_run)?;
    Ok(report)
}

/// Documents reported by the build plus those found under the base path.
fn automatic_documents(modules: &[Module], base_path: &Path, config: &ShieldConfig) -> Vec<PathBuf> {
    let mut documents: BTreeSet<PathBuf> = modules
        .iter()
        .flat_map(|m| m.documents.iter().cloned())
        .collect();
    documents.extend(files::discover(base_path, &config.files).documents);
    documents.into_iter().collect()
}

// ============================================================================
// Manual mode
// ============================================================================

/// Rename every tagged identifier under the base path.
pub fn run_manual(
    opts: &ManualOptions,
    config: &ShieldConfig,
    table: &mut NameTable,
) -> Result<ProtectReport> {
    validate_base_path(&opts.base_path)?;
    config.validate()?;

    let mut report = ProtectReport::new(Mode::Manual, &opts.base_path, opts.dry_run);
    let scanner = TagScanner::new(&config.tag)?;
    let tree = files::discover(&opts.base_path, &config.files);

    let mut staged = Vec::new();
    for file in &tree.sources {
        let content = io::read_file(file, "read source file")?;
        let outcome = scanner.scan(&content, table)?;
        if outcome.substitutions == 0 {
            continue;
        }
        report.references += outcome.substitutions;
        report.files.push(FileSummary {
            file: file.display().to_string(),
            substitutions: outcome.substitutions,
            skipped: Vec::new(),
        });
        staged.push(StagedWrite {
            path: file.clone(),
            content: outcome.content,
        });
    }

    if table.is_empty() {
        log_status!("manual", "No names tagged with {}", scanner.tag());
        return Ok(report);
    }

    report.documents = stage_documents(
        &tree.documents,
        table,
        None,
        config.target_index,
        &mut staged,
    )?;

    finish(&mut report, staged, table, config, &opts.base_path, opts.dry_run)?;
    Ok(report)
}

// ============================================================================
// Shared phases
// ============================================================================

fn stage_documents(
    documents: &[PathBuf],
    table: &NameTable,
    modules: Option<&BTreeSet<String>>,
    target_index: TargetIndex,
    staged: &mut Vec<StagedWrite>,
) -> Result<Vec<DocumentSummary>> {
    let mut summaries = Vec::new();
    for path in documents {
        let label = path.display().to_string();
        let content = io::read_file(path, "read interface builder document")?;
        let outcome = obfuscate::rewrite_document(&content, table, modules, target_index, &label)?;
        if outcome.substitutions.is_empty() {
            continue;
        }
        summaries.push(DocumentSummary {
            file: label,
            substitutions: outcome.substitutions,
        });
        staged.push(StagedWrite {
            path: path.clone(),
            content: outcome.content,
        });
    }
    Ok(summaries)
}

fn commit(staged: &[StagedWrite], dry_run: bool) -> Result<()> {
    for write in staged {
        if dry_run {
            log_status!("write", "Would overwrite {}", write.path.display());
            continue;
        }
        log_status!("write", "Overwriting {}", write.path.display());
        io::write_file_atomic(&write.path, &write.content, "overwrite protected file")?;
    }
    Ok(())
}

fn finish(
    report: &mut ProtectReport,
    staged: Vec<StagedWrite>,
    table: &NameTable,
    config: &ShieldConfig,
    base_path: &Path,
    dry_run: bool,
) -> Result<()> {
    commit(&staged, dry_run)?;

    if config.tag_projects {
        report.tagged_projects = project_tag::tag_projects(base_path, dry_run)?
            .iter()
            .map(|p| p.display().to_string())
            .collect();
    }

    if !dry_run {
        let path = obfuscate::write_map(base_path, table)?;
        report.map_path = Some(path.display().to_string());
    }

    report.protected_names = table.len();
    report.status = RunStatus::Protected;
    Ok(())
}
