//! Source tree discovery for manual mode and project tagging.

use glob_match::glob_match;
use std::path::{Path, PathBuf};

use crate::config::FilesConfig;
use crate::obfuscate::OUTPUT_DIR;

/// Skipped at any depth.
const ALWAYS_SKIP_DIRS: &[&str] = &[".git", ".svn", ".hg", "xcuserdata", OUTPUT_DIR];

/// Skipped only directly under the base path.
const ROOT_ONLY_SKIP_DIRS: &[&str] = &["build", "DerivedData"];

/// Files found under a base path, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTree {
    pub sources: Vec<PathBuf>,
    pub documents: Vec<PathBuf>,
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted == ext))
}

/// Whether `path` matches one of the exclude globs, relative to `root`.
pub fn is_excluded(path: &Path, root: &Path, exclude: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = relative.to_string_lossy();
    exclude.iter().any(|pattern| glob_match(pattern, &relative))
}

/// Walk `root` and split files into sources and Interface Builder documents.
pub fn discover(root: &Path, config: &FilesConfig) -> SourceTree {
    let mut files = Vec::new();
    walk_recursive(root, root, &mut files);
    files.retain(|f| !is_excluded(f, root, &config.exclude));
    files.sort();

    let mut tree = SourceTree::default();
    for file in files {
        if has_extension(&file, &config.source_extensions) {
            tree.sources.push(file);
        } else if has_extension(&file, &config.document_extensions) {
            tree.documents.push(file);
        }
    }
    tree
}

/// Directories under `root` with the given extension (e.g. `xcodeproj`),
/// sorted. Bundles are not descended into.
pub fn find_bundles(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut bundles = Vec::new();
    collect_bundles(root, root, extension, &mut bundles);
    bundles.sort();
    bundles
}

fn skip_dir(path: &Path, is_root: bool) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    ALWAYS_SKIP_DIRS.contains(&name.as_str())
        || (is_root && ROOT_ONLY_SKIP_DIRS.contains(&name.as_str()))
}

fn walk_recursive(dir: &Path, root: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let is_root = dir == root;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if skip_dir(&path, is_root) {
                continue;
            }
            walk_recursive(&path, root, files);
        } else {
            files.push(path);
        }
    }
}

fn collect_bundles(dir: &Path, root: &Path, extension: &str, bundles: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let is_root = dir == root;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() || skip_dir(&path, is_root) {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            bundles.push(path);
        } else {
            collect_bundles(&path, root, extension, bundles);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShieldConfig;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn discovers_sources_and_documents_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "App/ViewController.swift");
        touch(root, "App/AppDelegate.swift");
        touch(root, "App/Bridge.h");
        touch(root, "App/Base.lproj/Main.storyboard");
        touch(root, "App/Cell.xib");
        touch(root, "App/Info.plist");

        let tree = discover(root, &ShieldConfig::default().files);

        assert_eq!(
            tree.sources,
            vec![
                root.join("App/AppDelegate.swift"),
                root.join("App/Bridge.h"),
                root.join("App/ViewController.swift"),
            ]
        );
        assert_eq!(
            tree.documents,
            vec![root.join("App/Base.lproj/Main.storyboard"), root.join("App/Cell.xib")]
        );
    }

    #[test]
    fn skips_vcs_output_and_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, ".git/hooks/x.swift");
        touch(root, "swiftshield-output/old.swift");
        touch(root, "Pods/Alamofire/Request.swift");
        touch(root, "build/Generated.swift");
        touch(root, "Sources/build/Kept.swift");

        let tree = discover(root, &ShieldConfig::default().files);

        assert_eq!(tree.sources, vec![root.join("Sources/build/Kept.swift")]);
    }

    #[test]
    fn finds_project_bundles_without_descending() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "App.xcodeproj/project.pbxproj");
        touch(root, "Kit/Kit.xcodeproj/project.pbxproj");
        touch(root, "App.xcodeproj/nested/Inner.xcodeproj/project.pbxproj");

        let bundles = find_bundles(root, "xcodeproj");

        assert_eq!(
            bundles,
            vec![root.join("App.xcodeproj"), root.join("Kit/Kit.xcodeproj")]
        );
    }

    #[test]
    fn exclude_patterns_are_relative_to_root() {
        let root = Path::new("/work/App");
        let exclude = vec!["Vendor/**".to_string()];
        assert!(is_excluded(Path::new("/work/App/Vendor/a/b.swift"), root, &exclude));
        assert!(!is_excluded(Path::new("/work/App/Sources/Vendor.swift"), root, &exclude));
    }
}
